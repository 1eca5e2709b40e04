//! Template validator - structural, semantic, and conflict checks

use setpoint_core::{
    round_score, ConstraintOperator, ConstraintSpec, IssueSeverity, MigrationDraft,
    MigrationValidationIssue, MigrationValidationReport, ScenarioTemplate,
};
use std::collections::{BTreeMap, BTreeSet};

/// Scores a draft on correctness, conflict rate, and guardrail coverage.
///
/// Unknown field references become ERROR issues, never panics or exceptions:
/// the validator always produces a report.
#[derive(Debug, Clone, Default)]
pub struct TemplateValidator;

impl TemplateValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, draft: &MigrationDraft) -> MigrationValidationReport {
        let mut issues: Vec<MigrationValidationIssue> = Vec::new();
        let template = &draft.template;
        let fields: BTreeSet<&str> = template
            .field_dictionary
            .fields()
            .iter()
            .map(|f| f.field_name.as_str())
            .collect();

        if template.objective.terms().is_empty() {
            issues.push(MigrationValidationIssue::error(
                "OBJ_EMPTY",
                "objective.terms",
                "Objective terms cannot be empty.",
            ));
        }

        for (idx, term) in template.objective.terms().iter().enumerate() {
            if !fields.contains(term.field_name.as_str()) {
                issues.push(MigrationValidationIssue::error(
                    "OBJ_FIELD_UNKNOWN",
                    format!("objective.terms[{}].field_name", idx),
                    format!("Unknown field in objective: {}", term.field_name),
                ));
            }
        }

        for (idx, feature) in template.prediction.feature_fields.iter().enumerate() {
            if !fields.contains(feature.as_str()) {
                issues.push(MigrationValidationIssue::error(
                    "PRED_FEATURE_UNKNOWN",
                    format!("prediction.feature_fields[{}]", idx),
                    format!("Unknown prediction feature: {}", feature),
                ));
            }
        }

        for (idx, constraint) in template.constraints.iter().enumerate() {
            if !fields.contains(constraint.field_name.as_str()) {
                issues.push(MigrationValidationIssue::error(
                    "CONSTRAINT_FIELD_UNKNOWN",
                    format!("constraints[{}].field_name", idx),
                    format!("Unknown field in constraint: {}", constraint.field_name),
                ));
            }
        }

        let conflict_count = check_constraint_conflicts(&template.constraints, &mut issues);
        let guardrail_coverage = guardrail_coverage(template);
        let correctness_score = correctness_score(&issues);
        let conflict_rate = if template.constraints.is_empty() {
            0.0
        } else {
            conflict_count as f64 / template.constraints.len() as f64
        };

        let valid = issues.iter().all(|i| i.severity != IssueSeverity::Error)
            && correctness_score >= 0.95
            && conflict_rate <= 0.02
            && guardrail_coverage >= 0.95;

        MigrationValidationReport {
            draft_id: draft.draft_id.clone(),
            valid,
            correctness_score,
            conflict_rate,
            guardrail_coverage,
            issues,
        }
    }
}

/// Merge every field's constraints into an effective [lower, upper] range and
/// flag impossible combinations. Returns the number of conflicts found.
fn check_constraint_conflicts(
    constraints: &[ConstraintSpec],
    issues: &mut Vec<MigrationValidationIssue>,
) -> usize {
    let mut grouped: BTreeMap<&str, Vec<&ConstraintSpec>> = BTreeMap::new();
    for constraint in constraints {
        grouped
            .entry(constraint.field_name.as_str())
            .or_default()
            .push(constraint);
    }

    let mut conflicts = 0;
    for (field_name, items) in grouped {
        let lowers: Vec<f64> = items.iter().filter_map(|c| c.lower_bound).collect();
        let uppers: Vec<f64> = items.iter().filter_map(|c| c.upper_bound).collect();
        let equals: Vec<f64> = items.iter().filter_map(|c| c.equals_value).collect();

        // Effective range: tightest lower and upper across the field.
        let lower = lowers.iter().copied().fold(None, |acc: Option<f64>, v| {
            Some(acc.map_or(v, |a| a.max(v)))
        });
        let upper = uppers.iter().copied().fold(None, |acc: Option<f64>, v| {
            Some(acc.map_or(v, |a| a.min(v)))
        });

        if let (Some(lower), Some(upper)) = (lower, upper) {
            if lower > upper {
                conflicts += 1;
                issues.push(MigrationValidationIssue::error(
                    "CONSTRAINT_CONFLICT_RANGE",
                    format!("constraints[{}]", field_name),
                    format!(
                        "Conflicting range for {}: lower {} > upper {}",
                        field_name, lower, upper
                    ),
                ));
            }
        }

        if let Some(&eq) = equals.first() {
            if let Some(lower) = lower {
                if eq < lower {
                    conflicts += 1;
                    issues.push(MigrationValidationIssue::error(
                        "CONSTRAINT_CONFLICT_EQ_LOW",
                        format!("constraints[{}]", field_name),
                        format!(
                            "Equality value {} < lower bound {} for {}",
                            eq, lower, field_name
                        ),
                    ));
                }
            }
            if let Some(upper) = upper {
                if eq > upper {
                    conflicts += 1;
                    issues.push(MigrationValidationIssue::error(
                        "CONSTRAINT_CONFLICT_EQ_HIGH",
                        format!("constraints[{}]", field_name),
                        format!(
                            "Equality value {} > upper bound {} for {}",
                            eq, upper, field_name
                        ),
                    ));
                }
            }
        }

        let all_eq = items.iter().all(|c| c.operator == ConstraintOperator::Eq);
        if all_eq && distinct_count(&equals) > 1 {
            conflicts += 1;
            issues.push(MigrationValidationIssue::error(
                "CONSTRAINT_CONFLICT_MULTIPLE_EQ",
                format!("constraints[{}]", field_name),
                format!("Multiple equality constraints conflict on {}", field_name),
            ));
        }
    }

    conflicts
}

fn distinct_count(values: &[f64]) -> usize {
    let mut bits: Vec<u64> = values.iter().map(|v| v.to_bits()).collect();
    bits.sort_unstable();
    bits.dedup();
    bits.len()
}

/// Fraction of objective fields covered by a guardrail rule; 1.0 when the
/// objective is empty.
fn guardrail_coverage(template: &ScenarioTemplate) -> f64 {
    let objective_fields: BTreeSet<&str> = template
        .objective
        .terms()
        .iter()
        .map(|t| t.field_name.as_str())
        .collect();
    if objective_fields.is_empty() {
        return 1.0;
    }
    let guarded: BTreeSet<&str> = template
        .guardrail
        .rules
        .iter()
        .map(|r| r.field_name.as_str())
        .collect();
    let covered = objective_fields.intersection(&guarded).count();
    covered as f64 / objective_fields.len() as f64
}

/// Start at 1.0, subtract 0.2 per ERROR, 0.05 per WARN, 0.01 per INFO,
/// floored at zero.
fn correctness_score(issues: &[MigrationValidationIssue]) -> f64 {
    let mut score: f64 = 1.0;
    for issue in issues {
        score -= match issue.severity {
            IssueSeverity::Error => 0.2,
            IssueSeverity::Warn => 0.05,
            IssueSeverity::Info => 0.01,
        };
    }
    round_score(score.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use setpoint_core::{
        FieldDefinition, FieldDictionary, GuardrailAction, GuardrailRule, GuardrailSpec,
        ObjectiveSpec, ObjectiveTerm, PredictionSpec, SceneMetadata,
    };

    fn draft_with(
        constraints: Vec<ConstraintSpec>,
        guardrail_rules: Vec<GuardrailRule>,
    ) -> MigrationDraft {
        let dictionary = FieldDictionary::new(vec![
            FieldDefinition::new("pressure", "pressure", "kPa"),
            FieldDefinition::new("energy_cost", "cost", "$/h"),
        ])
        .unwrap();
        let template = ScenarioTemplate::new(
            "t",
            "v1",
            SceneMetadata::new("scene"),
            dictionary,
            ObjectiveSpec::new(vec![ObjectiveTerm::minimize("energy_cost", 1.0)]).unwrap(),
            PredictionSpec::new(vec!["pressure".to_string()], 1).unwrap(),
        )
        .with_constraints(constraints)
        .with_guardrail(GuardrailSpec::new(guardrail_rules));
        MigrationDraft::new(template, 0.9, "rule_fallback")
    }

    fn default_guardrails() -> Vec<GuardrailRule> {
        vec![GuardrailRule::new("energy_cost", GuardrailAction::Clip).with_max_delta(0.2)]
    }

    #[test]
    fn test_clean_draft_is_valid() {
        let draft = draft_with(
            vec![ConstraintSpec::between("p_range", "pressure", 0.0, 500.0).unwrap()],
            default_guardrails(),
        );
        let report = TemplateValidator::new().validate(&draft);
        assert!(report.valid);
        assert_eq!(report.correctness_score, 1.0);
        assert_eq!(report.conflict_rate, 0.0);
        assert_eq!(report.guardrail_coverage, 1.0);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_conflicting_ge_le_is_flagged() {
        // ge lower=20 vs le upper=10: merged range is impossible.
        let draft = draft_with(
            vec![
                ConstraintSpec::ge("p_floor", "pressure", 20.0),
                ConstraintSpec::le("p_cap", "pressure", 10.0),
            ],
            default_guardrails(),
        );
        let report = TemplateValidator::new().validate(&draft);
        assert!(!report.valid);
        assert!(report
            .issues
            .iter()
            .any(|i| i.code == "CONSTRAINT_CONFLICT_RANGE"));
        assert_eq!(report.conflict_rate, 0.5);
    }

    #[test]
    fn test_equality_outside_merged_range_is_flagged() {
        let draft = draft_with(
            vec![
                ConstraintSpec::ge("p_floor", "pressure", 50.0),
                ConstraintSpec::eq("p_pin", "pressure", 10.0),
            ],
            default_guardrails(),
        );
        let report = TemplateValidator::new().validate(&draft);
        assert!(report
            .issues
            .iter()
            .any(|i| i.code == "CONSTRAINT_CONFLICT_EQ_LOW"));
        assert!(!report.valid);
    }

    #[test]
    fn test_two_distinct_equalities_conflict() {
        let draft = draft_with(
            vec![
                ConstraintSpec::eq("p_pin_a", "pressure", 10.0),
                ConstraintSpec::eq("p_pin_b", "pressure", 20.0),
            ],
            default_guardrails(),
        );
        let report = TemplateValidator::new().validate(&draft);
        assert!(report
            .issues
            .iter()
            .any(|i| i.code == "CONSTRAINT_CONFLICT_MULTIPLE_EQ"));
    }

    #[test]
    fn test_unknown_references_are_error_issues_not_panics() {
        let mut draft = draft_with(vec![], default_guardrails());
        draft.template.constraints = vec![ConstraintSpec::le("ghost_cap", "ghost", 1.0)];
        draft.template.prediction.feature_fields = vec!["phantom".to_string()];

        let report = TemplateValidator::new().validate(&draft);
        let codes: Vec<&str> = report.issues.iter().map(|i| i.code.as_str()).collect();
        assert!(codes.contains(&"CONSTRAINT_FIELD_UNKNOWN"));
        assert!(codes.contains(&"PRED_FEATURE_UNKNOWN"));
        assert!(!report.valid);
        // Two errors: 1.0 - 0.2 - 0.2.
        assert_eq!(report.correctness_score, 0.6);
    }

    #[test]
    fn test_missing_guardrail_coverage_invalidates() {
        let draft = draft_with(vec![], vec![]);
        let report = TemplateValidator::new().validate(&draft);
        assert_eq!(report.guardrail_coverage, 0.0);
        assert!(!report.valid);
        // Coverage alone fails the gate; no issues are raised for it here.
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_correctness_floor_at_zero() {
        let issues: Vec<MigrationValidationIssue> = (0..6)
            .map(|i| MigrationValidationIssue::error("E", "p", format!("issue {}", i)))
            .collect();
        assert_eq!(correctness_score(&issues), 0.0);
    }
}

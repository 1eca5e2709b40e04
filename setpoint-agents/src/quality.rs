//! Template quality evaluator - the five-dimension quality gate

use crate::TemplateValidator;
use setpoint_core::{
    round_score, ConstraintOperator, MigrationDraft, MigrationValidationReport, PipelineResult,
    QualityGate, QualityIssue, ScenarioTemplate, SceneContext, SimulationSample,
    TemplateQualityReport,
};
use setpoint_pipeline::ExecutionPipeline;
use std::collections::{BTreeMap, BTreeSet};

/// Scores a template on structural, semantic, solvability, guardrail, and
/// regression dimensions, each against its own threshold.
///
/// The execution pipeline used for sampling is the same one live execution
/// uses; a template passing here behaves identically in production.
pub struct TemplateQualityEvaluator {
    pipeline: ExecutionPipeline,
    validator: TemplateValidator,
}

impl TemplateQualityEvaluator {
    pub fn new() -> Self {
        Self {
            pipeline: ExecutionPipeline::default(),
            validator: TemplateValidator::new(),
        }
    }

    pub fn with_pipeline(mut self, pipeline: ExecutionPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Evaluate one template. When no regression samples are supplied, a
    /// deterministic nominal + stressed pair is synthesized from the
    /// template's own constraint and guardrail ranges.
    pub fn evaluate(
        &self,
        template: &ScenarioTemplate,
        regression_samples: Option<&[SimulationSample]>,
        gate: Option<&QualityGate>,
    ) -> TemplateQualityReport {
        let default_gate = QualityGate::default();
        let gate = gate.unwrap_or(&default_gate);
        let mut issues: Vec<QualityIssue> = Vec::new();

        let structural_score = self.structural_score(template, &mut issues);

        let validation = self.validator.validate(&MigrationDraft::new(
            template.clone(),
            1.0,
            "quality_check",
        ));

        let semantic_score = self.semantic_score(template, &validation, &mut issues);

        let synthesized;
        let samples: &[SimulationSample] = match regression_samples {
            Some(samples) if !samples.is_empty() => samples,
            _ => {
                synthesized = default_samples(template);
                &synthesized
            }
        };
        let results: Vec<PipelineResult> = samples
            .iter()
            .map(|sample| self.pipeline.run(&sample.context, template))
            .collect();

        let solvability_score = solvability_score(&results);
        let guardrail_coverage = guardrail_coverage(template);
        let regression_score = regression_score(samples, &results);

        let overall_score = round_score(
            (structural_score
                + semantic_score
                + solvability_score
                + guardrail_coverage
                + regression_score)
                / 5.0,
        );

        for item in &validation.issues {
            issues.push(QualityIssue::new(
                item.code.clone(),
                item.message.clone(),
                item.severity,
            ));
        }

        append_threshold_issues(
            &mut issues,
            gate,
            structural_score,
            semantic_score,
            solvability_score,
            guardrail_coverage,
            regression_score,
            overall_score,
        );

        let passed = structural_score >= gate.structural_min
            && semantic_score >= gate.semantic_min
            && solvability_score >= gate.solvability_min
            && guardrail_coverage >= gate.guardrail_min
            && regression_score >= gate.regression_min
            && overall_score >= gate.overall_min;

        TemplateQualityReport {
            overall_score,
            structural_score,
            semantic_score,
            solvability_score,
            guardrail_coverage,
            regression_score,
            passed,
            issues,
        }
    }

    /// 1.0 when the template round-trips through full re-validation of its
    /// own serialized form, else 0.0.
    fn structural_score(&self, template: &ScenarioTemplate, issues: &mut Vec<QualityIssue>) -> f64 {
        let roundtrip = serde_json::to_value(template)
            .map_err(|e| e.to_string())
            .and_then(|value| {
                serde_json::from_value::<ScenarioTemplate>(value).map_err(|e| e.to_string())
            })
            .and_then(|parsed| parsed.validate().map_err(|e| e.to_string()));

        match roundtrip {
            Ok(()) => 1.0,
            Err(reason) => {
                issues.push(QualityIssue::error(
                    "STRUCTURAL_INVALID",
                    format!("Template structure invalid: {}", reason),
                ));
                0.0
            }
        }
    }

    /// Fraction of resolvable field references, reduced by the validator's
    /// conflict rate.
    fn semantic_score(
        &self,
        template: &ScenarioTemplate,
        validation: &MigrationValidationReport,
        issues: &mut Vec<QualityIssue>,
    ) -> f64 {
        let fields: BTreeSet<&str> = template
            .field_dictionary
            .fields()
            .iter()
            .map(|f| f.field_name.as_str())
            .collect();

        let mut references: Vec<&str> = Vec::new();
        references.extend(template.objective.terms().iter().map(|t| t.field_name.as_str()));
        references.extend(template.prediction.feature_fields.iter().map(|f| f.as_str()));
        references.extend(template.constraints.iter().map(|c| c.field_name.as_str()));
        references.extend(template.guardrail.rules.iter().map(|r| r.field_name.as_str()));

        if references.is_empty() {
            return 1.0;
        }

        let valid_refs = references.iter().filter(|r| fields.contains(*r)).count();
        for rule in &template.guardrail.rules {
            if !fields.contains(rule.field_name.as_str()) {
                issues.push(QualityIssue::error(
                    "GUARDRAIL_FIELD_UNKNOWN",
                    format!("Unknown field in guardrail: {}", rule.field_name),
                ));
            }
        }

        let mut score = round_score(valid_refs as f64 / references.len() as f64);
        if validation.conflict_rate > 0.0 {
            score = round_score(score - validation.conflict_rate).max(0.0);
        }
        score
    }
}

impl Default for TemplateQualityEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// Fraction of sampled runs the solver reported solved.
fn solvability_score(results: &[PipelineResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let solved = results
        .iter()
        .filter(|r| r.plan.solver_status == setpoint_core::SolverStatus::Solved)
        .count();
    round_score(solved as f64 / results.len() as f64)
}

/// Coverage over objective plus controllable fields - the stricter superset
/// of the validator's objective-only coverage.
fn guardrail_coverage(template: &ScenarioTemplate) -> f64 {
    let mut target: BTreeSet<&str> = template
        .objective
        .terms()
        .iter()
        .map(|t| t.field_name.as_str())
        .collect();
    target.extend(
        template
            .field_dictionary
            .fields()
            .iter()
            .filter(|f| f.controllable)
            .map(|f| f.field_name.as_str()),
    );
    if target.is_empty() {
        return 1.0;
    }
    let covered: BTreeSet<&str> = template
        .guardrail
        .rules
        .iter()
        .map(|r| r.field_name.as_str())
        .collect();
    round_score(target.intersection(&covered).count() as f64 / target.len() as f64)
}

/// `0.7 * match_rate + 0.3 * (1 - violation_rate)`. Without expectations the
/// match rate defaults to `1 - violation_rate`.
fn regression_score(samples: &[SimulationSample], results: &[PipelineResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }

    let total = results.len();
    let violations = results
        .iter()
        .filter(|r| !r.guardrail.violations.is_empty())
        .count();
    let violation_rate = violations as f64 / total as f64;

    let expected_pairs: Vec<(bool, bool)> = samples
        .iter()
        .zip(results)
        .filter_map(|(sample, result)| {
            sample.expected_approved.map(|expected| (expected, result.executed))
        })
        .collect();

    let match_rate = if expected_pairs.is_empty() {
        1.0 - violation_rate
    } else {
        let matches = expected_pairs
            .iter()
            .filter(|(expected, actual)| expected == actual)
            .count();
        matches as f64 / expected_pairs.len() as f64
    };

    let score = 0.7 * match_rate + 0.3 * (1.0 - violation_rate);
    round_score(score.clamp(0.0, 1.0))
}

/// Synthesize the nominal + stressed sample pair: the nominal point sits at
/// the midpoint of each field's active constraint/guardrail range, the
/// stressed point pushes controllable fields half a `max_delta` (or +5%
/// when unconstrained).
fn default_samples(template: &ScenarioTemplate) -> Vec<SimulationSample> {
    let mut nominal: BTreeMap<String, f64> = template
        .field_dictionary
        .fields()
        .iter()
        .map(|f| (f.field_name.clone(), 1.0))
        .collect();

    for constraint in &template.constraints {
        let field = constraint.field_name.clone();
        match constraint.operator {
            ConstraintOperator::Ge => {
                if let Some(lower) = constraint.lower_bound {
                    nominal.insert(field, lower + 1.0f64.max(lower.abs() * 0.05));
                }
            }
            ConstraintOperator::Le => {
                if let Some(upper) = constraint.upper_bound {
                    nominal.insert(field, upper - 1.0f64.max(upper.abs() * 0.05));
                }
            }
            ConstraintOperator::Between => {
                if let (Some(lower), Some(upper)) = (constraint.lower_bound, constraint.upper_bound)
                {
                    nominal.insert(field, (lower + upper) / 2.0);
                }
            }
            ConstraintOperator::Eq => {
                if let Some(target) = constraint.equals_value {
                    nominal.insert(field, target);
                }
            }
        }
    }

    for rule in &template.guardrail.rules {
        let field = rule.field_name.clone();
        match (rule.min_value, rule.max_value) {
            (Some(min), Some(max)) => {
                nominal.insert(field, (min + max) / 2.0);
            }
            (Some(min), None) => {
                nominal.insert(field, min + 0.1f64.max(min.abs() * 0.05));
            }
            (None, Some(max)) => {
                nominal.insert(field, max - 0.1f64.max(max.abs() * 0.05));
            }
            (None, None) => {}
        }
    }

    let mut stressed = nominal.clone();
    for field in template.field_dictionary.fields() {
        if !field.controllable {
            continue;
        }
        let base = stressed.get(&field.field_name).copied().unwrap_or(1.0);
        let max_delta = template
            .guardrail
            .rules
            .iter()
            .find(|r| r.field_name == field.field_name)
            .and_then(|r| r.max_delta);
        let pushed = match max_delta {
            Some(delta) => base + delta * 0.5,
            None => base * 1.05,
        };
        stressed.insert(field.field_name.clone(), pushed);
    }

    vec![
        SimulationSample::expecting(SceneContext::new(nominal), true),
        SimulationSample::expecting(SceneContext::new(stressed), true),
    ]
}

#[allow(clippy::too_many_arguments)]
fn append_threshold_issues(
    issues: &mut Vec<QualityIssue>,
    gate: &QualityGate,
    structural_score: f64,
    semantic_score: f64,
    solvability_score: f64,
    guardrail_coverage: f64,
    regression_score: f64,
    overall_score: f64,
) {
    let checks = [
        ("STRUCTURAL_LOW", structural_score, gate.structural_min, "structural score below threshold"),
        ("SEMANTIC_LOW", semantic_score, gate.semantic_min, "semantic score below threshold"),
        ("SOLVABILITY_LOW", solvability_score, gate.solvability_min, "solvability score below threshold"),
        ("GUARDRAIL_LOW", guardrail_coverage, gate.guardrail_min, "guardrail coverage below threshold"),
        ("REGRESSION_LOW", regression_score, gate.regression_min, "regression score below threshold"),
        ("OVERALL_LOW", overall_score, gate.overall_min, "overall quality score below threshold"),
    ];
    for (code, score, target, message) in checks {
        if score < target {
            issues.push(QualityIssue::error(
                code,
                format!("{}: {:.4} < {:.4}", message, score, target),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use setpoint_core::{GuardrailSpec, IssueSeverity};
    use setpoint_test_utils::{energy_efficiency_template, quality_stability_template};

    #[test]
    fn test_well_formed_template_passes_gate() {
        let evaluator = TemplateQualityEvaluator::new();
        let report = evaluator.evaluate(&energy_efficiency_template(), None, None);

        assert_eq!(report.structural_score, 1.0);
        assert_eq!(report.semantic_score, 1.0);
        assert_eq!(report.solvability_score, 1.0);
        assert_eq!(report.guardrail_coverage, 1.0);
        assert!(report.regression_score >= 0.90, "got {}", report.regression_score);
        assert!(report.passed, "issues: {:?}", report.issues);
    }

    #[test]
    fn test_emptied_guardrails_fail_with_guardrail_low() {
        let mut template = energy_efficiency_template();
        template.guardrail = GuardrailSpec::default();

        let report = TemplateQualityEvaluator::new().evaluate(&template, None, None);
        assert_eq!(report.guardrail_coverage, 0.0);
        assert!(!report.passed);
        assert!(report.issues.iter().any(|i| i.code == "GUARDRAIL_LOW"));
    }

    #[test]
    fn test_unknown_guardrail_field_reduces_semantic_score() {
        let mut template = quality_stability_template();
        template
            .guardrail
            .rules
            .push(setpoint_core::GuardrailRule::new(
                "phantom_field",
                setpoint_core::GuardrailAction::Warn,
            ));

        let report = TemplateQualityEvaluator::new().evaluate(&template, None, None);
        assert!(report.semantic_score < 1.0);
        assert!(report
            .issues
            .iter()
            .any(|i| i.code == "GUARDRAIL_FIELD_UNKNOWN" && i.severity == IssueSeverity::Error));
        assert!(!report.passed);
    }

    #[test]
    fn test_failing_dimensions_emit_exactly_one_error_each() {
        let mut template = energy_efficiency_template();
        template.guardrail = GuardrailSpec::default();

        let report = TemplateQualityEvaluator::new().evaluate(&template, None, None);
        let guardrail_low = report
            .issues
            .iter()
            .filter(|i| i.code == "GUARDRAIL_LOW")
            .count();
        assert_eq!(guardrail_low, 1);
        let overall_low = report
            .issues
            .iter()
            .filter(|i| i.code == "OVERALL_LOW")
            .count();
        assert_eq!(overall_low, 1);
    }

    #[test]
    fn test_supplied_samples_drive_regression_score() {
        let template = energy_efficiency_template();
        // A context so far out of range the guardrail rejects, while the
        // sample claims it should have been approved.
        let hot = SceneContext::from_pairs([
            ("energy_cost", 120.0),
            ("steam_flow", 11.0),
            ("boiler_temp", 2000.0),
            ("efficiency", 0.78),
        ]);
        let samples = vec![SimulationSample::expecting(hot, true)];

        let report = TemplateQualityEvaluator::new().evaluate(&template, Some(&samples), None);
        // match_rate 0, violation_rate 1: regression = 0.
        assert_eq!(report.regression_score, 0.0);
        assert!(!report.passed);
        assert!(report.issues.iter().any(|i| i.code == "REGRESSION_LOW"));
    }

    #[test]
    fn test_default_samples_sit_inside_envelopes() {
        let template = energy_efficiency_template();
        let samples = default_samples(&template);
        assert_eq!(samples.len(), 2);
        let nominal = &samples[0].context;

        // boiler_temp takes the guardrail midpoint (250..900), overriding
        // the wider constraint midpoint.
        assert_eq!(nominal.value("boiler_temp"), Some(575.0));
        assert_eq!(samples[0].expected_approved, Some(true));

        // Stressed pushes controllable fields by half their max_delta.
        let stressed = &samples[1].context;
        assert_eq!(stressed.value("boiler_temp"), Some(575.0 + 30.0));
        assert_eq!(stressed.value("steam_flow"), Some(nominal.value("steam_flow").unwrap() + 4.0));
    }

    #[test]
    fn test_custom_gate_thresholds_apply() {
        let template = energy_efficiency_template();
        let strict = QualityGate {
            regression_min: 1.01,
            ..QualityGate::default()
        };
        let report = TemplateQualityEvaluator::new().evaluate(&template, None, Some(&strict));
        assert!(!report.passed);
        assert!(report.issues.iter().any(|i| i.code == "REGRESSION_LOW"));
    }
}

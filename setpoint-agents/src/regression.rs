//! Regression planning and batch replay over the execution pipeline

use serde::{Deserialize, Serialize};
use setpoint_core::{
    round_score, EvaluationReport, ScenarioTemplate, SceneContext, SimulationSample,
};
use setpoint_pipeline::ExecutionPipeline;
use std::collections::BTreeMap;

/// One synthetic regression case with its expected guardrail outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionCase {
    pub case_id: String,
    pub description: String,
    pub context: SceneContext,
    pub expected_approved: bool,
}

/// A regression suite for one template plus simple coverage ratios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionPlan {
    pub template_id: String,
    pub cases: Vec<RegressionCase>,
    pub coverage: BTreeMap<String, f64>,
}

impl RegressionPlan {
    /// View the plan's cases as simulation samples for the quality gate.
    pub fn as_samples(&self) -> Vec<SimulationSample> {
        self.cases
            .iter()
            .map(|case| SimulationSample::expecting(case.context.clone(), case.expected_approved))
            .collect()
    }
}

/// Builds synthetic regression suites that probe constraint boundaries and
/// guardrail breaches.
#[derive(Debug, Clone, Default)]
pub struct RegressionPlanner;

impl RegressionPlanner {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&self, template: &ScenarioTemplate) -> RegressionPlan {
        let nominal_values: BTreeMap<String, f64> = template
            .field_dictionary
            .fields()
            .iter()
            .map(|f| (f.field_name.clone(), 1.0))
            .collect();

        let mut cases = vec![RegressionCase {
            case_id: "nominal".to_string(),
            description: "Nominal operating point".to_string(),
            context: SceneContext::new(nominal_values.clone()),
            expected_approved: true,
        }];

        for (idx, constraint) in template.constraints.iter().enumerate() {
            if let Some(lower) = constraint.lower_bound {
                let mut values = nominal_values.clone();
                values.insert(constraint.field_name.clone(), lower);
                cases.push(RegressionCase {
                    case_id: format!("constraint-lower-{}", idx),
                    description: format!(
                        "Constraint lower boundary for {}",
                        constraint.field_name
                    ),
                    context: SceneContext::new(values),
                    expected_approved: true,
                });
            }
            if let Some(upper) = constraint.upper_bound {
                let mut values = nominal_values.clone();
                values.insert(constraint.field_name.clone(), upper);
                cases.push(RegressionCase {
                    case_id: format!("constraint-upper-{}", idx),
                    description: format!(
                        "Constraint upper boundary for {}",
                        constraint.field_name
                    ),
                    context: SceneContext::new(values),
                    expected_approved: true,
                });
            }
        }

        for (idx, rule) in template.guardrail.rules.iter().enumerate() {
            if let Some(max_value) = rule.max_value {
                let mut values = nominal_values.clone();
                values.insert(rule.field_name.clone(), max_value + 1.0);
                cases.push(RegressionCase {
                    case_id: format!("guardrail-breach-{}", idx),
                    description: format!("Guardrail breach case for {}", rule.field_name),
                    context: SceneContext::new(values),
                    expected_approved: false,
                });
            }
        }

        let mut coverage = BTreeMap::new();
        coverage.insert(
            "constraint_case_ratio".to_string(),
            round_score(template.constraints.len() as f64 / cases.len().max(1) as f64),
        );
        coverage.insert(
            "guardrail_case_ratio".to_string(),
            round_score(template.guardrail.rules.len() as f64 / cases.len().max(1) as f64),
        );

        RegressionPlan {
            template_id: template.template_id.clone(),
            cases,
            coverage,
        }
    }
}

/// Run a template over a sample batch and aggregate the outcomes.
pub fn replay_samples(
    pipeline: &ExecutionPipeline,
    scenario_id: &str,
    template: &ScenarioTemplate,
    samples: &[SimulationSample],
) -> EvaluationReport {
    if samples.is_empty() {
        return EvaluationReport {
            scenario_id: scenario_id.to_string(),
            total_runs: 0,
            approval_rate: 0.0,
            mean_objective: 0.0,
            violation_rate: 0.0,
            expectation_match_rate: None,
        };
    }

    let results: Vec<_> = samples
        .iter()
        .map(|sample| pipeline.run(&sample.context, template))
        .collect();
    let total = results.len();
    let approvals = results.iter().filter(|r| r.executed).count();
    let mean_objective =
        results.iter().map(|r| r.plan.objective_value).sum::<f64>() / total as f64;
    let violations = results
        .iter()
        .filter(|r| !r.guardrail.violations.is_empty())
        .count();

    let expected_pairs: Vec<(bool, bool)> = samples
        .iter()
        .zip(&results)
        .filter_map(|(sample, result)| {
            sample.expected_approved.map(|expected| (expected, result.executed))
        })
        .collect();
    let expectation_match_rate = if expected_pairs.is_empty() {
        None
    } else {
        let matches = expected_pairs
            .iter()
            .filter(|(expected, actual)| expected == actual)
            .count();
        Some(matches as f64 / expected_pairs.len() as f64)
    };

    EvaluationReport {
        scenario_id: scenario_id.to_string(),
        total_runs: total,
        approval_rate: approvals as f64 / total as f64,
        mean_objective,
        violation_rate: violations as f64 / total as f64,
        expectation_match_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use setpoint_test_utils::{energy_context, energy_efficiency_template};

    #[test]
    fn test_plan_covers_boundaries_and_breaches() {
        let template = energy_efficiency_template();
        let plan = RegressionPlanner::new().build(&template);

        assert_eq!(plan.template_id, template.template_id);
        assert_eq!(plan.cases[0].case_id, "nominal");
        // steam_flow ge contributes one lower case; boiler_temp between
        // contributes lower + upper; two guardrail rules carry max_value.
        let boundary_cases = plan
            .cases
            .iter()
            .filter(|c| c.case_id.starts_with("constraint-"))
            .count();
        assert_eq!(boundary_cases, 3);
        let breach_cases: Vec<_> = plan
            .cases
            .iter()
            .filter(|c| c.case_id.starts_with("guardrail-breach-"))
            .collect();
        assert_eq!(breach_cases.len(), 2);
        assert!(breach_cases.iter().all(|c| !c.expected_approved));
    }

    #[test]
    fn test_breach_case_exceeds_rule_max() {
        let template = energy_efficiency_template();
        let plan = RegressionPlanner::new().build(&template);
        let breach = plan
            .cases
            .iter()
            .find(|c| {
                c.case_id.starts_with("guardrail-breach-") && c.description.contains("boiler_temp")
            })
            .unwrap();
        assert_eq!(breach.context.value("boiler_temp"), Some(901.0));
    }

    #[test]
    fn test_replay_reports_rates() {
        let template = energy_efficiency_template();
        let pipeline = ExecutionPipeline::default();

        let mut hot = energy_context();
        hot.values.insert("boiler_temp".to_string(), 2000.0);
        let samples = vec![
            SimulationSample::expecting(energy_context(), true),
            SimulationSample::expecting(hot, false),
        ];

        let report = replay_samples(&pipeline, "energy", &template, &samples);
        assert_eq!(report.total_runs, 2);
        assert_eq!(report.approval_rate, 0.5);
        assert_eq!(report.violation_rate, 0.5);
        assert_eq!(report.expectation_match_rate, Some(1.0));
    }

    #[test]
    fn test_replay_empty_samples() {
        let template = energy_efficiency_template();
        let report = replay_samples(&ExecutionPipeline::default(), "empty", &template, &[]);
        assert_eq!(report.total_runs, 0);
        assert_eq!(report.expectation_match_rate, None);
    }
}

//! Guardrail stage

use setpoint_core::{
    GuardrailAction, GuardrailDecision, GuardrailSpec, OptimizationPlan, PipelineError,
    SceneContext, SetpointError, SetpointResult,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Screens an optimizer plan against the template's safety rules.
pub trait SafetyGuardrail: Send + Sync {
    fn validate(
        &self,
        plan: &OptimizationPlan,
        context: &SceneContext,
        guardrail: &GuardrailSpec,
    ) -> GuardrailDecision;
}

/// Reference guardrail: checks every rule's envelope and step limit, clips
/// where the rule says clip, and rejects the whole plan when any violated
/// rule demands it. The dominant action escalates monotonically
/// warn -> clip -> reject across the scan.
#[derive(Debug, Clone, Default)]
pub struct RuleGuardrail;

impl SafetyGuardrail for RuleGuardrail {
    fn validate(
        &self,
        plan: &OptimizationPlan,
        context: &SceneContext,
        guardrail: &GuardrailSpec,
    ) -> GuardrailDecision {
        let mut adjusted = plan.recommended_setpoints.clone();
        let mut violations: Vec<String> = Vec::new();
        let mut dominant = GuardrailAction::Warn;

        for rule in &guardrail.rules {
            let field = rule.field_name.as_str();
            let Some(value) = adjusted.get(field).copied() else {
                // A rule over a field the plan does not even produce is
                // itself a violation, and the most severe kind.
                violations.push(format!("missing field in plan: {}", field));
                dominant = dominant.escalate(GuardrailAction::Reject);
                continue;
            };
            let baseline = context.value(field);

            let mut violated = false;
            if let Some(min_value) = rule.min_value {
                if value < min_value {
                    violations.push(format!("{} below minimum {}", field, min_value));
                    violated = true;
                    if rule.action == GuardrailAction::Clip {
                        adjusted.insert(field.to_string(), min_value);
                    }
                }
            }
            if let Some(max_value) = rule.max_value {
                if value > max_value {
                    violations.push(format!("{} above maximum {}", field, max_value));
                    violated = true;
                    if rule.action == GuardrailAction::Clip {
                        adjusted.insert(field.to_string(), max_value);
                    }
                }
            }
            if let (Some(max_delta), Some(baseline)) = (rule.max_delta, baseline) {
                let delta = (value - baseline).abs();
                if delta > max_delta {
                    violations.push(format!("{} delta {:.4} > {}", field, delta, max_delta));
                    violated = true;
                    if rule.action == GuardrailAction::Clip {
                        let clipped = if value > baseline {
                            baseline + max_delta
                        } else {
                            baseline - max_delta
                        };
                        adjusted.insert(field.to_string(), clipped);
                    }
                }
            }

            if violated {
                dominant = dominant.escalate(rule.action);
            }
        }

        if dominant == GuardrailAction::Reject {
            // No partial adoption of a rejected plan: revert wholesale.
            return GuardrailDecision {
                approved: false,
                violations,
                action: GuardrailAction::Reject,
                adjusted_setpoints: context.values.clone(),
            };
        }

        GuardrailDecision {
            approved: true,
            violations,
            action: dominant,
            adjusted_setpoints: adjusted,
        }
    }
}

/// Registry of named guardrails, populated once at startup.
#[derive(Default)]
pub struct GuardrailRegistry {
    guardrails: BTreeMap<String, Arc<dyn SafetyGuardrail>>,
}

impl GuardrailRegistry {
    pub fn new() -> Self {
        Self {
            guardrails: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, guardrail: Box<dyn SafetyGuardrail>) {
        self.guardrails.insert(name.into(), Arc::from(guardrail));
    }

    pub fn get(&self, name: &str) -> SetpointResult<Arc<dyn SafetyGuardrail>> {
        self.guardrails.get(name).cloned().ok_or_else(|| {
            SetpointError::Pipeline(PipelineError::StageNotFound {
                kind: "guardrail".to_string(),
                name: name.to_string(),
            })
        })
    }

    pub fn names(&self) -> Vec<String> {
        self.guardrails.keys().cloned().collect()
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use setpoint_core::{GuardrailRule, SolverStatus};

    fn arb_action() -> impl Strategy<Value = GuardrailAction> {
        prop_oneof![
            Just(GuardrailAction::Warn),
            Just(GuardrailAction::Clip),
            Just(GuardrailAction::Reject),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// The dominant action of a scan never ranks below the starting Warn
        /// and equals the most severe action among violated rules.
        #[test]
        fn prop_escalation_is_monotonic(
            actions in prop::collection::vec(arb_action(), 1..6),
            values in prop::collection::vec(-100.0f64..100.0, 1..6),
        ) {
            let n = actions.len().min(values.len());
            let mut setpoints = std::collections::BTreeMap::new();
            let mut rules = Vec::new();
            for i in 0..n {
                let field = format!("f{}", i);
                setpoints.insert(field.clone(), values[i]);
                // Every rule violates: value always exceeds max val - 1000.
                rules.push(
                    GuardrailRule::new(field, actions[i]).with_max_value(values[i] - 1000.0),
                );
            }
            let plan = OptimizationPlan {
                recommended_setpoints: setpoints.clone(),
                objective_value: 0.0,
                solver_status: SolverStatus::Solved,
                diagnostics: Default::default(),
            };
            let context = SceneContext::new(setpoints);
            let decision =
                RuleGuardrail.validate(&plan, &context, &GuardrailSpec::new(rules));

            let most_severe = actions[..n]
                .iter()
                .copied()
                .fold(GuardrailAction::Warn, GuardrailAction::escalate);
            prop_assert_eq!(decision.action, most_severe);
            prop_assert_eq!(decision.approved, most_severe != GuardrailAction::Reject);
        }
    }
}

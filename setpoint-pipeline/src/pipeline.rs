//! Composed predictor -> optimizer -> guardrail pipeline

use crate::{
    HorizonPredictor, Optimizer, Predictor, ProjectedHeuristicOptimizer, RuleGuardrail,
    SafetyGuardrail,
};
use setpoint_core::{PipelineResult, ScenarioTemplate, SceneContext};
use std::sync::Arc;

/// Turns a template plus a point-in-time context into a concrete action plan.
///
/// Used identically by live execution and by the quality evaluator's
/// sampling. Stateless and synchronous: the same `(context, template)` pair
/// always yields a bit-identical result, and independent runs share nothing
/// mutable.
#[derive(Clone)]
pub struct ExecutionPipeline {
    predictor: Arc<dyn Predictor>,
    optimizer: Arc<dyn Optimizer>,
    guardrail: Arc<dyn SafetyGuardrail>,
}

impl ExecutionPipeline {
    pub fn new(
        predictor: Arc<dyn Predictor>,
        optimizer: Arc<dyn Optimizer>,
        guardrail: Arc<dyn SafetyGuardrail>,
    ) -> Self {
        Self {
            predictor,
            optimizer,
            guardrail,
        }
    }

    /// Run one full pipeline pass.
    ///
    /// A guardrail rejection is a normal outcome: `executed` is false and the
    /// final setpoints revert to the context values untouched.
    pub fn run(&self, context: &SceneContext, template: &ScenarioTemplate) -> PipelineResult {
        let prediction = self.predictor.predict(context, &template.prediction);
        let plan = self.optimizer.solve(
            &prediction,
            &template.objective,
            &template.constraints,
            &template.optimization,
            context,
        );
        let decision = self.guardrail.validate(&plan, context, &template.guardrail);

        tracing::debug!(
            template_id = %template.template_id,
            approved = decision.approved,
            violations = decision.violations.len(),
            "pipeline run complete"
        );

        let final_setpoints = if decision.approved {
            decision.adjusted_setpoints.clone()
        } else {
            context.values.clone()
        };
        let executed = decision.approved;

        PipelineResult {
            template_id: template.template_id.clone(),
            prediction,
            plan,
            guardrail: decision,
            final_setpoints,
            executed,
        }
    }
}

impl Default for ExecutionPipeline {
    fn default() -> Self {
        Self::new(
            Arc::new(HorizonPredictor),
            Arc::new(ProjectedHeuristicOptimizer),
            Arc::new(RuleGuardrail),
        )
    }
}

impl std::fmt::Debug for ExecutionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionPipeline").finish_non_exhaustive()
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use setpoint_test_utils::energy_efficiency_template;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Running the same (context, template) pair twice yields identical
        /// results for arbitrary context values.
        #[test]
        fn prop_pipeline_determinism(
            temp in 0.0f64..2500.0,
            flow in 0.0f64..50.0,
            cost in 0.0f64..1000.0,
            efficiency in 0.0f64..1.5,
        ) {
            let pipeline = ExecutionPipeline::default();
            let template = energy_efficiency_template();
            let context = SceneContext::from_pairs([
                ("boiler_temp", temp),
                ("steam_flow", flow),
                ("energy_cost", cost),
                ("efficiency", efficiency),
            ]);

            let first = pipeline.run(&context, &template);
            let second = pipeline.run(&context, &template);
            prop_assert_eq!(first, second);
        }
    }
}

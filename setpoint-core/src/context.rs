//! Runtime snapshot and execution-pipeline result types

use crate::{GuardrailAction, SolverStatus, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A point-in-time field snapshot - the sole runtime input to the execution
/// pipeline. Values use an ordered map so identical inputs always produce
/// bit-identical pipeline output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SceneContext {
    pub values: BTreeMap<String, f64>,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub timestamp: Timestamp,
}

impl SceneContext {
    pub fn new(values: BTreeMap<String, f64>) -> Self {
        Self {
            values,
            metadata: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Build a context from (field, value) pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self::new(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn value(&self, field_name: &str) -> Option<f64> {
        self.values.get(field_name).copied()
    }
}

/// Output of the predictor stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PredictionResult {
    pub predictions: BTreeMap<String, f64>,
    pub model_signature: String,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub diagnostics: BTreeMap<String, serde_json::Value>,
}

/// Output of the optimizer stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct OptimizationPlan {
    pub recommended_setpoints: BTreeMap<String, f64>,
    pub objective_value: f64,
    pub solver_status: SolverStatus,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub diagnostics: BTreeMap<String, serde_json::Value>,
}

/// Output of the guardrail stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GuardrailDecision {
    pub approved: bool,
    pub violations: Vec<String>,
    /// Most severe action encountered across the rule scan
    pub action: GuardrailAction,
    pub adjusted_setpoints: BTreeMap<String, f64>,
}

/// Result of one full predictor -> optimizer -> guardrail run.
/// A rejected plan is a normal outcome (`executed == false`), not a fault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PipelineResult {
    pub template_id: String,
    pub prediction: PredictionResult,
    pub plan: OptimizationPlan,
    pub guardrail: GuardrailDecision,
    pub final_setpoints: BTreeMap<String, f64>,
    pub executed: bool,
}

/// One regression sample: a context plus an optional expected approval flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SimulationSample {
    pub context: SceneContext,
    pub expected_approved: Option<bool>,
}

impl SimulationSample {
    pub fn new(context: SceneContext) -> Self {
        Self {
            context,
            expected_approved: None,
        }
    }

    pub fn expecting(context: SceneContext, approved: bool) -> Self {
        Self {
            context,
            expected_approved: Some(approved),
        }
    }
}

/// Aggregate statistics over a batch of pipeline runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EvaluationReport {
    pub scenario_id: String,
    pub total_runs: usize,
    pub approval_rate: f64,
    pub mean_objective: f64,
    pub violation_rate: f64,
    pub expectation_match_rate: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_from_pairs() {
        let context = SceneContext::from_pairs([("boiler_temp", 420.0), ("pressure", 96.5)]);
        assert_eq!(context.value("boiler_temp"), Some(420.0));
        assert_eq!(context.value("steam_flow"), None);
    }

    #[test]
    fn test_context_values_are_ordered() {
        let context = SceneContext::from_pairs([("zeta", 1.0), ("alpha", 2.0)]);
        let keys: Vec<&String> = context.values.keys().collect();
        assert_eq!(keys, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_simulation_sample_expectation() {
        let sample = SimulationSample::expecting(SceneContext::from_pairs([("t", 1.0)]), false);
        assert_eq!(sample.expected_approved, Some(false));
        let bare = SimulationSample::new(SceneContext::from_pairs([("t", 1.0)]));
        assert_eq!(bare.expected_approved, None);
    }
}

//! Predictor stage

use serde_json::json;
use setpoint_core::{
    PipelineError, PredictionResult, PredictionSpec, SceneContext, SetpointError, SetpointResult,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Forecasts feature fields from a context snapshot.
/// Implementations must be pure: same inputs, same output, no hidden state.
pub trait Predictor: Send + Sync {
    fn predict(&self, context: &SceneContext, spec: &PredictionSpec) -> PredictionResult;
}

/// Reference predictor: applies a small per-step drift to the current value,
/// capped at ten steps of horizon.
#[derive(Debug, Clone, Default)]
pub struct HorizonPredictor;

impl Predictor for HorizonPredictor {
    fn predict(&self, context: &SceneContext, spec: &PredictionSpec) -> PredictionResult {
        let horizon_gain = 1.0 + f64::from(spec.horizon_steps.min(10)) * 0.005;

        let mut predictions = BTreeMap::new();
        for field in &spec.feature_fields {
            let baseline = context.value(field).unwrap_or(0.0);
            predictions.insert(field.clone(), baseline * horizon_gain);
        }

        let mut diagnostics = BTreeMap::new();
        diagnostics.insert("strategy".to_string(), json!("horizon-drift"));
        diagnostics.insert("horizon_steps".to_string(), json!(spec.horizon_steps));
        diagnostics.insert("covered_features".to_string(), json!(predictions.len()));

        PredictionResult {
            predictions,
            model_signature: spec.model_signature.clone(),
            diagnostics,
        }
    }
}

/// Registry of named predictors, populated once at startup.
#[derive(Default)]
pub struct PredictorRegistry {
    predictors: BTreeMap<String, Arc<dyn Predictor>>,
}

impl PredictorRegistry {
    pub fn new() -> Self {
        Self {
            predictors: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, predictor: Box<dyn Predictor>) {
        self.predictors.insert(name.into(), Arc::from(predictor));
    }

    pub fn get(&self, name: &str) -> SetpointResult<Arc<dyn Predictor>> {
        self.predictors.get(name).cloned().ok_or_else(|| {
            SetpointError::Pipeline(PipelineError::StageNotFound {
                kind: "predictor".to_string(),
                name: name.to_string(),
            })
        })
    }

    pub fn names(&self) -> Vec<String> {
        self.predictors.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(horizon: u32) -> PredictionSpec {
        PredictionSpec::new(vec!["boiler_temp".to_string(), "absent".to_string()], horizon)
            .unwrap()
    }

    #[test]
    fn test_predictor_applies_horizon_gain() {
        let context = SceneContext::from_pairs([("boiler_temp", 400.0)]);
        let result = HorizonPredictor.predict(&context, &spec(3));
        let expected = 400.0 * (1.0 + 3.0 * 0.005);
        assert!((result.predictions["boiler_temp"] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_predictor_caps_horizon_at_ten_steps() {
        let context = SceneContext::from_pairs([("boiler_temp", 400.0)]);
        let at_cap = HorizonPredictor.predict(&context, &spec(10));
        let beyond_cap = HorizonPredictor.predict(&context, &spec(500));
        assert_eq!(
            at_cap.predictions["boiler_temp"],
            beyond_cap.predictions["boiler_temp"]
        );
    }

    #[test]
    fn test_predictor_defaults_missing_fields_to_zero() {
        let context = SceneContext::from_pairs([("boiler_temp", 400.0)]);
        let result = HorizonPredictor.predict(&context, &spec(3));
        assert_eq!(result.predictions["absent"], 0.0);
    }

    #[test]
    fn test_predictor_is_deterministic() {
        let context = SceneContext::from_pairs([("boiler_temp", 412.5)]);
        let a = HorizonPredictor.predict(&context, &spec(5));
        let b = HorizonPredictor.predict(&context, &spec(5));
        assert_eq!(a, b);
    }

    #[test]
    fn test_registry_lookup_and_miss() {
        let mut registry = PredictorRegistry::new();
        registry.register("horizon", Box::new(HorizonPredictor));
        assert!(registry.get("horizon").is_ok());
        assert_eq!(registry.names(), vec!["horizon"]);
        assert!(registry.get("lstm").is_err());
    }
}

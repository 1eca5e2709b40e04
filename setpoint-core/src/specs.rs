//! Objective, constraint, guardrail, prediction, and optimization specs

use crate::{
    ConstraintOperator, ConstraintSeverity, GuardrailAction, ObjectiveDirection, SpecError,
};
use serde::{Deserialize, Serialize};

// ============================================================================
// OBJECTIVE
// ============================================================================

/// One weighted objective term over a canonical field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ObjectiveTerm {
    pub field_name: String,
    pub direction: ObjectiveDirection,
    pub weight: f64,
}

impl ObjectiveTerm {
    pub fn new(
        field_name: impl Into<String>,
        direction: ObjectiveDirection,
        weight: f64,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            direction,
            weight,
        }
    }

    /// Shorthand for a minimize term.
    pub fn minimize(field_name: impl Into<String>, weight: f64) -> Self {
        Self::new(field_name, ObjectiveDirection::Min, weight)
    }

    /// Shorthand for a maximize term.
    pub fn maximize(field_name: impl Into<String>, weight: f64) -> Self {
        Self::new(field_name, ObjectiveDirection::Max, weight)
    }
}

/// Weighted multi-term objective.
///
/// Weights are normalized to sum to 1.0 at construction. Normalization is
/// idempotent: normalizing an already-normalized spec changes nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ObjectiveSpec {
    terms: Vec<ObjectiveTerm>,
}

impl ObjectiveSpec {
    /// Create an objective and normalize its weights.
    ///
    /// # Errors
    /// * `SpecError::EmptyObjective` for an empty term list
    /// * `SpecError::NonPositiveWeight` if any weight is <= 0
    pub fn new(terms: Vec<ObjectiveTerm>) -> Result<Self, SpecError> {
        if terms.is_empty() {
            return Err(SpecError::EmptyObjective);
        }
        for term in &terms {
            if term.weight <= 0.0 {
                return Err(SpecError::NonPositiveWeight {
                    field: term.field_name.clone(),
                    weight: term.weight,
                });
            }
        }
        let mut spec = Self { terms };
        spec.normalize();
        Ok(spec)
    }

    /// Divide every weight by the current total. A no-op when the weights
    /// already sum to 1.0.
    pub fn normalize(&mut self) {
        let total: f64 = self.terms.iter().map(|t| t.weight).sum();
        if total > 0.0 {
            for term in &mut self.terms {
                term.weight /= total;
            }
        }
    }

    /// Re-run the construction invariants. Used after deserialization.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.terms.is_empty() {
            return Err(SpecError::EmptyObjective);
        }
        for term in &self.terms {
            if term.weight <= 0.0 {
                return Err(SpecError::NonPositiveWeight {
                    field: term.field_name.clone(),
                    weight: term.weight,
                });
            }
        }
        Ok(())
    }

    pub fn terms(&self) -> &[ObjectiveTerm] {
        &self.terms
    }

    /// Field names referenced by the objective, in term order.
    pub fn field_names(&self) -> Vec<String> {
        self.terms.iter().map(|t| t.field_name.clone()).collect()
    }
}

// ============================================================================
// CONSTRAINTS
// ============================================================================

/// A single bound on one field.
///
/// Always internally consistent on its own: the constructors enforce the
/// bound(s) each operator requires and `lower <= upper` for ranges. Conflicts
/// *between* constraints on the same field are the validator's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ConstraintSpec {
    pub name: String,
    pub field_name: String,
    pub operator: ConstraintOperator,
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
    pub equals_value: Option<f64>,
    pub priority: i32,
    pub severity: ConstraintSeverity,
}

impl ConstraintSpec {
    /// Upper-bound constraint: value <= upper.
    pub fn le(name: impl Into<String>, field_name: impl Into<String>, upper: f64) -> Self {
        Self {
            name: name.into(),
            field_name: field_name.into(),
            operator: ConstraintOperator::Le,
            lower_bound: None,
            upper_bound: Some(upper),
            equals_value: None,
            priority: 100,
            severity: ConstraintSeverity::Hard,
        }
    }

    /// Lower-bound constraint: value >= lower.
    pub fn ge(name: impl Into<String>, field_name: impl Into<String>, lower: f64) -> Self {
        Self {
            name: name.into(),
            field_name: field_name.into(),
            operator: ConstraintOperator::Ge,
            lower_bound: Some(lower),
            upper_bound: None,
            equals_value: None,
            priority: 100,
            severity: ConstraintSeverity::Hard,
        }
    }

    /// Equality constraint: value == target.
    pub fn eq(name: impl Into<String>, field_name: impl Into<String>, target: f64) -> Self {
        Self {
            name: name.into(),
            field_name: field_name.into(),
            operator: ConstraintOperator::Eq,
            lower_bound: None,
            upper_bound: None,
            equals_value: Some(target),
            priority: 100,
            severity: ConstraintSeverity::Hard,
        }
    }

    /// Range constraint: lower <= value <= upper.
    ///
    /// # Errors
    /// `SpecError::InvertedBounds` when `lower > upper`.
    pub fn between(
        name: impl Into<String>,
        field_name: impl Into<String>,
        lower: f64,
        upper: f64,
    ) -> Result<Self, SpecError> {
        let name = name.into();
        if lower > upper {
            return Err(SpecError::InvertedBounds {
                constraint: name,
                lower,
                upper,
            });
        }
        Ok(Self {
            name,
            field_name: field_name.into(),
            operator: ConstraintOperator::Between,
            lower_bound: Some(lower),
            upper_bound: Some(upper),
            equals_value: None,
            priority: 100,
            severity: ConstraintSeverity::Hard,
        })
    }

    /// Set the projection priority (lower projects first).
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the severity.
    pub fn with_severity(mut self, severity: ConstraintSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// Re-run the construction invariants. Used after deserialization.
    pub fn validate(&self) -> Result<(), SpecError> {
        let missing = |bound: &str| SpecError::MissingBound {
            constraint: self.name.clone(),
            operator: self.operator.to_string(),
            bound: bound.to_string(),
        };
        match self.operator {
            ConstraintOperator::Le => {
                if self.upper_bound.is_none() {
                    return Err(missing("upper_bound"));
                }
            }
            ConstraintOperator::Ge => {
                if self.lower_bound.is_none() {
                    return Err(missing("lower_bound"));
                }
            }
            ConstraintOperator::Eq => {
                if self.equals_value.is_none() {
                    return Err(missing("equals_value"));
                }
            }
            ConstraintOperator::Between => {
                let (lower, upper) = match (self.lower_bound, self.upper_bound) {
                    (Some(lower), Some(upper)) => (lower, upper),
                    (None, _) => return Err(missing("lower_bound")),
                    (_, None) => return Err(missing("upper_bound")),
                };
                if lower > upper {
                    return Err(SpecError::InvertedBounds {
                        constraint: self.name.clone(),
                        lower,
                        upper,
                    });
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// GUARDRAILS
// ============================================================================

/// A safety rule on one field: absolute envelope and/or step limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GuardrailRule {
    pub field_name: String,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    /// Largest allowed move away from the prior context value
    pub max_delta: Option<f64>,
    pub action: GuardrailAction,
}

impl GuardrailRule {
    pub fn new(field_name: impl Into<String>, action: GuardrailAction) -> Self {
        Self {
            field_name: field_name.into(),
            min_value: None,
            max_value: None,
            max_delta: None,
            action,
        }
    }

    pub fn with_min_value(mut self, min_value: f64) -> Self {
        self.min_value = Some(min_value);
        self
    }

    pub fn with_max_value(mut self, max_value: f64) -> Self {
        self.max_value = Some(max_value);
        self
    }

    pub fn with_max_delta(mut self, max_delta: f64) -> Self {
        self.max_delta = Some(max_delta);
        self
    }
}

/// Guardrail rule set plus the policy applied when a plan is refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GuardrailSpec {
    pub rules: Vec<GuardrailRule>,
    pub fallback_policy: String,
}

impl GuardrailSpec {
    pub fn new(rules: Vec<GuardrailRule>) -> Self {
        Self {
            rules,
            fallback_policy: "keep_previous".to_string(),
        }
    }

    /// Whether any rule covers the given field.
    pub fn covers(&self, field_name: &str) -> bool {
        self.rules.iter().any(|r| r.field_name == field_name)
    }
}

impl Default for GuardrailSpec {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

// ============================================================================
// PREDICTION & OPTIMIZATION
// ============================================================================

/// What the predictor consumes and how far ahead it looks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PredictionSpec {
    pub feature_fields: Vec<String>,
    pub horizon_steps: u32,
    pub model_signature: String,
}

impl PredictionSpec {
    /// # Errors
    /// * `SpecError::EmptyFeatureFields` for an empty feature list
    /// * `SpecError::InvalidHorizon` for a zero horizon
    pub fn new(feature_fields: Vec<String>, horizon_steps: u32) -> Result<Self, SpecError> {
        let spec = Self {
            feature_fields,
            horizon_steps,
            model_signature: "heuristic:v1".to_string(),
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn with_model_signature(mut self, signature: impl Into<String>) -> Self {
        self.model_signature = signature.into();
        self
    }

    /// Re-run the construction invariants. Used after deserialization.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.feature_fields.is_empty() {
            return Err(SpecError::EmptyFeatureFields);
        }
        if self.horizon_steps < 1 {
            return Err(SpecError::InvalidHorizon {
                got: self.horizon_steps,
            });
        }
        Ok(())
    }
}

/// Solver selection and budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct OptimizationSpec {
    pub solver_name: String,
    pub max_iterations: u32,
    pub tolerance: f64,
    pub time_budget_ms: u64,
}

impl OptimizationSpec {
    pub fn new(
        solver_name: impl Into<String>,
        max_iterations: u32,
        tolerance: f64,
        time_budget_ms: u64,
    ) -> Self {
        Self {
            solver_name: solver_name.into(),
            max_iterations,
            tolerance,
            time_budget_ms,
        }
    }
}

impl Default for OptimizationSpec {
    fn default() -> Self {
        Self::new("projected-heuristic", 50, 1e-6, 200)
    }
}

// ============================================================================
// SCENE METADATA
// ============================================================================

/// Identifying metadata for one control scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SceneMetadata {
    pub scene_id: String,
    pub scenario_type: String,
    pub tags: Vec<String>,
    /// Sampling granularity of the underlying process data
    pub granularity_sec: u32,
    /// How long one recommended plan stays actionable
    pub execution_window_sec: u32,
}

impl SceneMetadata {
    pub fn new(scene_id: impl Into<String>) -> Self {
        Self {
            scene_id: scene_id.into(),
            scenario_type: "generic".to_string(),
            tags: Vec::new(),
            granularity_sec: 60,
            execution_window_sec: 300,
        }
    }

    pub fn with_scenario_type(mut self, scenario_type: impl Into<String>) -> Self {
        self.scenario_type = scenario_type.into();
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_windows(mut self, granularity_sec: u32, execution_window_sec: u32) -> Self {
        self.granularity_sec = granularity_sec.max(1);
        self.execution_window_sec = execution_window_sec.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_objective_weights_normalize_to_one() {
        let spec = ObjectiveSpec::new(vec![
            ObjectiveTerm::minimize("energy_cost", 3.0),
            ObjectiveTerm::maximize("efficiency", 1.0),
        ])
        .unwrap();
        let total: f64 = spec.terms().iter().map(|t| t.weight).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!((spec.terms()[0].weight - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_objective_rejects_empty_terms() {
        assert_eq!(ObjectiveSpec::new(vec![]).unwrap_err(), SpecError::EmptyObjective);
    }

    #[test]
    fn test_objective_rejects_non_positive_weight() {
        let err = ObjectiveSpec::new(vec![ObjectiveTerm::minimize("cost", 0.0)]).unwrap_err();
        assert!(matches!(err, SpecError::NonPositiveWeight { .. }));
    }

    #[test]
    fn test_between_rejects_inverted_bounds() {
        let err = ConstraintSpec::between("temp_range", "boiler_temp", 900.0, 200.0).unwrap_err();
        assert!(matches!(err, SpecError::InvertedBounds { .. }));
    }

    #[test]
    fn test_constraint_constructors_set_required_bounds() {
        let le = ConstraintSpec::le("cap", "pressure", 500.0);
        assert_eq!(le.upper_bound, Some(500.0));
        assert!(le.validate().is_ok());

        let ge = ConstraintSpec::ge("floor", "steam_flow", 0.0);
        assert_eq!(ge.lower_bound, Some(0.0));
        assert!(ge.validate().is_ok());

        let eq = ConstraintSpec::eq("pin", "valve_pos", 0.5);
        assert_eq!(eq.equals_value, Some(0.5));
        assert!(eq.validate().is_ok());
    }

    #[test]
    fn test_validate_catches_stripped_bound_after_deserialization() {
        let mut le = ConstraintSpec::le("cap", "pressure", 500.0);
        le.upper_bound = None;
        assert!(matches!(le.validate(), Err(SpecError::MissingBound { .. })));
    }

    #[test]
    fn test_prediction_spec_construction_checks() {
        assert!(matches!(
            PredictionSpec::new(vec![], 3),
            Err(SpecError::EmptyFeatureFields)
        ));
        assert!(matches!(
            PredictionSpec::new(vec!["temp".to_string()], 0),
            Err(SpecError::InvalidHorizon { .. })
        ));
        let spec = PredictionSpec::new(vec!["temp".to_string()], 3).unwrap();
        assert_eq!(spec.model_signature, "heuristic:v1");
    }

    #[test]
    fn test_guardrail_spec_coverage() {
        let spec = GuardrailSpec::new(vec![GuardrailRule::new(
            "boiler_temp",
            GuardrailAction::Clip,
        )
        .with_max_delta(0.2)]);
        assert!(spec.covers("boiler_temp"));
        assert!(!spec.covers("pressure"));
        assert_eq!(spec.fallback_policy, "keep_previous");
    }

    #[test]
    fn test_optimization_spec_defaults() {
        let spec = OptimizationSpec::default();
        assert_eq!(spec.solver_name, "projected-heuristic");
        assert_eq!(spec.max_iterations, 50);
        assert_eq!(spec.time_budget_ms, 200);
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// For any valid ObjectiveSpec, weights sum to 1.0 after construction
        /// and normalizing again is a no-op.
        #[test]
        fn prop_objective_normalization_idempotent(
            weights in prop::collection::vec(0.001f64..1000.0, 1..8)
        ) {
            let terms = weights
                .iter()
                .enumerate()
                .map(|(i, w)| ObjectiveTerm::minimize(format!("f{}", i), *w))
                .collect();
            let mut spec = ObjectiveSpec::new(terms).unwrap();

            let total: f64 = spec.terms().iter().map(|t| t.weight).sum();
            prop_assert!((total - 1.0).abs() < 1e-9);

            let before = spec.clone();
            spec.normalize();
            for (a, b) in before.terms().iter().zip(spec.terms()) {
                prop_assert!((a.weight - b.weight).abs() < 1e-12);
            }
        }

        /// Between construction fails exactly when lower > upper.
        #[test]
        fn prop_between_bound_ordering(lower in -1000.0f64..1000.0, upper in -1000.0f64..1000.0) {
            let result = ConstraintSpec::between("range", "field", lower, upper);
            prop_assert_eq!(result.is_ok(), lower <= upper);
        }
    }
}

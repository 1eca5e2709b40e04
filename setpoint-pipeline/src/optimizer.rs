//! Optimizer stage

use serde_json::json;
use setpoint_core::{
    ConstraintOperator, ConstraintSpec, ObjectiveDirection, ObjectiveSpec, OptimizationPlan,
    OptimizationSpec, PipelineError, PredictionResult, SceneContext, SetpointError,
    SetpointResult, SolverStatus,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Turns a prediction plus the template's objective and constraints into a
/// recommended setpoint plan.
pub trait Optimizer: Send + Sync {
    fn solve(
        &self,
        prediction: &PredictionResult,
        objective: &ObjectiveSpec,
        constraints: &[ConstraintSpec],
        optimization: &OptimizationSpec,
        context: &SceneContext,
    ) -> OptimizationPlan;
}

/// Reference optimizer: nudges each objective field toward its predicted
/// baseline, then projects the result onto the constraints in priority order.
/// Explicitly approximate - a stand-in for a real solver, not one itself.
#[derive(Debug, Clone, Default)]
pub struct ProjectedHeuristicOptimizer;

impl ProjectedHeuristicOptimizer {
    fn objective_value(setpoints: &BTreeMap<String, f64>, objective: &ObjectiveSpec) -> f64 {
        let mut score = 0.0;
        for term in objective.terms() {
            let value = setpoints.get(&term.field_name).copied().unwrap_or(0.0);
            match term.direction {
                ObjectiveDirection::Min => score += term.weight * value,
                ObjectiveDirection::Max => score -= term.weight * value,
            }
        }
        score
    }
}

impl Optimizer for ProjectedHeuristicOptimizer {
    fn solve(
        &self,
        prediction: &PredictionResult,
        objective: &ObjectiveSpec,
        constraints: &[ConstraintSpec],
        optimization: &OptimizationSpec,
        context: &SceneContext,
    ) -> OptimizationPlan {
        let mut setpoints = context.values.clone();

        // 2% per unit of weight toward the predicted baseline.
        for term in objective.terms() {
            let base = prediction
                .predictions
                .get(&term.field_name)
                .copied()
                .or_else(|| context.value(&term.field_name))
                .unwrap_or(0.0);
            let nudged = match term.direction {
                ObjectiveDirection::Min => base * (1.0 - 0.02 * term.weight),
                ObjectiveDirection::Max => base * (1.0 + 0.02 * term.weight),
            };
            setpoints.insert(term.field_name.clone(), nudged);
        }

        let mut ordered: Vec<&ConstraintSpec> = constraints.iter().collect();
        ordered.sort_by_key(|c| c.priority);

        let mut infeasible_reasons: Vec<String> = Vec::new();
        for constraint in ordered {
            let field = constraint.field_name.as_str();
            let value = setpoints
                .get(field)
                .copied()
                .or_else(|| context.value(field))
                .unwrap_or(0.0);

            match constraint.operator {
                ConstraintOperator::Le => {
                    if let Some(upper) = constraint.upper_bound {
                        setpoints.insert(field.to_string(), value.min(upper));
                    }
                }
                ConstraintOperator::Ge => {
                    if let Some(lower) = constraint.lower_bound {
                        setpoints.insert(field.to_string(), value.max(lower));
                    }
                }
                ConstraintOperator::Eq => {
                    if let Some(target) = constraint.equals_value {
                        setpoints.insert(field.to_string(), target);
                    }
                }
                ConstraintOperator::Between => {
                    if let (Some(lower), Some(upper)) =
                        (constraint.lower_bound, constraint.upper_bound)
                    {
                        // Construction forbids inverted bounds; an externally
                        // deserialized spec can still carry them, so skip the
                        // projection and surface the infeasibility instead.
                        if lower > upper {
                            infeasible_reasons
                                .push(format!("{}: lower_bound > upper_bound", constraint.name));
                            continue;
                        }
                        setpoints.insert(field.to_string(), value.clamp(lower, upper));
                    }
                }
            }
        }

        let objective_value = Self::objective_value(&setpoints, objective);
        let solver_status = if infeasible_reasons.is_empty() {
            SolverStatus::Solved
        } else {
            SolverStatus::Infeasible
        };

        let mut diagnostics = BTreeMap::new();
        diagnostics.insert("solver".to_string(), json!(optimization.solver_name));
        diagnostics.insert(
            "iterations".to_string(),
            json!(optimization
                .max_iterations
                .min((objective.terms().len() + constraints.len() + 1) as u32)),
        );
        diagnostics.insert("infeasible_reasons".to_string(), json!(infeasible_reasons));

        OptimizationPlan {
            recommended_setpoints: setpoints,
            objective_value,
            solver_status,
            diagnostics,
        }
    }
}

/// Registry of named optimizers, populated once at startup.
#[derive(Default)]
pub struct OptimizerRegistry {
    optimizers: BTreeMap<String, Arc<dyn Optimizer>>,
}

impl OptimizerRegistry {
    pub fn new() -> Self {
        Self {
            optimizers: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, optimizer: Box<dyn Optimizer>) {
        self.optimizers.insert(name.into(), Arc::from(optimizer));
    }

    pub fn get(&self, name: &str) -> SetpointResult<Arc<dyn Optimizer>> {
        self.optimizers.get(name).cloned().ok_or_else(|| {
            SetpointError::Pipeline(PipelineError::StageNotFound {
                kind: "optimizer".to_string(),
                name: name.to_string(),
            })
        })
    }

    pub fn names(&self) -> Vec<String> {
        self.optimizers.keys().cloned().collect()
    }
}

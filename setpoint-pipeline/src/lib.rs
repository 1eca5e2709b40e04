//! SETPOINT Pipeline - Execution Engine
//!
//! The prediction -> optimization -> guardrail chain that turns a scenario
//! template plus a live snapshot into a concrete, safety-screened action
//! plan. Stage implementations are trait objects resolved from read-only
//! registries populated at process start; the reference implementations are
//! deterministic heuristics, not production solvers.

mod guardrail;
mod optimizer;
mod pipeline;
mod predictor;

pub use guardrail::{GuardrailRegistry, RuleGuardrail, SafetyGuardrail};
pub use optimizer::{Optimizer, OptimizerRegistry, ProjectedHeuristicOptimizer};
pub use pipeline::ExecutionPipeline;
pub use predictor::{HorizonPredictor, Predictor, PredictorRegistry};

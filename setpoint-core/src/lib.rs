//! SETPOINT Core - Contract Types
//!
//! Pure data structures for the scenario migration engine. All other crates
//! depend on this one; it contains only contracts, construction invariants,
//! and errors - no orchestration logic.

use chrono::{DateTime, Utc};

mod config;
mod context;
mod draft;
mod enums;
mod error;
mod fields;
mod specs;
mod template;

pub use config::{QualityGate, ReflectionConfig};
pub use context::{
    EvaluationReport, GuardrailDecision, OptimizationPlan, PipelineResult, PredictionResult,
    SceneContext, SimulationSample,
};
pub use draft::{
    new_draft_id, new_run_id, now, CriticFeedback, MappingResult, MigrationDraft, MigrationRisk,
    MigrationValidationIssue, MigrationValidationReport, QualityIssue, ReflectionReport,
    ReflectionStep, SourceMapping, TemplateQualityReport, BLOCKED_FATAL_CRITIC,
    BLOCKED_MAX_ITERATIONS,
};
pub use enums::{
    ConstraintOperator, ConstraintSeverity, GuardrailAction, IssueSeverity, MissingValueStrategy,
    ObjectiveDirection, RunStatus, SolverStatus,
};
pub use error::{
    ConfigError, LlmError, PipelineError, SetpointError, SetpointResult, SpecError, StoreError,
};
pub use fields::{FieldDefinition, FieldDictionary};
pub use specs::{
    ConstraintSpec, GuardrailRule, GuardrailSpec, ObjectiveSpec, ObjectiveTerm, OptimizationSpec,
    PredictionSpec, SceneMetadata,
};
pub use template::ScenarioTemplate;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Round a score to four decimal places, the precision reports are stored at.
pub fn round_score(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

//! SETPOINT Agents - Generation, Validation, Quality, and Reflection
//!
//! The reflection engine that turns a migration request plus a legacy point
//! list into a machine-checked scenario template:
//! - [`PointMapper`] resolves legacy point names against the dictionary
//! - [`TemplateGenerator`] proposes candidate templates
//! - [`TemplateValidator`] runs structural/semantic/conflict checks
//! - [`TemplateQualityEvaluator`] scores the five-dimension quality gate
//! - [`Critic`] explains failures and proposes one correction
//! - [`ReflectionOrchestrator`] drives the bounded loop to a verdict
//!
//! Every agent with a delegated (LLM) path degrades deterministically to its
//! rule path after two failed attempts; no delegated failure ever reaches
//! the orchestrator.

mod critic;
mod generator;
mod mapper;
mod quality;
mod reflection;
mod regression;
mod schemas;
mod validator;

pub use critic::Critic;
pub use generator::{GenerationRequest, TemplateGenerator};
pub use mapper::PointMapper;
pub use quality::TemplateQualityEvaluator;
pub use reflection::{ReflectionOrchestrator, ReflectionRequest};
pub use regression::{replay_samples, RegressionCase, RegressionPlan, RegressionPlanner};
pub use schemas::{
    CriticOutput, GeneratorConstraintOutput, GeneratorGuardrailOutput,
    GeneratorGuardrailRuleOutput, GeneratorObjectiveOutput, GeneratorOperator, GeneratorOutput,
    GeneratorPredictionOutput, GeneratorTermOutput, MapperMappingOutput, MapperOutput,
};
pub use validator::TemplateValidator;

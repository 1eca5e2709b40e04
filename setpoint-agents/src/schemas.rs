//! Schema-constrained payloads exchanged with the delegated completion layer
//!
//! Every struct rejects unknown keys, so a malformed model reply fails the
//! schema check inside the bounded-retry helper instead of leaking partial
//! data into template construction.

use serde::Deserialize;
use setpoint_core::{GuardrailAction, ObjectiveDirection};

/// One legacy-point mapping proposed by the delegated mapper.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MapperMappingOutput {
    pub legacy_name: String,
    pub standard_name: String,
    pub confidence: f64,
    pub reasoning: String,
}

/// Full delegated mapper reply.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct MapperOutput {
    #[serde(default)]
    pub mappings: Vec<MapperMappingOutput>,
    #[serde(default)]
    pub unmapped_points: Vec<String>,
}

/// One objective term proposed by the delegated generator.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorTermOutput {
    pub field_name: String,
    pub direction: ObjectiveDirection,
    pub weight: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorObjectiveOutput {
    pub terms: Vec<GeneratorTermOutput>,
}

/// Constraint operator vocabulary the generator prompt allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum GeneratorOperator {
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "between")]
    Between,
}

/// One constraint proposed by the delegated generator. `value` carries the
/// single bound for `>=`/`<=`/`==`; `lower`/`upper` carry the range form.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorConstraintOutput {
    pub field_name: String,
    pub operator: GeneratorOperator,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub lower: Option<f64>,
    #[serde(default)]
    pub upper: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorGuardrailRuleOutput {
    pub field_name: String,
    #[serde(default)]
    pub max_delta: Option<f64>,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
    #[serde(default = "default_guardrail_action")]
    pub action: GuardrailAction,
}

fn default_guardrail_action() -> GuardrailAction {
    GuardrailAction::Clip
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct GeneratorGuardrailOutput {
    #[serde(default)]
    pub rules: Vec<GeneratorGuardrailRuleOutput>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorPredictionOutput {
    #[serde(default)]
    pub feature_fields: Vec<String>,
    #[serde(default = "default_horizon")]
    pub horizon_steps: u32,
}

fn default_horizon() -> u32 {
    1
}

/// Full delegated generator reply.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorOutput {
    pub objective: GeneratorObjectiveOutput,
    #[serde(default)]
    pub constraints: Vec<GeneratorConstraintOutput>,
    pub guardrail: GeneratorGuardrailOutput,
    #[serde(default)]
    pub prediction: Option<GeneratorPredictionOutput>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Full delegated critic reply.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CriticOutput {
    pub is_fatal_error: bool,
    pub analysis: String,
    pub correction_instruction: String,
}

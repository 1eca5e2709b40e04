//! Scenario template - the versioned aggregate the whole engine revolves around

use crate::{
    ConstraintSpec, FieldDictionary, GuardrailSpec, ObjectiveSpec, OptimizationSpec,
    PredictionSpec, SceneMetadata, SpecError, Timestamp,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A versioned, machine-checked optimization specification for one control
/// scenario. Identity is the (`template_id`, `version`) pair; published
/// templates are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ScenarioTemplate {
    pub template_id: String,
    pub version: String,
    pub scene_metadata: SceneMetadata,
    pub field_dictionary: FieldDictionary,
    pub objective: ObjectiveSpec,
    pub constraints: Vec<ConstraintSpec>,
    pub prediction: PredictionSpec,
    pub optimization: OptimizationSpec,
    pub guardrail: GuardrailSpec,
    pub notes: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
}

impl ScenarioTemplate {
    pub fn new(
        template_id: impl Into<String>,
        version: impl Into<String>,
        scene_metadata: SceneMetadata,
        field_dictionary: FieldDictionary,
        objective: ObjectiveSpec,
        prediction: PredictionSpec,
    ) -> Self {
        Self {
            template_id: template_id.into(),
            version: version.into(),
            scene_metadata,
            field_dictionary,
            objective,
            constraints: Vec::new(),
            prediction,
            optimization: OptimizationSpec::default(),
            guardrail: GuardrailSpec::default(),
            notes: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_constraints(mut self, constraints: Vec<ConstraintSpec>) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_optimization(mut self, optimization: OptimizationSpec) -> Self {
        self.optimization = optimization;
        self
    }

    pub fn with_guardrail(mut self, guardrail: GuardrailSpec) -> Self {
        self.guardrail = guardrail;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Identity key used by repositories.
    pub fn key(&self) -> (String, String) {
        (self.template_id.clone(), self.version.clone())
    }

    /// Re-run every construction invariant of the aggregate. This is the
    /// structural check the quality evaluator applies to a template's
    /// serialized form, where constructor checks do not run.
    pub fn validate(&self) -> Result<(), SpecError> {
        self.field_dictionary.validate()?;
        self.objective.validate()?;
        for constraint in &self.constraints {
            constraint.validate()?;
        }
        self.prediction.validate()?;
        Ok(())
    }
}

//! Template generator - builds candidate scenario templates

use crate::schemas::{GeneratorConstraintOutput, GeneratorOperator, GeneratorOutput};
use serde_json::json;
use setpoint_core::{
    round_score, ConstraintSpec, FieldDictionary, GuardrailAction, GuardrailRule, GuardrailSpec,
    LlmError, MappingResult, MigrationDraft, MigrationRisk, ObjectiveSpec, ObjectiveTerm,
    OptimizationSpec, PredictionSpec, ScenarioTemplate, SceneMetadata, SetpointError,
    SetpointResult,
};
use setpoint_llm::{complete_validated, CompletionProvider};
use std::collections::BTreeSet;
use std::sync::Arc;

const GENERATOR_PROMPT: &str = "You convert industrial migration requirements into a scenario \
template. Reply with JSON: {\"objective\": {\"terms\": [{\"field_name\", \"direction\", \
\"weight\"}]}, \"constraints\": [{\"field_name\", \"operator\", \"value\"|\"lower\"+\"upper\"}], \
\"guardrail\": {\"rules\": [..]}, \"prediction\": {\"feature_fields\", \"horizon_steps\"}, \
\"notes\"}. Only reference fields from the supplied dictionary.";

/// Tokens that mark a field as something to drive down.
const MINIMIZE_HINTS: [&str; 4] = ["cost", "energy", "consumption", "emission"];
/// Tokens that mark a field as something to drive up.
const MAXIMIZE_HINTS: [&str; 3] = ["yield", "quality", "efficiency"];

/// Everything one generation attempt needs to know.
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    pub scene_metadata: &'a SceneMetadata,
    pub field_dictionary: &'a FieldDictionary,
    pub nl_requirements: &'a [String],
    pub mapping: Option<&'a MappingResult>,
    pub correction_instruction: Option<&'a str>,
    pub iteration: u32,
}

/// Builds candidate scenario templates from the dictionary, requirements,
/// and mapper output.
///
/// The rule path is deterministic and always available. The delegated path
/// produces the same structure from a schema-constrained reply; after two
/// failed attempts it falls back to the rules, records a risk, and tags the
/// draft `rule_fallback` - it never raises a delegated error to the caller.
pub struct TemplateGenerator {
    provider: Option<Arc<dyn CompletionProvider>>,
    config: setpoint_core::ReflectionConfig,
}

impl TemplateGenerator {
    /// Generator that only uses the deterministic rule path.
    pub fn rule_based() -> Self {
        Self {
            provider: None,
            config: setpoint_core::ReflectionConfig::default(),
        }
    }

    /// Generator that tries the delegated path first.
    pub fn delegated(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            provider: Some(provider),
            config: setpoint_core::ReflectionConfig::default(),
        }
    }

    pub fn with_config(mut self, config: setpoint_core::ReflectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Produce one candidate draft.
    ///
    /// # Errors
    /// Only construction errors escape (e.g. an empty field dictionary makes
    /// any objective impossible). Delegated failures never do.
    pub fn generate(&self, request: &GenerationRequest<'_>) -> SetpointResult<MigrationDraft> {
        if let Some(provider) = &self.provider {
            match self.generate_with_llm(provider.as_ref(), request) {
                Ok(draft) => return Ok(draft),
                Err(SetpointError::Llm(err)) => {
                    tracing::warn!(%err, "delegated generator unavailable, using rule path");
                    let mut draft = self.generate_with_rules(request)?;
                    draft.push_risk(MigrationRisk::warn(
                        "LLM_GENERATOR_UNAVAILABLE",
                        format!("delegated generator unavailable, fallback to rule generator: {}", err),
                    ));
                    draft.generation_strategy = "rule_fallback".to_string();
                    return Ok(draft);
                }
                Err(other) => return Err(other),
            }
        }

        self.generate_with_rules(request)
    }

    // ------------------------------------------------------------------
    // Delegated path
    // ------------------------------------------------------------------

    fn generate_with_llm(
        &self,
        provider: &dyn CompletionProvider,
        request: &GenerationRequest<'_>,
    ) -> SetpointResult<MigrationDraft> {
        let payload = json!({
            "scene_metadata": request.scene_metadata,
            "field_dictionary": request.field_dictionary,
            "nl_requirements": request.nl_requirements,
            "mapping_result": request.mapping,
            "correction_instruction": request.correction_instruction,
        });
        let (output, meta) = complete_validated::<GeneratorOutput>(
            provider,
            "generator",
            GENERATOR_PROMPT,
            &payload,
            self.config.generator_temperature,
            self.config.delegated_attempts,
        )
        .map_err(|err: LlmError| SetpointError::from(err))?;

        let dictionary = request.field_dictionary;

        // Drop anything the dictionary does not know; substitute the rule
        // objective when filtering empties the list entirely.
        let mut terms: Vec<ObjectiveTerm> = output
            .objective
            .terms
            .iter()
            .filter(|t| dictionary.has_field(&t.field_name) && t.weight > 0.0)
            .map(|t| ObjectiveTerm::new(t.field_name.clone(), t.direction, t.weight))
            .collect();
        if terms.is_empty() {
            terms = infer_objective_terms(dictionary);
        }
        let objective = ObjectiveSpec::new(terms)?;

        let mut constraints: Vec<ConstraintSpec> = Vec::new();
        for (idx, item) in output.constraints.iter().enumerate() {
            if !dictionary.has_field(&item.field_name) {
                continue;
            }
            if let Some(constraint) = build_constraint(idx, item) {
                constraints.push(constraint);
            }
        }

        let mut rules: Vec<GuardrailRule> = output
            .guardrail
            .rules
            .iter()
            .filter(|r| dictionary.has_field(&r.field_name))
            .map(|r| GuardrailRule {
                field_name: r.field_name.clone(),
                min_value: r.min_value,
                max_value: r.max_value,
                max_delta: r.max_delta,
                action: r.action,
            })
            .collect();
        ensure_objective_guardrail(&mut rules, &objective.field_names());

        let mut prediction_fields: Vec<String> = output
            .prediction
            .as_ref()
            .map(|p| p.feature_fields.clone())
            .unwrap_or_default()
            .into_iter()
            .filter(|f| dictionary.has_field(f))
            .collect();
        if prediction_fields.is_empty() {
            prediction_fields = default_prediction_fields(dictionary);
        }
        let horizon = output.prediction.as_ref().map(|p| p.horizon_steps).unwrap_or(3);

        let template = ScenarioTemplate::new(
            format!("{}-template", request.scene_metadata.scene_id),
            format!("draft-{}", request.iteration),
            request.scene_metadata.clone(),
            dictionary.clone(),
            objective,
            PredictionSpec::new(prediction_fields, horizon.max(1))?
                .with_model_signature("llm-draft:v1"),
        )
        .with_constraints(constraints)
        .with_optimization(OptimizationSpec::new("projected-heuristic", 80, 1e-6, 400))
        .with_guardrail(GuardrailSpec::new(rules))
        .with_notes(
            output
                .notes
                .unwrap_or_else(|| "Generated by the delegated generator.".to_string()),
        );

        let mut pending = Vec::new();
        if request.correction_instruction.is_some() {
            pending.push("Review whether correction instruction has been fully applied".to_string());
        }
        if let Some(mapping) = request.mapping {
            if !mapping.unmapped_points.is_empty() {
                pending.push("Confirm unmapped points before production rollout".to_string());
            }
        }

        let mut base_confidence = 0.84;
        if let Some(mapping) = request.mapping {
            base_confidence = (0.6 + 0.4 * mapping.confidence).min(0.95);
        }
        if request.correction_instruction.is_some() {
            base_confidence -= 0.04;
        }

        Ok(
            MigrationDraft::new(template, round_score(base_confidence), "llm_primary")
                .with_pending_confirmations(pending)
                .with_source_mappings(
                    request.mapping.map(|m| m.mappings.clone()).unwrap_or_default(),
                )
                .with_llm_metadata(meta.as_map()),
        )
    }

    // ------------------------------------------------------------------
    // Rule path
    // ------------------------------------------------------------------

    fn generate_with_rules(&self, request: &GenerationRequest<'_>) -> SetpointResult<MigrationDraft> {
        let dictionary = request.field_dictionary;
        let metadata = request.scene_metadata;

        let objective = ObjectiveSpec::new(infer_objective_terms(dictionary))?;
        let constraints = infer_constraints(dictionary)?;

        let guardrail_rules: Vec<GuardrailRule> = objective
            .field_names()
            .into_iter()
            .map(|field| GuardrailRule::new(field, GuardrailAction::Clip).with_max_delta(0.2))
            .collect();

        let horizon = if metadata.granularity_sec > 0 {
            (metadata.execution_window_sec / metadata.granularity_sec).clamp(1, 12)
        } else {
            1
        };

        let template = ScenarioTemplate::new(
            format!("{}-template", metadata.scene_id),
            format!("draft-{}", request.iteration),
            metadata.clone(),
            dictionary.clone(),
            objective,
            PredictionSpec::new(default_prediction_fields(dictionary), horizon)?
                .with_model_signature("rule-bootstrap:v2"),
        )
        .with_constraints(constraints)
        .with_optimization(OptimizationSpec::new("projected-heuristic", 60, 1e-6, 300))
        .with_guardrail(GuardrailSpec::new(guardrail_rules))
        .with_notes("Generated by rule bootstrap generator.");

        let confidence = if request.nl_requirements.is_empty() { 0.45 } else { 0.52 };

        let mut pending = vec![
            "Confirm objective weights".to_string(),
            "Confirm constraint ranges".to_string(),
            "Confirm safety rule thresholds".to_string(),
        ];
        if let Some(mapping) = request.mapping {
            if !mapping.unmapped_points.is_empty() {
                pending.push("Resolve unmapped legacy points".to_string());
            }
        }

        let mut metadata_map = std::collections::BTreeMap::new();
        metadata_map.insert("mode".to_string(), "disabled".to_string());

        Ok(
            MigrationDraft::new(template, confidence, "rule_fallback")
                .with_pending_confirmations(pending)
                .with_source_mappings(
                    request.mapping.map(|m| m.mappings.clone()).unwrap_or_default(),
                )
                .with_llm_metadata(metadata_map),
        )
    }
}

/// Infer objective terms from token matches on field name and label.
/// Capped at three terms; defaults to minimizing the first field when no
/// hint matches.
fn infer_objective_terms(dictionary: &FieldDictionary) -> Vec<ObjectiveTerm> {
    let mut terms: Vec<ObjectiveTerm> = Vec::new();
    for field in dictionary.fields() {
        let token = format!("{} {}", field.field_name, field.semantic_label).to_lowercase();
        if MINIMIZE_HINTS.iter().any(|hint| token.contains(hint)) {
            terms.push(ObjectiveTerm::minimize(&field.field_name, 1.0));
        } else if MAXIMIZE_HINTS.iter().any(|hint| token.contains(hint)) {
            terms.push(ObjectiveTerm::maximize(&field.field_name, 1.0));
        }
    }

    if terms.is_empty() {
        if let Some(first) = dictionary.fields().first() {
            terms.push(ObjectiveTerm::minimize(&first.field_name, 1.0));
        }
    }
    terms.truncate(3);
    terms
}

/// Infer range constraints for temperature-like and pressure-like fields.
fn infer_constraints(dictionary: &FieldDictionary) -> SetpointResult<Vec<ConstraintSpec>> {
    let mut constraints = Vec::new();
    for (idx, field) in dictionary.fields().iter().enumerate() {
        let token = format!("{} {}", field.field_name, field.semantic_label).to_lowercase();
        if token.contains("temperature") {
            constraints.push(
                ConstraintSpec::between(
                    format!("{}_range", field.field_name),
                    &field.field_name,
                    0.0,
                    1200.0,
                )?
                .with_priority(10 + idx as i32),
            );
        } else if token.contains("pressure") {
            constraints.push(
                ConstraintSpec::between(
                    format!("{}_range", field.field_name),
                    &field.field_name,
                    0.0,
                    500.0,
                )?
                .with_priority(10 + idx as i32),
            );
        }
    }
    Ok(constraints)
}

/// First eight dictionary fields, the predictor's default feature set.
fn default_prediction_fields(dictionary: &FieldDictionary) -> Vec<String> {
    let names = dictionary.field_names();
    if names.is_empty() {
        return vec!["proxy_metric".to_string()];
    }
    names.into_iter().take(8).collect()
}

/// Build one constraint from a delegated reply entry. Entries missing the
/// bound their operator needs, or carrying an inverted range, are dropped.
fn build_constraint(idx: usize, item: &GeneratorConstraintOutput) -> Option<ConstraintSpec> {
    let field = &item.field_name;
    match item.operator {
        GeneratorOperator::Ge => item.value.map(|value| {
            ConstraintSpec::ge(format!("{}_ge_{}", field, idx), field, value)
                .with_priority(50 + idx as i32)
        }),
        GeneratorOperator::Le => item.value.map(|value| {
            ConstraintSpec::le(format!("{}_le_{}", field, idx), field, value)
                .with_priority(50 + idx as i32)
        }),
        GeneratorOperator::Eq => item.value.map(|value| {
            ConstraintSpec::eq(format!("{}_eq_{}", field, idx), field, value)
                .with_priority(50 + idx as i32)
        }),
        GeneratorOperator::Between => match (item.lower, item.upper) {
            (Some(lower), Some(upper)) => {
                ConstraintSpec::between(format!("{}_between_{}", field, idx), field, lower, upper)
                    .ok()
                    .map(|c| c.with_priority(50 + idx as i32))
            }
            _ => None,
        },
    }
}

/// Guarantee a guardrail rule for every objective field, injecting the
/// default step-limit rule where the reply omitted one.
fn ensure_objective_guardrail(rules: &mut Vec<GuardrailRule>, objective_fields: &[String]) {
    let covered: BTreeSet<&str> = rules.iter().map(|r| r.field_name.as_str()).collect();
    let missing: Vec<&String> = objective_fields
        .iter()
        .filter(|f| !covered.contains(f.as_str()))
        .collect();
    for field in missing {
        rules.push(GuardrailRule::new(field.clone(), GuardrailAction::Clip).with_max_delta(0.2));
    }
}

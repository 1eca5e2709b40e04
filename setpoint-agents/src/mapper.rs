//! Point mapper - legacy point names onto the canonical field dictionary

use crate::schemas::MapperOutput;
use serde_json::json;
use setpoint_core::{round_score, FieldDictionary, MappingResult, ReflectionConfig, SourceMapping};
use setpoint_llm::{complete_validated, CompletionProvider};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

const MAPPER_PROMPT: &str = "You map legacy industrial point names onto a canonical field \
dictionary. Reply with JSON: {\"mappings\": [{\"legacy_name\", \"standard_name\", \
\"confidence\", \"reasoning\"}], \"unmapped_points\": [..]}. Only use standard names that \
exist in the dictionary.";

/// Minimum token-overlap score before a heuristic mapping is accepted.
const OVERLAP_THRESHOLD: f64 = 0.2;

/// Maps legacy point identifiers onto the field dictionary.
///
/// The rule path is always available and fully deterministic. When a
/// delegated provider is attached the mapper tries it first and silently
/// falls back to the rules on exhaustion - mapping never fails the caller.
pub struct PointMapper {
    provider: Option<Arc<dyn CompletionProvider>>,
    config: ReflectionConfig,
}

impl PointMapper {
    /// Mapper that only uses the deterministic rule path.
    pub fn rule_based() -> Self {
        Self {
            provider: None,
            config: ReflectionConfig::default(),
        }
    }

    /// Mapper that tries the delegated path first.
    pub fn delegated(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            provider: Some(provider),
            config: ReflectionConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ReflectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Map a set of legacy point names. Input is trimmed, deduplicated, and
    /// order-independent; output mappings follow sorted point order.
    pub fn map_points(&self, dictionary: &FieldDictionary, legacy_points: &[String]) -> MappingResult {
        let points: Vec<String> = legacy_points
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if points.is_empty() {
            return MappingResult::empty_input();
        }

        if let Some(provider) = &self.provider {
            match self.map_with_llm(provider.as_ref(), dictionary, &points) {
                Ok(result) => return result,
                Err(err) => {
                    tracing::warn!(%err, "delegated mapper unavailable, using rule mapping");
                    let mut fallback = self.map_with_rules(dictionary, &points);
                    fallback
                        .warnings
                        .push(format!("delegated mapper unavailable, fallback to rule mapping: {}", err));
                    return fallback;
                }
            }
        }

        self.map_with_rules(dictionary, &points)
    }

    fn map_with_llm(
        &self,
        provider: &dyn CompletionProvider,
        dictionary: &FieldDictionary,
        points: &[String],
    ) -> Result<MappingResult, setpoint_core::LlmError> {
        let payload = json!({
            "legacy_points": points,
            "field_dictionary": dictionary,
        });
        let (output, _meta) = complete_validated::<MapperOutput>(
            provider,
            "mapper",
            MAPPER_PROMPT,
            &payload,
            self.config.deterministic_temperature,
            self.config.delegated_attempts,
        )?;

        let mut unmapped: BTreeSet<String> = output.unmapped_points.into_iter().collect();
        let mut mappings: Vec<SourceMapping> = Vec::new();

        for item in output.mappings {
            // A canonical name the dictionary does not know is demoted to
            // unmapped rather than trusted.
            if !dictionary.has_field(&item.standard_name) {
                unmapped.insert(item.legacy_name);
                continue;
            }
            mappings.push(SourceMapping::new(
                item.legacy_name,
                item.standard_name,
                item.confidence,
                item.reasoning,
            ));
        }

        let mapped: BTreeSet<&str> = mappings.iter().map(|m| m.legacy_name.as_str()).collect();
        for point in points {
            if !mapped.contains(point.as_str()) && !unmapped.contains(point) {
                unmapped.insert(point.clone());
            }
        }

        Ok(MappingResult {
            confidence: mean_confidence(&mappings),
            mappings,
            unmapped_points: unmapped.into_iter().collect(),
            strategy: "llm_semantic_mapping".to_string(),
            warnings: Vec::new(),
        })
    }

    fn map_with_rules(&self, dictionary: &FieldDictionary, points: &[String]) -> MappingResult {
        let alias_map: BTreeMap<String, &String> = dictionary
            .alias_map()
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();

        let mut mappings: Vec<SourceMapping> = Vec::new();
        let mut unmapped: BTreeSet<String> = BTreeSet::new();

        for legacy_name in points {
            let lower_name = legacy_name.to_lowercase();

            if let Some(target) = alias_map.get(&lower_name) {
                if dictionary.has_field(target) {
                    mappings.push(SourceMapping::new(
                        legacy_name.clone(),
                        (*target).clone(),
                        0.98,
                        "matched alias_map",
                    ));
                    continue;
                }
            }

            if dictionary.has_field(legacy_name) {
                mappings.push(SourceMapping::new(
                    legacy_name.clone(),
                    legacy_name.clone(),
                    0.99,
                    "exact field name match",
                ));
                continue;
            }

            let legacy_tokens = tokens(legacy_name);
            let mut best_field: Option<&str> = None;
            let mut best_score = 0.0;

            for field in dictionary.fields() {
                let mut target_tokens = tokens(&field.field_name);
                target_tokens.extend(tokens(&field.semantic_label));
                if target_tokens.is_empty() {
                    continue;
                }
                let intersection = legacy_tokens.intersection(&target_tokens).count();
                let union = legacy_tokens.union(&target_tokens).count();
                if union == 0 {
                    continue;
                }
                let score = intersection as f64 / union as f64;
                if score > best_score {
                    best_score = score;
                    best_field = Some(&field.field_name);
                }
            }

            match best_field {
                Some(field) if best_score >= OVERLAP_THRESHOLD => {
                    mappings.push(SourceMapping::new(
                        legacy_name.clone(),
                        field,
                        round_score((0.45 + best_score).min(0.88)),
                        "token overlap heuristic",
                    ));
                }
                _ => {
                    unmapped.insert(legacy_name.clone());
                }
            }
        }

        MappingResult {
            confidence: mean_confidence(&mappings),
            mappings,
            unmapped_points: unmapped.into_iter().collect(),
            strategy: "rule_fallback".to_string(),
            warnings: vec!["rule mapper used; verify low-confidence mappings".to_string()],
        }
    }
}

/// Mean of individual mapping confidences; 0.0 when nothing mapped.
fn mean_confidence(mappings: &[SourceMapping]) -> f64 {
    if mappings.is_empty() {
        return 0.0;
    }
    let sum: f64 = mappings.iter().map(|m| m.confidence).sum();
    round_score(sum / mappings.len() as f64)
}

/// Lowercased alphanumeric tokens split on every non-alphanumeric boundary.
fn tokens(value: &str) -> BTreeSet<String> {
    value
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

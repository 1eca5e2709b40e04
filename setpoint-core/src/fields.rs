//! Field dictionary - the canonical vocabulary every other component reads

use crate::{MissingValueStrategy, SpecError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A canonical measurement or control field.
/// Immutable once placed in a [`FieldDictionary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct FieldDefinition {
    /// Unique canonical name
    pub field_name: String,
    /// Human-meaningful label used by token matching
    pub semantic_label: String,
    /// Engineering unit (e.g. "C", "t/h", "$/h")
    pub unit: String,
    pub dimension: String,
    pub observable: bool,
    pub controllable: bool,
    pub missing_strategy: MissingValueStrategy,
}

impl FieldDefinition {
    /// Create an observable, non-controllable field with default dimension.
    pub fn new(
        field_name: impl Into<String>,
        semantic_label: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            semantic_label: semantic_label.into(),
            unit: unit.into(),
            dimension: "dimensionless".to_string(),
            observable: true,
            controllable: false,
            missing_strategy: MissingValueStrategy::Required,
        }
    }

    /// Set the physical dimension.
    pub fn with_dimension(mut self, dimension: impl Into<String>) -> Self {
        self.dimension = dimension.into();
        self
    }

    /// Mark whether the field can be actuated by the control loop.
    pub fn with_controllable(mut self, controllable: bool) -> Self {
        self.controllable = controllable;
        self
    }

    /// Mark whether the field shows up in snapshots.
    pub fn with_observable(mut self, observable: bool) -> Self {
        self.observable = observable;
        self
    }

    /// Set the missing-value strategy.
    pub fn with_missing_strategy(mut self, strategy: MissingValueStrategy) -> Self {
        self.missing_strategy = strategy;
        self
    }
}

/// Ordered set of field definitions plus a legacy-name alias map.
///
/// Created once by ingestion, then consumed read-only by every core
/// component. Field names are unique; construction rejects duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct FieldDictionary {
    fields: Vec<FieldDefinition>,
    alias_map: BTreeMap<String, String>,
}

impl FieldDictionary {
    /// Create a dictionary from field definitions.
    ///
    /// # Errors
    /// Returns `SpecError::DuplicateField` if two definitions share a name.
    pub fn new(fields: Vec<FieldDefinition>) -> Result<Self, SpecError> {
        let dictionary = Self {
            fields,
            alias_map: BTreeMap::new(),
        };
        dictionary.validate()?;
        Ok(dictionary)
    }

    /// Attach a legacy-name alias map.
    pub fn with_aliases(mut self, alias_map: BTreeMap<String, String>) -> Self {
        self.alias_map = alias_map;
        self
    }

    /// Add a single alias entry.
    pub fn with_alias(
        mut self,
        legacy_name: impl Into<String>,
        canonical_name: impl Into<String>,
    ) -> Self {
        self.alias_map.insert(legacy_name.into(), canonical_name.into());
        self
    }

    /// Re-run the uniqueness invariant. Used after deserialization, where the
    /// constructor check does not apply.
    pub fn validate(&self) -> Result<(), SpecError> {
        let mut seen = std::collections::BTreeSet::new();
        for field in &self.fields {
            if !seen.insert(field.field_name.as_str()) {
                return Err(SpecError::DuplicateField {
                    field: field.field_name.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn alias_map(&self) -> &BTreeMap<String, String> {
        &self.alias_map
    }

    pub fn has_field(&self, field_name: &str) -> bool {
        self.fields.iter().any(|f| f.field_name == field_name)
    }

    pub fn get(&self, field_name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.field_name == field_name)
    }

    /// Canonical field names in definition order.
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.field_name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fields() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::new("boiler_temp", "temperature", "C").with_controllable(true),
            FieldDefinition::new("pressure", "pressure", "kPa"),
        ]
    }

    #[test]
    fn test_dictionary_rejects_duplicate_names() {
        let mut fields = sample_fields();
        fields.push(FieldDefinition::new("pressure", "other pressure", "bar"));
        let err = FieldDictionary::new(fields).unwrap_err();
        assert_eq!(
            err,
            SpecError::DuplicateField {
                field: "pressure".to_string()
            }
        );
    }

    #[test]
    fn test_dictionary_lookup() {
        let dict = FieldDictionary::new(sample_fields()).unwrap();
        assert!(dict.has_field("boiler_temp"));
        assert!(!dict.has_field("steam_flow"));
        assert_eq!(dict.get("boiler_temp").unwrap().semantic_label, "temperature");
        assert_eq!(dict.field_names(), vec!["boiler_temp", "pressure"]);
    }

    #[test]
    fn test_alias_map_attachment() {
        let dict = FieldDictionary::new(sample_fields())
            .unwrap()
            .with_alias("P01", "pressure");
        assert_eq!(dict.alias_map().get("P01").unwrap(), "pressure");
    }

    #[test]
    fn test_validate_after_deserialization() {
        let dict = FieldDictionary::new(sample_fields()).unwrap();
        let json = serde_json::to_string(&dict).unwrap();
        let back: FieldDictionary = serde_json::from_str(&json).unwrap();
        assert!(back.validate().is_ok());
        assert_eq!(back, dict);
    }
}

//! SETPOINT Store - Template Repository
//!
//! Append-only storage for published scenario templates. Publishing an
//! existing (template_id, version) pair fails; published templates are never
//! mutated. The in-memory implementation is the reference; durable backends
//! implement the same trait.

use setpoint_core::{ScenarioTemplate, SetpointError, SetpointResult, StoreError};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Export/import wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Yaml,
}

/// Contract for template persistence.
pub trait TemplateRepository: Send + Sync {
    /// Publish a template. Fails if the (template_id, version) pair exists.
    fn publish(&self, template: ScenarioTemplate) -> SetpointResult<ScenarioTemplate>;

    /// Fetch a template; `None` version resolves to the latest by version
    /// sort order.
    fn get(&self, template_id: &str, version: Option<&str>) -> SetpointResult<ScenarioTemplate>;

    /// Versions published for one template id, sorted.
    fn list_versions(&self, template_id: &str) -> Vec<String>;

    /// All known template ids, sorted.
    fn list_template_ids(&self) -> Vec<String>;

    /// Serialize a stored template.
    fn export(
        &self,
        template_id: &str,
        version: Option<&str>,
        format: ExportFormat,
    ) -> SetpointResult<String>;

    /// Parse a template from its serialized form (without publishing it).
    fn import(&self, payload: &str, format: ExportFormat) -> SetpointResult<ScenarioTemplate>;
}

/// In-memory reference repository. Thread-safe via RwLock; reads never block
/// each other.
pub struct InMemoryTemplateRepository {
    storage: RwLock<BTreeMap<String, BTreeMap<String, ScenarioTemplate>>>,
}

impl InMemoryTemplateRepository {
    pub fn new() -> Self {
        Self {
            storage: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemoryTemplateRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRepository for InMemoryTemplateRepository {
    fn publish(&self, template: ScenarioTemplate) -> SetpointResult<ScenarioTemplate> {
        let mut storage = self
            .storage
            .write()
            .map_err(|_| SetpointError::Store(StoreError::LockPoisoned))?;
        let versions = storage.entry(template.template_id.clone()).or_default();
        if versions.contains_key(&template.version) {
            return Err(SetpointError::Store(StoreError::AlreadyPublished {
                template_id: template.template_id.clone(),
                version: template.version.clone(),
            }));
        }
        versions.insert(template.version.clone(), template.clone());
        Ok(template)
    }

    fn get(&self, template_id: &str, version: Option<&str>) -> SetpointResult<ScenarioTemplate> {
        let storage = self
            .storage
            .read()
            .map_err(|_| SetpointError::Store(StoreError::LockPoisoned))?;
        let versions = storage
            .get(template_id)
            .ok_or_else(|| {
                SetpointError::Store(StoreError::TemplateNotFound {
                    template_id: template_id.to_string(),
                })
            })?;

        match version {
            Some(version) => versions.get(version).cloned().ok_or_else(|| {
                SetpointError::Store(StoreError::VersionNotFound {
                    template_id: template_id.to_string(),
                    version: version.to_string(),
                })
            }),
            // BTreeMap keeps versions sorted; the last entry is the latest.
            None => versions
                .values()
                .next_back()
                .cloned()
                .ok_or_else(|| {
                    SetpointError::Store(StoreError::TemplateNotFound {
                        template_id: template_id.to_string(),
                    })
                }),
        }
    }

    fn list_versions(&self, template_id: &str) -> Vec<String> {
        self.storage
            .read()
            .ok()
            .and_then(|storage| {
                storage
                    .get(template_id)
                    .map(|versions| versions.keys().cloned().collect())
            })
            .unwrap_or_default()
    }

    fn list_template_ids(&self) -> Vec<String> {
        self.storage
            .read()
            .ok()
            .map(|storage| storage.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn export(
        &self,
        template_id: &str,
        version: Option<&str>,
        format: ExportFormat,
    ) -> SetpointResult<String> {
        let template = self.get(template_id, version)?;
        let serialized = match format {
            ExportFormat::Json => serde_json::to_string_pretty(&template)
                .map_err(|e| StoreError::SerializationFailed { reason: e.to_string() }),
            ExportFormat::Yaml => serde_yaml::to_string(&template)
                .map_err(|e| StoreError::SerializationFailed { reason: e.to_string() }),
        };
        serialized.map_err(SetpointError::from)
    }

    fn import(&self, payload: &str, format: ExportFormat) -> SetpointResult<ScenarioTemplate> {
        let template: ScenarioTemplate = match format {
            ExportFormat::Json => serde_json::from_str(payload)
                .map_err(|e| StoreError::SerializationFailed { reason: e.to_string() })?,
            ExportFormat::Yaml => serde_yaml::from_str(payload)
                .map_err(|e| StoreError::SerializationFailed { reason: e.to_string() })?,
        };
        template.validate()?;
        Ok(template)
    }
}

impl std::fmt::Debug for InMemoryTemplateRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .storage
            .read()
            .map(|s| s.values().map(|v| v.len()).sum::<usize>())
            .unwrap_or(0);
        f.debug_struct("InMemoryTemplateRepository")
            .field("templates", &count)
            .finish()
    }
}

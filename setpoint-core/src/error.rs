//! Error types for SETPOINT operations

use thiserror::Error;

/// Specification construction errors.
/// These fail fast at object-creation time and are never silently accepted.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SpecError {
    #[error("Duplicate field in dictionary: {field}")]
    DuplicateField { field: String },

    #[error("Objective must contain at least one term")]
    EmptyObjective,

    #[error("Objective weight for {field} must be positive, got {weight}")]
    NonPositiveWeight { field: String, weight: f64 },

    #[error("Constraint {constraint}: {bound} is required for operator={operator}")]
    MissingBound {
        constraint: String,
        operator: String,
        bound: String,
    },

    #[error("Constraint {constraint}: lower bound {lower} > upper bound {upper}")]
    InvertedBounds {
        constraint: String,
        lower: f64,
        upper: f64,
    },

    #[error("Prediction requires at least one feature field")]
    EmptyFeatureFields,

    #[error("Prediction horizon must be >= 1, got {got}")]
    InvalidHorizon { got: u32 },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Delegated-completion (LLM) errors.
///
/// Transport, timeout, and schema failures are deliberately collapsed into a
/// single `UpstreamUnavailable` condition: the caller has exactly one fallback
/// boundary and no reason to branch on the failure kind.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LlmError {
    #[error("No completion provider configured")]
    ProviderNotConfigured,

    #[error("Delegated completion for role {role} unavailable: {reason}")]
    UpstreamUnavailable { role: String, reason: String },
}

/// Execution pipeline errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    #[error("{kind} not registered: {name}")]
    StageNotFound { kind: String, name: String },
}

/// Template repository errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("Template already published: {template_id}@{version}")]
    AlreadyPublished {
        template_id: String,
        version: String,
    },

    #[error("Template not found: {template_id}")]
    TemplateNotFound { template_id: String },

    #[error("Template version not found: {template_id}@{version}")]
    VersionNotFound {
        template_id: String,
        version: String,
    },

    #[error("Template serialization failed: {reason}")]
    SerializationFailed { reason: String },

    #[error("Repository lock poisoned")]
    LockPoisoned,
}

/// Master error type for all SETPOINT errors.
#[derive(Debug, Clone, Error)]
pub enum SetpointError {
    #[error("Spec error: {0}")]
    Spec(#[from] SpecError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type alias for SETPOINT operations.
pub type SetpointResult<T> = Result<T, SetpointError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_error_display_inverted_bounds() {
        let err = SpecError::InvertedBounds {
            constraint: "temp_range".to_string(),
            lower: 10.0,
            upper: 5.0,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("temp_range"));
        assert!(msg.contains("10"));
        assert!(msg.contains("5"));
    }

    #[test]
    fn test_llm_error_display_upstream_unavailable() {
        let err = LlmError::UpstreamUnavailable {
            role: "generator".to_string(),
            reason: "timeout".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("generator"));
        assert!(msg.contains("timeout"));
    }

    #[test]
    fn test_store_error_display_already_published() {
        let err = StoreError::AlreadyPublished {
            template_id: "boiler".to_string(),
            version: "v1".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("boiler@v1"));
    }

    #[test]
    fn test_setpoint_error_from_variants() {
        let spec = SetpointError::from(SpecError::EmptyObjective);
        assert!(matches!(spec, SetpointError::Spec(_)));

        let llm = SetpointError::from(LlmError::ProviderNotConfigured);
        assert!(matches!(llm, SetpointError::Llm(_)));

        let pipeline = SetpointError::from(PipelineError::StageNotFound {
            kind: "optimizer".to_string(),
            name: "qp".to_string(),
        });
        assert!(matches!(pipeline, SetpointError::Pipeline(_)));

        let store = SetpointError::from(StoreError::LockPoisoned);
        assert!(matches!(store, SetpointError::Store(_)));
    }
}

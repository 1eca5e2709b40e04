//! Migration drafts, reports, and reflection trace types

use crate::{IssueSeverity, RunStatus, ScenarioTemplate, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Machine-readable reason attached to a run blocked by a fatal critic verdict.
pub const BLOCKED_FATAL_CRITIC: &str = "critic_marked_fatal_error";
/// Machine-readable reason attached to a run that exhausted its budget.
pub const BLOCKED_MAX_ITERATIONS: &str = "max_iterations_reached";

/// A risk recorded against a draft (e.g. a delegated-path fallback).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MigrationRisk {
    pub code: String,
    pub message: String,
    pub severity: IssueSeverity,
}

impl MigrationRisk {
    /// Create a WARN-level risk.
    pub fn warn(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            severity: IssueSeverity::Warn,
        }
    }
}

/// One legacy point mapped onto a canonical field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SourceMapping {
    pub legacy_name: String,
    pub canonical_name: String,
    pub confidence: f64,
    pub reasoning: String,
}

impl SourceMapping {
    pub fn new(
        legacy_name: impl Into<String>,
        canonical_name: impl Into<String>,
        confidence: f64,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            legacy_name: legacy_name.into(),
            canonical_name: canonical_name.into(),
            confidence,
            reasoning: reasoning.into(),
        }
    }
}

/// Output of the point mapper: mappings, leftovers, aggregate confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MappingResult {
    pub mappings: Vec<SourceMapping>,
    pub unmapped_points: Vec<String>,
    /// Mean of individual mapping confidences; 0.0 when nothing mapped
    pub confidence: f64,
    pub strategy: String,
    pub warnings: Vec<String>,
}

impl MappingResult {
    /// Result for a run with no legacy points at all.
    pub fn empty_input() -> Self {
        Self {
            mappings: Vec::new(),
            unmapped_points: Vec::new(),
            confidence: 0.0,
            strategy: "empty_input".to_string(),
            warnings: vec!["no legacy points provided".to_string()],
        }
    }
}

/// One candidate scenario template plus confidence/risk/trace metadata.
/// Owned exclusively by the reflection run that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MigrationDraft {
    pub draft_id: String,
    pub template: ScenarioTemplate,
    pub confidence: f64,
    pub pending_confirmations: Vec<String>,
    pub risks: Vec<MigrationRisk>,
    pub generation_strategy: String,
    /// Append-only record of the reflection steps that shaped this draft
    pub trace: Vec<ReflectionStep>,
    pub source_mappings: Vec<SourceMapping>,
    pub llm_metadata: BTreeMap<String, String>,
}

impl MigrationDraft {
    pub fn new(
        template: ScenarioTemplate,
        confidence: f64,
        generation_strategy: impl Into<String>,
    ) -> Self {
        Self {
            draft_id: new_draft_id(),
            template,
            confidence: confidence.clamp(0.0, 1.0),
            pending_confirmations: Vec::new(),
            risks: Vec::new(),
            generation_strategy: generation_strategy.into(),
            trace: Vec::new(),
            source_mappings: Vec::new(),
            llm_metadata: BTreeMap::new(),
        }
    }

    pub fn with_pending_confirmations(mut self, pending: Vec<String>) -> Self {
        self.pending_confirmations = pending;
        self
    }

    pub fn with_source_mappings(mut self, mappings: Vec<SourceMapping>) -> Self {
        self.source_mappings = mappings;
        self
    }

    pub fn with_llm_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.llm_metadata = metadata;
        self
    }

    pub fn push_risk(&mut self, risk: MigrationRisk) {
        self.risks.push(risk);
    }
}

/// Generate a draft identifier.
pub fn new_draft_id() -> String {
    format!("draft-{}", Uuid::now_v7().simple())
}

// ============================================================================
// VALIDATION REPORT
// ============================================================================

/// One finding from the template validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MigrationValidationIssue {
    pub code: String,
    /// Dotted path into the template the issue points at
    pub path: String,
    pub message: String,
    pub severity: IssueSeverity,
}

impl MigrationValidationIssue {
    pub fn new(
        code: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
        severity: IssueSeverity,
    ) -> Self {
        Self {
            code: code.into(),
            path: path.into(),
            message: message.into(),
            severity,
        }
    }

    pub fn error(
        code: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(code, path, message, IssueSeverity::Error)
    }
}

/// Immutable scored snapshot of one validation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MigrationValidationReport {
    pub draft_id: String,
    pub valid: bool,
    pub correctness_score: f64,
    pub conflict_rate: f64,
    pub guardrail_coverage: f64,
    pub issues: Vec<MigrationValidationIssue>,
}

impl MigrationValidationReport {
    /// Error-severity issue messages, formatted `CODE: message`.
    pub fn error_messages(&self) -> Vec<String> {
        self.issues
            .iter()
            .filter(|issue| issue.severity == IssueSeverity::Error)
            .map(|issue| format!("{}: {}", issue.code, issue.message))
            .collect()
    }
}

// ============================================================================
// QUALITY REPORT
// ============================================================================

/// One finding from the quality evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct QualityIssue {
    pub code: String,
    pub message: String,
    pub severity: IssueSeverity,
}

impl QualityIssue {
    pub fn new(code: impl Into<String>, message: impl Into<String>, severity: IssueSeverity) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            severity,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, message, IssueSeverity::Error)
    }
}

/// Immutable five-dimension quality snapshot of one template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TemplateQualityReport {
    pub overall_score: f64,
    pub structural_score: f64,
    pub semantic_score: f64,
    pub solvability_score: f64,
    pub guardrail_coverage: f64,
    pub regression_score: f64,
    pub passed: bool,
    pub issues: Vec<QualityIssue>,
}

impl TemplateQualityReport {
    /// Error-severity issue messages, formatted `CODE: message`.
    pub fn error_messages(&self) -> Vec<String> {
        self.issues
            .iter()
            .filter(|issue| issue.severity == IssueSeverity::Error)
            .map(|issue| format!("{}: {}", issue.code, issue.message))
            .collect()
    }
}

// ============================================================================
// CRITIC & REFLECTION TRACE
// ============================================================================

/// The critic's verdict on a failing draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CriticFeedback {
    /// True when the run should stop instead of retrying
    pub is_fatal_error: bool,
    pub analysis: String,
    pub correction_instruction: String,
    pub confidence: f64,
}

/// One entry in the reflection trace. Exactly one is appended per iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ReflectionStep {
    pub iteration: u32,
    pub draft_id: String,
    pub validation_passed: bool,
    pub quality_passed: bool,
    pub validation_errors: Vec<String>,
    pub quality_errors: Vec<String>,
    pub critic_feedback: Option<CriticFeedback>,
}

/// Final verdict of one reflection run, with the full trace attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ReflectionReport {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub run_id: Uuid,
    pub status: RunStatus,
    pub mapping_result: MappingResult,
    pub final_draft: Option<MigrationDraft>,
    pub validation: Option<MigrationValidationReport>,
    pub quality: Option<TemplateQualityReport>,
    pub reflections: Vec<ReflectionStep>,
    pub blocked_reason: Option<String>,
    pub iterations_used: u32,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub finished_at: Timestamp,
}

impl ReflectionReport {
    pub fn is_approved(&self) -> bool {
        self.status == RunStatus::Approved
    }
}

/// Generate a run identifier.
pub fn new_run_id() -> Uuid {
    Uuid::now_v7()
}

/// Current UTC timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

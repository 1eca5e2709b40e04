//! Critic - explains failing drafts and proposes one correction

use crate::schemas::CriticOutput;
use serde_json::json;
use setpoint_core::{
    CriticFeedback, MigrationDraft, MigrationValidationReport, ReflectionConfig,
    TemplateQualityReport,
};
use setpoint_llm::{complete_validated, CompletionProvider};
use std::sync::Arc;

const CRITIC_PROMPT: &str = "You review a failed scenario-template draft together with its \
validation and quality reports. Reply with JSON: {\"is_fatal_error\": bool, \"analysis\": str, \
\"correction_instruction\": str}. The instruction must be one concrete, actionable change.";

const RULE_CRITIC_CONFIDENCE: f64 = 0.62;
const LLM_CRITIC_CONFIDENCE: f64 = 0.85;

/// Reviews a failing draft and produces exactly one correction instruction.
///
/// Like the other agents, the delegated path degrades to the rule path on
/// exhaustion and never raises to the orchestrator.
pub struct Critic {
    provider: Option<Arc<dyn CompletionProvider>>,
    config: ReflectionConfig,
}

impl Critic {
    /// Critic that only uses the deterministic rule path.
    pub fn rule_based() -> Self {
        Self {
            provider: None,
            config: ReflectionConfig::default(),
        }
    }

    /// Critic that tries the delegated path first.
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

    pub fn review(
        &self,
        failed_draft: &MigrationDraft,
        validation_report: &MigrationValidationReport,
        quality_report: &TemplateQualityReport,
    ) -> CriticFeedback {
        if let Some(provider) = &self.provider {
            match self.review_with_llm(provider.as_ref(), failed_draft, validation_report, quality_report)
            {
                Ok(feedback) => return feedback,
                Err(err) => {
                    tracing::warn!(%err, "delegated critic unavailable, using rule critic");
                    let mut feedback =
                        self.review_with_rules(failed_draft, validation_report, quality_report);
                    feedback.analysis =
                        format!("{}; delegated critic unavailable: {}", feedback.analysis, err);
                    return feedback;
                }
            }
        }

        self.review_with_rules(failed_draft, validation_report, quality_report)
    }

    fn review_with_llm(
        &self,
        provider: &dyn CompletionProvider,
        failed_draft: &MigrationDraft,
        validation_report: &MigrationValidationReport,
        quality_report: &TemplateQualityReport,
    ) -> Result<CriticFeedback, setpoint_core::LlmError> {
        let payload = json!({
            "failed_draft": failed_draft,
            "validation_report": validation_report,
            "quality_report": quality_report,
        });
        let (output, _meta) = complete_validated::<CriticOutput>(
            provider,
            "critic",
            CRITIC_PROMPT,
            &payload,
            self.config.deterministic_temperature,
            self.config.delegated_attempts,
        )?;

        Ok(CriticFeedback {
            is_fatal_error: output.is_fatal_error,
            analysis: output.analysis,
            correction_instruction: output.correction_instruction,
            confidence: LLM_CRITIC_CONFIDENCE,
        })
    }

    /// Select exactly one instruction by priority: constraint conflicts, then
    /// guardrail coverage, then unknown fields, then the generic fallback.
    fn review_with_rules(
        &self,
        failed_draft: &MigrationDraft,
        validation_report: &MigrationValidationReport,
        quality_report: &TemplateQualityReport,
    ) -> CriticFeedback {
        let mut analysis_parts: Vec<&str> = Vec::new();
        if !validation_report.issues.is_empty() {
            analysis_parts.push("Validation issues detected");
        }
        if !quality_report.issues.is_empty() {
            analysis_parts.push("Quality threshold issues detected");
        }
        let analysis = if analysis_parts.is_empty() {
            "Draft failed without explicit issue list".to_string()
        } else {
            analysis_parts.join("; ")
        };

        let has_conflict = validation_report
            .issues
            .iter()
            .any(|i| i.code.contains("CONSTRAINT_CONFLICT"));
        let low_guardrail = quality_report.issues.iter().any(|i| i.code == "GUARDRAIL_LOW");
        let has_unknown = validation_report.issues.iter().any(|i| i.code.contains("UNKNOWN"));

        let mut instruction = if has_conflict {
            "Resolve conflicting constraint bounds so every field has a feasible range"
        } else if low_guardrail {
            "Add or widen guardrail rules to cover all objective and controllable fields"
        } else if has_unknown {
            "Replace unknown fields with valid field dictionary entries and regenerate constraints"
        } else {
            "Ensure objective fields exist in the field dictionary and add guardrail coverage for objective fields"
        };

        let mut is_fatal_error = quality_report.structural_score < 0.5;
        if failed_draft.template.field_dictionary.is_empty() {
            is_fatal_error = true;
            instruction = "Provide a non-empty field dictionary before generating a draft";
        }

        CriticFeedback {
            is_fatal_error,
            analysis,
            correction_instruction: instruction.to_string(),
            confidence: RULE_CRITIC_CONFIDENCE,
        }
    }
}

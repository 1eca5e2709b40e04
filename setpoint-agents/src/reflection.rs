//! Reflection orchestrator - the bounded generate/score/critique loop

use crate::{
    Critic, GenerationRequest, PointMapper, TemplateGenerator, TemplateQualityEvaluator,
    TemplateValidator,
};
use setpoint_core::{
    new_run_id, now, FieldDictionary, MappingResult, MigrationDraft,
    MigrationValidationReport, QualityGate, ReflectionConfig, ReflectionReport, ReflectionStep,
    RunStatus, SceneMetadata, SetpointResult, SimulationSample, TemplateQualityReport,
    BLOCKED_FATAL_CRITIC, BLOCKED_MAX_ITERATIONS,
};
use setpoint_llm::CompletionProvider;
use std::sync::Arc;

/// Inputs for one reflection run.
#[derive(Debug, Clone)]
pub struct ReflectionRequest {
    pub scene_metadata: SceneMetadata,
    pub field_dictionary: FieldDictionary,
    pub nl_requirements: Vec<String>,
    pub legacy_points: Vec<String>,
    pub regression_samples: Option<Vec<SimulationSample>>,
    pub gate: Option<QualityGate>,
}

impl ReflectionRequest {
    pub fn new(scene_metadata: SceneMetadata, field_dictionary: FieldDictionary) -> Self {
        Self {
            scene_metadata,
            field_dictionary,
            nl_requirements: Vec::new(),
            legacy_points: Vec::new(),
            regression_samples: None,
            gate: None,
        }
    }

    pub fn with_requirements(mut self, nl_requirements: Vec<String>) -> Self {
        self.nl_requirements = nl_requirements;
        self
    }

    pub fn with_legacy_points(mut self, legacy_points: Vec<String>) -> Self {
        self.legacy_points = legacy_points;
        self
    }

    pub fn with_regression_samples(mut self, samples: Vec<SimulationSample>) -> Self {
        self.regression_samples = Some(samples);
        self
    }

    pub fn with_gate(mut self, gate: QualityGate) -> Self {
        self.gate = Some(gate);
        self
    }
}

/// Per-run accumulator passed by value through the loop. Keeping it explicit
/// (rather than mutating a shared state object) preserves the append-only,
/// order-preserving trace invariant by construction.
struct RunState {
    reflections: Vec<ReflectionStep>,
    correction_instruction: Option<String>,
    current_draft: Option<MigrationDraft>,
    last_validation: Option<MigrationValidationReport>,
    last_quality: Option<TemplateQualityReport>,
}

impl RunState {
    fn new() -> Self {
        Self {
            reflections: Vec::new(),
            correction_instruction: None,
            current_draft: None,
            last_validation: None,
            last_quality: None,
        }
    }
}

/// Drives mapper -> generator -> validator + quality -> critic in a bounded
/// loop and produces the final accept/block verdict with a full trace.
///
/// State machine: INIT -> PARSE -> {GENERATE -> SCORE -> (pass: APPROVED) |
/// (fail: CRITIQUE -> GENERATE)} with PARSE executing exactly once per run.
/// Every iteration appends exactly one trace step, so the trace length always
/// equals `iterations_used`.
pub struct ReflectionOrchestrator {
    mapper: PointMapper,
    generator: TemplateGenerator,
    critic: Critic,
    validator: TemplateValidator,
    quality: TemplateQualityEvaluator,
    config: ReflectionConfig,
}

impl ReflectionOrchestrator {
    /// Orchestrator using only the deterministic rule paths.
    pub fn rule_based() -> Self {
        Self {
            mapper: PointMapper::rule_based(),
            generator: TemplateGenerator::rule_based(),
            critic: Critic::rule_based(),
            validator: TemplateValidator::new(),
            quality: TemplateQualityEvaluator::new(),
            config: ReflectionConfig::default(),
        }
    }

    /// Orchestrator whose mapper, generator, and critic try the delegated
    /// provider first.
    pub fn delegated(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            mapper: PointMapper::delegated(provider.clone()),
            generator: TemplateGenerator::delegated(provider.clone()),
            critic: Critic::delegated(provider),
            validator: TemplateValidator::new(),
            quality: TemplateQualityEvaluator::new(),
            config: ReflectionConfig::default(),
        }
    }

    pub fn with_config(self, config: ReflectionConfig) -> Self {
        Self {
            mapper: self.mapper.with_config(config.clone()),
            generator: self.generator.with_config(config.clone()),
            critic: self.critic.with_config(config.clone()),
            validator: self.validator,
            quality: self.quality,
            config,
        }
    }

    /// Execute one reflection run.
    ///
    /// # Errors
    /// Only construction failures escape (e.g. an empty field dictionary).
    /// Delegated-path trouble and failing scores are reported in the returned
    /// report, never as errors.
    pub fn run(&self, request: &ReflectionRequest) -> SetpointResult<ReflectionReport> {
        self.config.validate()?;
        let run_id = new_run_id();

        // PARSE: exactly once per run, however many cycles follow.
        let mapping = self
            .mapper
            .map_points(&request.field_dictionary, &request.legacy_points);
        tracing::debug!(
            %run_id,
            mapped = mapping.mappings.len(),
            unmapped = mapping.unmapped_points.len(),
            "point mapping complete"
        );

        let mut state = RunState::new();

        for iteration in 1..=self.config.max_iterations {
            let mut draft = self.generator.generate(&GenerationRequest {
                scene_metadata: &request.scene_metadata,
                field_dictionary: &request.field_dictionary,
                nl_requirements: &request.nl_requirements,
                mapping: Some(&mapping),
                correction_instruction: state.correction_instruction.as_deref(),
                iteration,
            })?;

            let validation = self.validator.validate(&draft);
            let quality = self.quality.evaluate(
                &draft.template,
                request.regression_samples.as_deref(),
                request.gate.as_ref(),
            );

            if validation.valid && quality.passed {
                state.reflections.push(ReflectionStep {
                    iteration,
                    draft_id: draft.draft_id.clone(),
                    validation_passed: true,
                    quality_passed: true,
                    validation_errors: Vec::new(),
                    quality_errors: Vec::new(),
                    critic_feedback: None,
                });
                draft.trace = state.reflections.clone();
                tracing::debug!(%run_id, iteration, "draft approved");
                return Ok(approved_report(
                    run_id, mapping, draft, validation, quality, state.reflections, iteration,
                ));
            }

            let feedback = self.critic.review(&draft, &validation, &quality);
            state.reflections.push(ReflectionStep {
                iteration,
                draft_id: draft.draft_id.clone(),
                validation_passed: validation.valid,
                quality_passed: quality.passed,
                validation_errors: validation.error_messages(),
                quality_errors: quality.error_messages(),
                critic_feedback: Some(feedback.clone()),
            });
            state.correction_instruction = Some(feedback.correction_instruction.clone());

            draft.trace = state.reflections.clone();
            state.current_draft = Some(draft);
            state.last_validation = Some(validation);
            state.last_quality = Some(quality);

            if feedback.is_fatal_error {
                tracing::warn!(%run_id, iteration, "critic marked draft fatal");
                return Ok(blocked_report(
                    run_id,
                    mapping,
                    state,
                    BLOCKED_FATAL_CRITIC,
                    iteration,
                ));
            }
        }

        let iterations = self.config.max_iterations;
        tracing::warn!(%run_id, iterations, "reflection budget exhausted");
        Ok(blocked_report(
            run_id,
            mapping,
            state,
            BLOCKED_MAX_ITERATIONS,
            iterations,
        ))
    }
}

fn approved_report(
    run_id: uuid::Uuid,
    mapping: MappingResult,
    draft: MigrationDraft,
    validation: MigrationValidationReport,
    quality: TemplateQualityReport,
    reflections: Vec<ReflectionStep>,
    iterations_used: u32,
) -> ReflectionReport {
    ReflectionReport {
        run_id,
        status: RunStatus::Approved,
        mapping_result: mapping,
        final_draft: Some(draft),
        validation: Some(validation),
        quality: Some(quality),
        reflections,
        blocked_reason: None,
        iterations_used,
        finished_at: now(),
    }
}

fn blocked_report(
    run_id: uuid::Uuid,
    mapping: MappingResult,
    state: RunState,
    reason: &str,
    iterations_used: u32,
) -> ReflectionReport {
    ReflectionReport {
        run_id,
        status: RunStatus::Blocked,
        mapping_result: mapping,
        final_draft: state.current_draft,
        validation: state.last_validation,
        quality: state.last_quality,
        reflections: state.reflections,
        blocked_reason: Some(reason.to_string()),
        iterations_used,
        finished_at: now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use setpoint_core::FieldDefinition;

    fn passing_dictionary() -> FieldDictionary {
        // No controllable fields outside the objective, so the rule
        // generator's guardrails cover the whole quality target set.
        FieldDictionary::new(vec![
            FieldDefinition::new("energy_cost", "cost", "$/h"),
            FieldDefinition::new("efficiency", "efficiency", "ratio"),
        ])
        .unwrap()
    }

    fn stubborn_dictionary() -> FieldDictionary {
        // A controllable field the rule generator never guards, so the
        // quality gate fails on coverage every iteration.
        FieldDictionary::new(vec![
            FieldDefinition::new("energy_cost", "cost", "$/h"),
            FieldDefinition::new("damper_pos", "damper position", "%").with_controllable(true),
        ])
        .unwrap()
    }

    #[test]
    fn test_rule_run_approves_on_first_iteration() {
        let orchestrator = ReflectionOrchestrator::rule_based();
        let request = ReflectionRequest::new(SceneMetadata::new("wf-scene"), passing_dictionary())
            .with_requirements(vec!["minimize energy cost".to_string()]);

        let report = orchestrator.run(&request).unwrap();
        assert_eq!(report.status, RunStatus::Approved);
        assert_eq!(report.iterations_used, 1);
        assert_eq!(report.reflections.len(), 1);
        assert!(report.reflections[0].critic_feedback.is_none());
        assert!(report.blocked_reason.is_none());

        let draft = report.final_draft.as_ref().unwrap();
        assert_eq!(draft.trace.len(), 1);
        assert_eq!(draft.trace[0].draft_id, draft.draft_id);
    }

    #[test]
    fn test_budget_exhaustion_blocks_with_full_trace() {
        let orchestrator = ReflectionOrchestrator::rule_based();
        let request =
            ReflectionRequest::new(SceneMetadata::new("wf-stubborn"), stubborn_dictionary());

        let report = orchestrator.run(&request).unwrap();
        assert_eq!(report.status, RunStatus::Blocked);
        assert_eq!(
            report.blocked_reason.as_deref(),
            Some(BLOCKED_MAX_ITERATIONS)
        );
        assert_eq!(report.iterations_used, 3);
        assert_eq!(report.reflections.len(), 3);
        for (idx, step) in report.reflections.iter().enumerate() {
            assert_eq!(step.iteration, idx as u32 + 1);
            assert!(step.critic_feedback.is_some());
            assert!(!step.quality_passed);
        }
        // The critic keeps pointing at guardrail coverage.
        let feedback = report.reflections[0].critic_feedback.as_ref().unwrap();
        assert!(feedback.correction_instruction.contains("guardrail"));
    }

    #[test]
    fn test_custom_iteration_budget_is_honored() {
        let orchestrator = ReflectionOrchestrator::rule_based().with_config(ReflectionConfig {
            max_iterations: 1,
            ..ReflectionConfig::default()
        });
        let request =
            ReflectionRequest::new(SceneMetadata::new("wf-short"), stubborn_dictionary());

        let report = orchestrator.run(&request).unwrap();
        assert_eq!(report.iterations_used, 1);
        assert_eq!(report.reflections.len(), 1);
    }

    #[test]
    fn test_mapping_runs_once_and_lands_in_report() {
        let orchestrator = ReflectionOrchestrator::rule_based();
        let request = ReflectionRequest::new(SceneMetadata::new("wf-map"), passing_dictionary())
            .with_legacy_points(vec!["ENERGY_COST".to_string(), "mystery_tag_7".to_string()]);

        let report = orchestrator.run(&request).unwrap();
        let mapping = &report.mapping_result;
        assert_eq!(mapping.mappings.len(), 1);
        assert_eq!(mapping.unmapped_points, vec!["mystery_tag_7"]);

        let draft = report.final_draft.as_ref().unwrap();
        assert_eq!(draft.source_mappings.len(), 1);
        assert!(draft
            .pending_confirmations
            .iter()
            .any(|p| p.contains("unmapped")));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let orchestrator = ReflectionOrchestrator::rule_based().with_config(ReflectionConfig {
            max_iterations: 0,
            ..ReflectionConfig::default()
        });
        let request = ReflectionRequest::new(SceneMetadata::new("wf-bad"), passing_dictionary());
        assert!(orchestrator.run(&request).is_err());
    }
}

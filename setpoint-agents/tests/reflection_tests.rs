//! End-to-end reflection runs with a scripted delegated provider.

use serde_json::json;
use setpoint_agents::{ReflectionOrchestrator, ReflectionRequest};
use setpoint_core::{
    FieldDefinition, FieldDictionary, RunStatus, SceneMetadata, BLOCKED_FATAL_CRITIC,
    BLOCKED_MAX_ITERATIONS,
};
use setpoint_llm::MockCompletionProvider;
use std::sync::Arc;

fn dictionary() -> FieldDictionary {
    FieldDictionary::new(vec![
        FieldDefinition::new("energy_cost", "cost", "$/h"),
        FieldDefinition::new("efficiency", "efficiency", "ratio"),
    ])
    .unwrap()
    .with_alias("p01", "energy_cost")
}

fn stubborn_dictionary() -> FieldDictionary {
    // The rule generator never guards the controllable non-objective field,
    // so the quality gate keeps failing on coverage.
    FieldDictionary::new(vec![
        FieldDefinition::new("energy_cost", "cost", "$/h"),
        FieldDefinition::new("damper_pos", "damper position", "%").with_controllable(true),
    ])
    .unwrap()
}

fn mapper_reply() -> serde_json::Value {
    json!({
        "mappings": [
            {"legacy_name": "p01", "standard_name": "energy_cost",
             "confidence": 0.95, "reasoning": "alias map"}
        ],
        "unmapped_points": []
    })
}

fn passing_generator_reply() -> serde_json::Value {
    json!({
        "objective": {"terms": [
            {"field_name": "energy_cost", "direction": "min", "weight": 0.6},
            {"field_name": "efficiency", "direction": "max", "weight": 0.4}
        ]},
        "constraints": [],
        "guardrail": {"rules": []},
        "prediction": {"feature_fields": ["energy_cost", "efficiency"], "horizon_steps": 3},
        "notes": "delegated draft"
    })
}

#[test]
fn delegated_run_approves_and_keeps_llm_strategy() {
    let provider = MockCompletionProvider::new()
        .with_response("mapper", mapper_reply())
        .with_response("generator", passing_generator_reply());
    let orchestrator = ReflectionOrchestrator::delegated(Arc::new(provider));

    let request = ReflectionRequest::new(SceneMetadata::new("delegated-scene"), dictionary())
        .with_requirements(vec!["minimize energy, maximize efficiency".to_string()])
        .with_legacy_points(vec!["p01".to_string()]);

    let report = orchestrator.run(&request).unwrap();
    assert_eq!(report.status, RunStatus::Approved);
    assert_eq!(report.iterations_used, 1);

    let draft = report.final_draft.unwrap();
    assert_eq!(draft.generation_strategy, "llm_primary");
    assert!(draft.risks.is_empty());
    // Guardrail injection covered both objective fields.
    assert_eq!(draft.template.guardrail.rules.len(), 2);
    assert_eq!(report.mapping_result.strategy, "llm_semantic_mapping");
    assert_eq!(draft.source_mappings.len(), 1);
    // Confidence derives from the mapper: 0.6 + 0.4 * 0.95 = 0.98, capped below.
    assert_eq!(draft.confidence, 0.95);
}

#[test]
fn delegated_generator_outage_degrades_to_rules_and_still_passes() {
    let provider = MockCompletionProvider::new()
        .with_response("mapper", mapper_reply())
        .with_failure("generator", "http 503")
        .with_failure("generator", "http 503");
    let orchestrator = ReflectionOrchestrator::delegated(Arc::new(provider));

    let request = ReflectionRequest::new(SceneMetadata::new("degraded-scene"), dictionary())
        .with_requirements(vec!["minimize energy".to_string()]);

    let report = orchestrator.run(&request).unwrap();
    assert_eq!(report.status, RunStatus::Approved);

    let draft = report.final_draft.unwrap();
    assert_eq!(draft.generation_strategy, "rule_fallback");
    assert_eq!(draft.risks.len(), 1);
    assert_eq!(draft.risks[0].code, "LLM_GENERATOR_UNAVAILABLE");
}

#[test]
fn fatal_critic_verdict_short_circuits_remaining_budget() {
    let provider = MockCompletionProvider::new()
        .with_response("mapper", mapper_reply())
        // Generator falls back to rules (which cannot fix coverage), critic
        // immediately declares the situation fatal.
        .with_failure("generator", "http 503")
        .with_failure("generator", "http 503")
        .with_response(
            "critic",
            json!({
                "is_fatal_error": true,
                "analysis": "dictionary cannot support required guardrails",
                "correction_instruction": "rebuild the field dictionary"
            }),
        );
    let orchestrator = ReflectionOrchestrator::delegated(Arc::new(provider));

    let request =
        ReflectionRequest::new(SceneMetadata::new("fatal-scene"), stubborn_dictionary());

    let report = orchestrator.run(&request).unwrap();
    assert_eq!(report.status, RunStatus::Blocked);
    assert_eq!(report.blocked_reason.as_deref(), Some(BLOCKED_FATAL_CRITIC));
    // Budget of three, stopped after one.
    assert_eq!(report.iterations_used, 1);
    assert_eq!(report.reflections.len(), 1);
    let step = &report.reflections[0];
    assert!(step.critic_feedback.as_ref().unwrap().is_fatal_error);
    assert!(report.final_draft.is_some());
}

#[test]
fn mapper_is_invoked_exactly_once_across_all_iterations() {
    let provider = Arc::new(
        MockCompletionProvider::new().with_response("mapper", mapper_reply()),
        // Generator and critic have no scripts: every delegated call fails
        // and falls back, keeping the run alive for all three iterations.
    );
    let orchestrator = ReflectionOrchestrator::delegated(provider.clone());

    let request = ReflectionRequest::new(SceneMetadata::new("count-scene"), stubborn_dictionary())
        .with_legacy_points(vec!["p01".to_string()]);

    let report = orchestrator.run(&request).unwrap();
    assert_eq!(report.status, RunStatus::Blocked);
    assert_eq!(
        report.blocked_reason.as_deref(),
        Some(BLOCKED_MAX_ITERATIONS)
    );
    assert_eq!(report.iterations_used, 3);
    assert_eq!(report.reflections.len(), 3);

    let mapper_calls = provider
        .call_log()
        .iter()
        .filter(|role| role.as_str() == "mapper")
        .count();
    assert_eq!(mapper_calls, 1);
}

#[test]
fn trace_is_append_only_and_ordered() {
    let orchestrator = ReflectionOrchestrator::rule_based();
    let request =
        ReflectionRequest::new(SceneMetadata::new("trace-scene"), stubborn_dictionary());

    let report = orchestrator.run(&request).unwrap();
    let iterations: Vec<u32> = report.reflections.iter().map(|s| s.iteration).collect();
    assert_eq!(iterations, vec![1, 2, 3]);

    // The final draft carries the same trace the report does.
    let draft = report.final_draft.unwrap();
    assert_eq!(draft.trace.len(), report.reflections.len());
    for (a, b) in draft.trace.iter().zip(&report.reflections) {
        assert_eq!(a.iteration, b.iteration);
        assert_eq!(a.draft_id, b.draft_id);
    }
}

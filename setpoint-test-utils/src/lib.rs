//! SETPOINT Test Utilities
//!
//! Synthetic scenario templates and context fixtures shared across the
//! workspace test suites. The templates are small but complete: every spec
//! section is populated, so fixtures exercise the same code paths real
//! catalogs do.

pub use setpoint_core::{
    ConstraintSpec, FieldDefinition, FieldDictionary, GuardrailAction, GuardrailRule,
    GuardrailSpec, ObjectiveSpec, ObjectiveTerm, OptimizationSpec, PredictionSpec,
    ScenarioTemplate, SceneContext, SceneMetadata,
};

/// Baseline template for energy-cost minimization with an efficiency
/// tradeoff. Four fields, two of them controllable, full guardrail coverage.
pub fn energy_efficiency_template() -> ScenarioTemplate {
    let dictionary = FieldDictionary::new(vec![
        FieldDefinition::new("energy_cost", "energy_cost", "$/h"),
        FieldDefinition::new("steam_flow", "steam_flow", "t/h").with_controllable(true),
        FieldDefinition::new("boiler_temp", "temperature", "C").with_controllable(true),
        FieldDefinition::new("efficiency", "efficiency", "ratio"),
    ])
    .expect("fixture dictionary is valid");

    let objective = ObjectiveSpec::new(vec![
        ObjectiveTerm::minimize("energy_cost", 0.6),
        ObjectiveTerm::maximize("efficiency", 0.4),
    ])
    .expect("fixture objective is valid");

    let prediction = PredictionSpec::new(
        vec![
            "energy_cost".to_string(),
            "steam_flow".to_string(),
            "boiler_temp".to_string(),
            "efficiency".to_string(),
        ],
        3,
    )
    .expect("fixture prediction spec is valid");

    ScenarioTemplate::new(
        "synthetic-energy-template",
        "v1",
        SceneMetadata::new("synthetic-energy")
            .with_scenario_type("efficiency")
            .with_tags(vec!["synthetic".to_string()]),
        dictionary,
        objective,
        prediction,
    )
    .with_constraints(vec![
        ConstraintSpec::ge("steam_flow_nonnegative", "steam_flow", 0.0).with_priority(10),
        ConstraintSpec::between("boiler_temp_range", "boiler_temp", 200.0, 950.0)
            .expect("fixture constraint bounds are ordered")
            .with_priority(5),
    ])
    .with_optimization(OptimizationSpec::new("projected-heuristic", 80, 1e-6, 250))
    .with_guardrail(GuardrailSpec::new(vec![
        GuardrailRule::new("boiler_temp", GuardrailAction::Reject)
            .with_min_value(250.0)
            .with_max_value(900.0)
            .with_max_delta(60.0),
        GuardrailRule::new("steam_flow", GuardrailAction::Clip)
            .with_min_value(0.0)
            .with_max_delta(8.0),
        GuardrailRule::new("energy_cost", GuardrailAction::Clip)
            .with_min_value(0.0)
            .with_max_delta(25.0),
        GuardrailRule::new("efficiency", GuardrailAction::Clip)
            .with_min_value(0.0)
            .with_max_value(1.0)
            .with_max_delta(0.08),
    ]))
    .with_notes("Synthetic template for the energy-efficiency tradeoff.")
}

/// A nominal operating point for [`energy_efficiency_template`]: inside
/// every constraint and guardrail envelope.
pub fn energy_context() -> SceneContext {
    SceneContext::from_pairs([
        ("energy_cost", 120.0),
        ("steam_flow", 11.0),
        ("boiler_temp", 480.0),
        ("efficiency", 0.78),
    ])
}

/// Baseline template for quality/rework optimization with stability
/// guardrails. Used where tests need a second, structurally different shape.
pub fn quality_stability_template() -> ScenarioTemplate {
    let dictionary = FieldDictionary::new(vec![
        FieldDefinition::new("rework_rate", "rework quality loss", "ratio"),
        FieldDefinition::new("line_speed", "line speed", "m/min").with_controllable(true),
        FieldDefinition::new("oven_temp", "temperature", "C").with_controllable(true),
    ])
    .expect("fixture dictionary is valid");

    let objective = ObjectiveSpec::new(vec![ObjectiveTerm::minimize("rework_rate", 1.0)])
        .expect("fixture objective is valid");

    let prediction = PredictionSpec::new(
        vec![
            "rework_rate".to_string(),
            "line_speed".to_string(),
            "oven_temp".to_string(),
        ],
        2,
    )
    .expect("fixture prediction spec is valid");

    ScenarioTemplate::new(
        "synthetic-quality-template",
        "v1",
        SceneMetadata::new("synthetic-quality").with_scenario_type("quality"),
        dictionary,
        objective,
        prediction,
    )
    .with_constraints(vec![
        ConstraintSpec::between("oven_temp_range", "oven_temp", 120.0, 300.0)
            .expect("fixture constraint bounds are ordered")
            .with_priority(5),
        ConstraintSpec::ge("line_speed_floor", "line_speed", 1.0).with_priority(10),
    ])
    .with_guardrail(GuardrailSpec::new(vec![
        GuardrailRule::new("rework_rate", GuardrailAction::Clip)
            .with_min_value(0.0)
            .with_max_delta(0.05),
        GuardrailRule::new("line_speed", GuardrailAction::Clip).with_max_delta(2.0),
        GuardrailRule::new("oven_temp", GuardrailAction::Reject)
            .with_min_value(130.0)
            .with_max_value(290.0)
            .with_max_delta(15.0),
    ]))
    .with_notes("Synthetic template for quality/rework optimization.")
}

/// A nominal operating point for [`quality_stability_template`].
pub fn quality_context() -> SceneContext {
    SceneContext::from_pairs([
        ("rework_rate", 0.04),
        ("line_speed", 18.0),
        ("oven_temp", 210.0),
    ])
}

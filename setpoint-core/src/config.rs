//! Configuration types

use crate::{ConfigError, SetpointResult};
use serde::{Deserialize, Serialize};

/// Per-dimension pass thresholds for the quality gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct QualityGate {
    pub structural_min: f64,
    pub semantic_min: f64,
    pub solvability_min: f64,
    pub guardrail_min: f64,
    pub regression_min: f64,
    pub overall_min: f64,
}

impl Default for QualityGate {
    fn default() -> Self {
        Self {
            structural_min: 0.98,
            semantic_min: 0.98,
            solvability_min: 0.95,
            guardrail_min: 0.95,
            regression_min: 0.90,
            overall_min: 0.95,
        }
    }
}

impl QualityGate {
    /// Validate that every threshold is a sane score bound.
    pub fn validate(&self) -> SetpointResult<()> {
        let checks = [
            ("structural_min", self.structural_min),
            ("semantic_min", self.semantic_min),
            ("solvability_min", self.solvability_min),
            ("guardrail_min", self.guardrail_min),
            ("regression_min", self.regression_min),
            ("overall_min", self.overall_min),
        ];
        for (field, value) in checks {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: value.to_string(),
                    reason: "threshold must be between 0.0 and 1.0".to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// Settings for one reflection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ReflectionConfig {
    /// Generate/score/critique cycles before the run blocks
    pub max_iterations: u32,
    /// Attempts per delegated (LLM) call site before rule fallback
    pub delegated_attempts: u32,
    /// Sampling temperature for the delegated generator
    pub generator_temperature: f32,
    /// Sampling temperature for the delegated mapper and critic
    pub deterministic_temperature: f32,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            delegated_attempts: 2,
            generator_temperature: 0.1,
            deterministic_temperature: 0.0,
        }
    }
}

impl ReflectionConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> SetpointResult<()> {
        if self.max_iterations < 1 {
            return Err(ConfigError::InvalidValue {
                field: "max_iterations".to_string(),
                value: self.max_iterations.to_string(),
                reason: "at least one iteration is required".to_string(),
            }
            .into());
        }
        if self.delegated_attempts < 1 {
            return Err(ConfigError::InvalidValue {
                field: "delegated_attempts".to_string(),
                value: self.delegated_attempts.to_string(),
                reason: "at least one delegated attempt is required".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `SETPOINT_MAX_ITERATIONS`: reflection budget (default: 3)
    /// - `SETPOINT_DELEGATED_ATTEMPTS`: attempts per delegated call (default: 2)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_iterations: std::env::var("SETPOINT_MAX_ITERATIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_iterations),
            delegated_attempts: std::env::var("SETPOINT_DELEGATED_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.delegated_attempts),
            generator_temperature: defaults.generator_temperature,
            deterministic_temperature: defaults.deterministic_temperature,
        }
    }
}

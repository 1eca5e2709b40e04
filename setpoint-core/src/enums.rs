//! Enum types for SETPOINT contracts

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// SPECIFICATION ENUMS
// ============================================================================

/// Direction of an objective term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveDirection {
    /// Drive the field value down
    Min,
    /// Drive the field value up
    Max,
}

/// Comparison operator for a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ConstraintOperator {
    /// Value must stay at or below the upper bound
    Le,
    /// Value must stay at or above the lower bound
    Ge,
    /// Value must equal the target exactly
    Eq,
    /// Value must stay inside [lower, upper]
    Between,
}

/// How strictly a constraint binds the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ConstraintSeverity {
    Hard,
    Soft,
}

/// Enforcement action taken when a guardrail rule is violated.
///
/// Actions are ordered by severity: `Warn < Clip < Reject`. A rule scan
/// escalates monotonically through this order and never de-escalates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum GuardrailAction {
    /// Record the violation, keep the recommended value
    Warn,
    /// Pull the value back inside the allowed envelope
    Clip,
    /// Refuse the whole plan
    Reject,
}

impl GuardrailAction {
    /// Severity rank used for escalation.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Warn => 0,
            Self::Clip => 1,
            Self::Reject => 2,
        }
    }

    /// Return the more severe of `self` and `incoming`.
    pub fn escalate(self, incoming: GuardrailAction) -> GuardrailAction {
        if incoming.rank() > self.rank() {
            incoming
        } else {
            self
        }
    }
}

/// Strategy applied when a field value is missing from a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum MissingValueStrategy {
    /// Missing value is an error
    Required,
    /// Drop the field from the snapshot
    Drop,
    /// Substitute 0.0
    Zero,
    /// Carry the last observed value forward
    ForwardFill,
    /// Substitute the historical mean
    Mean,
}

impl Default for MissingValueStrategy {
    fn default() -> Self {
        Self::Required
    }
}

/// Severity of a validation or quality issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Error,
    Warn,
    Info,
}

// ============================================================================
// RUNTIME ENUMS
// ============================================================================

/// Outcome reported by the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum SolverStatus {
    Solved,
    /// Only reachable through inverted `between` bounds, which constructors
    /// forbid. Kept as a defensive status for externally deserialized specs.
    Infeasible,
}

/// Terminal status of one reflection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Approved,
    Blocked,
}

// ============================================================================
// STRING CONVERSIONS
// ============================================================================

impl fmt::Display for ObjectiveDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            ObjectiveDirection::Min => "min",
            ObjectiveDirection::Max => "max",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for ObjectiveDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "min" | "minimize" => Ok(ObjectiveDirection::Min),
            "max" | "maximize" => Ok(ObjectiveDirection::Max),
            _ => Err(format!("Invalid ObjectiveDirection: {}", s)),
        }
    }
}

impl fmt::Display for ConstraintOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            ConstraintOperator::Le => "le",
            ConstraintOperator::Ge => "ge",
            ConstraintOperator::Eq => "eq",
            ConstraintOperator::Between => "between",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for ConstraintOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "le" | "<=" => Ok(ConstraintOperator::Le),
            "ge" | ">=" => Ok(ConstraintOperator::Ge),
            "eq" | "==" => Ok(ConstraintOperator::Eq),
            "between" => Ok(ConstraintOperator::Between),
            _ => Err(format!("Invalid ConstraintOperator: {}", s)),
        }
    }
}

impl fmt::Display for GuardrailAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            GuardrailAction::Warn => "warn",
            GuardrailAction::Clip => "clip",
            GuardrailAction::Reject => "reject",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for GuardrailAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "warn" => Ok(GuardrailAction::Warn),
            "clip" => Ok(GuardrailAction::Clip),
            "reject" => Ok(GuardrailAction::Reject),
            _ => Err(format!("Invalid GuardrailAction: {}", s)),
        }
    }
}

impl fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            IssueSeverity::Error => "error",
            IssueSeverity::Warn => "warn",
            IssueSeverity::Info => "info",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for IssueSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(IssueSeverity::Error),
            "warn" | "warning" => Ok(IssueSeverity::Warn),
            "info" => Ok(IssueSeverity::Info),
            _ => Err(format!("Invalid IssueSeverity: {}", s)),
        }
    }
}

impl fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            SolverStatus::Solved => "solved",
            SolverStatus::Infeasible => "infeasible",
        };
        write!(f, "{}", value)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            RunStatus::Approved => "approved",
            RunStatus::Blocked => "blocked",
        };
        write!(f, "{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guardrail_action_escalation_order() {
        assert_eq!(
            GuardrailAction::Warn.escalate(GuardrailAction::Clip),
            GuardrailAction::Clip
        );
        assert_eq!(
            GuardrailAction::Clip.escalate(GuardrailAction::Reject),
            GuardrailAction::Reject
        );
        assert_eq!(
            GuardrailAction::Reject.escalate(GuardrailAction::Warn),
            GuardrailAction::Reject
        );
        assert_eq!(
            GuardrailAction::Clip.escalate(GuardrailAction::Warn),
            GuardrailAction::Clip
        );
    }

    #[test]
    fn test_objective_direction_roundtrip() {
        for direction in [ObjectiveDirection::Min, ObjectiveDirection::Max] {
            let parsed: ObjectiveDirection = direction.to_string().parse().unwrap();
            assert_eq!(direction, parsed);
        }
    }

    #[test]
    fn test_constraint_operator_accepts_symbolic_forms() {
        assert_eq!(
            "<=".parse::<ConstraintOperator>().unwrap(),
            ConstraintOperator::Le
        );
        assert_eq!(
            ">=".parse::<ConstraintOperator>().unwrap(),
            ConstraintOperator::Ge
        );
        assert_eq!(
            "==".parse::<ConstraintOperator>().unwrap(),
            ConstraintOperator::Eq
        );
        assert!("~=".parse::<ConstraintOperator>().is_err());
    }

    #[test]
    fn test_serde_uses_snake_case_wire_form() {
        let json = serde_json::to_string(&GuardrailAction::Reject).unwrap();
        assert_eq!(json, "\"reject\"");
        let back: GuardrailAction = serde_json::from_str("\"clip\"").unwrap();
        assert_eq!(back, GuardrailAction::Clip);
    }
}

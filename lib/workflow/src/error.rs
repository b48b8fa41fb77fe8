//! Error types for workflow definitions.

use std::fmt;
use uuid::Uuid;

/// Errors from validating or compiling workflow definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// The function declaration is structurally invalid.
    InvalidFunction { function: String, reason: String },
    /// An edge references a step that does not exist.
    UnknownStep { step: String },
    /// The step graph contains a cycle.
    CycleDetected { workflow: Uuid },
    /// A TTL string could not be parsed as a duration.
    InvalidDuration { value: String },
}

impl fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFunction { function, reason } => {
                write!(f, "invalid function '{function}': {reason}")
            }
            Self::UnknownStep { step } => write!(f, "unknown step: {step}"),
            Self::CycleDetected { workflow } => {
                write!(f, "workflow {workflow} contains a cycle")
            }
            Self::InvalidDuration { value } => {
                write!(f, "invalid duration: '{value}'")
            }
        }
    }
}

impl std::error::Error for WorkflowError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_step_name() {
        let err = WorkflowError::UnknownStep {
            step: "deploy".to_string(),
        };
        assert!(err.to_string().contains("deploy"));
    }
}

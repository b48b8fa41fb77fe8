//! Function loading contracts.

use amber_relay_workflow::{Function, WorkflowError};
use async_trait::async_trait;
use std::fmt;

/// Errors from function loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    /// A function failed validation when registered.
    InvalidFunction {
        function: String,
        source: WorkflowError,
    },
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFunction { function, source } => {
                write!(f, "invalid function '{function}': {source}")
            }
        }
    }
}

impl std::error::Error for DataError {}

/// Loads function definitions for execution.
///
/// Lookups return empty vectors, not errors, when nothing matches.
#[async_trait]
pub trait ExecutionLoader: Send + Sync {
    /// Functions with an event trigger for the given event name.
    async fn functions_by_trigger(&self, event_name: &str) -> Result<Vec<Function>, DataError>;

    /// Functions with at least one cron trigger.
    async fn functions_scheduled(&self) -> Result<Vec<Function>, DataError>;

    /// All registered functions.
    async fn functions(&self) -> Result<Vec<Function>, DataError>;
}

//! In-memory function loader, for development and tests.

use crate::loader::{DataError, ExecutionLoader};
use amber_relay_workflow::{Function, Trigger};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

/// In-memory [`ExecutionLoader`] over an explicitly registered function set.
#[derive(Clone, Default)]
pub struct MemoryExecutionLoader {
    functions: Arc<RwLock<Vec<Function>>>,
}

impl MemoryExecutionLoader {
    /// Creates an empty loader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the registered function set, validating each function.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::InvalidFunction`] for the first function that
    /// fails validation; the registered set is unchanged on error.
    pub fn set_functions(&self, functions: Vec<Function>) -> Result<(), DataError> {
        for function in &functions {
            function
                .validate()
                .map_err(|source| DataError::InvalidFunction {
                    function: function.id.clone(),
                    source,
                })?;
        }
        *self.functions.write() = functions;
        Ok(())
    }
}

#[async_trait]
impl ExecutionLoader for MemoryExecutionLoader {
    async fn functions_by_trigger(&self, event_name: &str) -> Result<Vec<Function>, DataError> {
        Ok(self
            .functions
            .read()
            .iter()
            .filter(|f| {
                f.triggers
                    .iter()
                    .any(|t| t.as_event().is_some_and(|e| e.event == event_name))
            })
            .cloned()
            .collect())
    }

    async fn functions_scheduled(&self) -> Result<Vec<Function>, DataError> {
        Ok(self
            .functions
            .read()
            .iter()
            .filter(|f| f.triggers.iter().any(|t| matches!(t, Trigger::Cron(_))))
            .cloned()
            .collect())
    }

    async fn functions(&self) -> Result<Vec<Function>, DataError> {
        Ok(self.functions.read().clone())
    }
}

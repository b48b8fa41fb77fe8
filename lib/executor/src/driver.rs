//! Step drivers.
//!
//! A driver executes one step's runtime kind. The executor selects a driver
//! by the step's [`RuntimeConfig`](amber_relay_workflow::RuntimeConfig) kind
//! and never looks inside the response beyond the retry rules.

use amber_relay_state::{DriverResponse, RunState};
use amber_relay_workflow::Step;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// Errors from driver infrastructure (not step failures, which are modeled
/// as [`DriverResponse::err`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// The driver could not run the step at all.
    Unavailable { message: String },
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { message } => write!(f, "driver unavailable: {message}"),
        }
    }
}

impl std::error::Error for DriverError {}

/// Executes steps of one runtime kind.
#[async_trait]
pub trait Driver: Send + Sync {
    /// The runtime kind this driver serves, e.g. `"mock"`.
    fn name(&self) -> &'static str;

    /// Executes a step against the current run state.
    async fn execute(&self, state: &RunState, step: &Step) -> Result<DriverResponse, DriverError>;
}

/// A driver returning canned responses, for development and tests.
#[derive(Default)]
pub struct MockDriver {
    responses: Mutex<HashMap<String, DriverResponse>>,
    executed: Mutex<Vec<String>>,
}

impl MockDriver {
    /// Creates a driver with no responses configured.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the response returned for a step ID.
    pub fn respond_with(&self, step_id: impl Into<String>, response: DriverResponse) {
        self.responses.lock().insert(step_id.into(), response);
    }

    /// The step IDs executed so far, in order.
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }
}

#[async_trait]
impl Driver for MockDriver {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn execute(&self, _state: &RunState, step: &Step) -> Result<DriverResponse, DriverError> {
        self.executed.lock().push(step.id.clone());

        if let Some(mut response) = self.responses.lock().get(&step.id).cloned() {
            response.step = step.clone();
            return Ok(response);
        }

        // An unconfigured step failing a test should fail fast, not retry.
        let mut output = Map::new();
        output.insert("status".to_string(), Value::from(400));
        Ok(DriverResponse::error(step.clone(), "no response configured").with_output(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amber_relay_state::{Identifier, RunMetadata};
    use amber_relay_workflow::{RuntimeConfig, Workflow};
    use chrono::Utc;
    use serde_json::json;
    use std::collections::HashMap as StdHashMap;
    use uuid::Uuid;

    fn step(id: &str) -> Step {
        Step {
            id: id.to_string(),
            name: String::new(),
            runtime: RuntimeConfig::Mock,
        }
    }

    fn state() -> RunState {
        RunState {
            identifier: Identifier::new(Uuid::new_v4(), ""),
            metadata: RunMetadata {
                started_at: Utc::now(),
                pending: 1,
            },
            workflow: Workflow {
                uuid: Uuid::new_v4(),
                name: String::new(),
                steps: vec![step("1")],
                edges: Vec::new(),
            },
            event: Map::new(),
            actions: StdHashMap::new(),
            errors: StdHashMap::new(),
        }
    }

    #[tokio::test]
    async fn returns_configured_responses() {
        let driver = MockDriver::new();
        let mut output = Map::new();
        output.insert("id".to_string(), json!(1));
        driver.respond_with("1", DriverResponse::output(step("1"), output.clone()));

        let response = driver.execute(&state(), &step("1")).await.unwrap();
        assert_eq!(response.output, output);
        assert!(response.err.is_none());
        assert_eq!(driver.executed(), vec!["1"]);
    }

    #[tokio::test]
    async fn unconfigured_steps_fail_without_retry() {
        let driver = MockDriver::new();
        let response = driver.execute(&state(), &step("9")).await.unwrap();
        assert!(response.err.is_some());
        assert!(!response.retryable());
        assert!(response.is_final());
    }
}

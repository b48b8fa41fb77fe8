//! Driver responses and retry semantics.

use amber_relay_workflow::Step;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Version of the action a driver executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionVersion {
    pub major: u32,
    pub minor: u32,
}

/// The result of a driver executing a step.
///
/// The output is a JSON map. If it contains a `status` field (or
/// `statusCode`, for Lambda-shaped responses), that status drives the retry
/// decision for errored responses: 5xx retries, 4xx does not, and a missing
/// or non-numeric status is treated as retryable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverResponse {
    /// The step this response is for.
    pub step: Step,
    /// True when the driver runs the step asynchronously; the output arrives
    /// via a future event rather than in this response.
    #[serde(default)]
    pub scheduled: bool,
    /// The step's output, as a JSON map.
    #[serde(default)]
    pub output: Map<String, Value>,
    /// The error, if the step failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
    /// Version of the executed action, when the workflow pins a range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_version: Option<ActionVersion>,
    /// Set once the executor exhausts retries; forces finality.
    #[serde(default, rename = "final")]
    finalized: bool,
}

impl DriverResponse {
    /// A successful response with the given output.
    #[must_use]
    pub fn output(step: Step, output: Map<String, Value>) -> Self {
        Self {
            step,
            scheduled: false,
            output,
            err: None,
            action_version: None,
            finalized: false,
        }
    }

    /// A failed response.
    #[must_use]
    pub fn error(step: Step, err: impl Into<String>) -> Self {
        Self {
            step,
            scheduled: false,
            output: Map::new(),
            err: Some(err.into()),
            action_version: None,
            finalized: false,
        }
    }

    /// Replaces the output map, e.g. to attach a status code to an error.
    #[must_use]
    pub fn with_output(mut self, output: Map<String, Value>) -> Self {
        self.output = output;
        self
    }

    /// Marks this response as final regardless of its status, preventing
    /// further retries. Called by the executor at the max-attempt limit.
    pub fn set_final(&mut self) {
        self.finalized = true;
    }

    fn status(&self) -> Option<f64> {
        // statusCode is only consulted when status is missing entirely; a
        // present-but-non-numeric status reads as absent.
        self.output
            .get("status")
            .or_else(|| self.output.get("statusCode"))
            .and_then(Value::as_f64)
    }

    /// Whether the executor may retry this response.
    ///
    /// Successful responses and finalized responses are never retryable.
    /// Errored responses retry unless the output carries a numeric status
    /// below 500.
    #[must_use]
    pub fn retryable(&self) -> bool {
        if self.err.is_none() || self.finalized {
            return false;
        }
        match self.status() {
            None => true,
            Some(status) => status > 499.0,
        }
    }

    /// Whether recording this response finalizes the step.
    ///
    /// Only non-retryable errors are final on their own; successful responses
    /// stay non-final so the executor can balance the pending counter after
    /// enqueuing child edges.
    #[must_use]
    pub fn is_final(&self) -> bool {
        if self.finalized {
            return true;
        }
        self.err.is_some() && !self.retryable()
    }
}

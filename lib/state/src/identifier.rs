//! Run identifiers and idempotency keys.

use amber_relay_core::RunId;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies a single run of a workflow.
///
/// The triple is collapsed into an [idempotency key](Identifier::idempotency_key)
/// that acts as the primary key for run state: two identifiers with the same
/// key resolve to the same record, which is how duplicate event deliveries and
/// concurrent cron firings collapse into one run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    /// The workflow being run.
    pub workflow_id: Uuid,
    /// The run's own ID.
    pub run_id: RunId,
    /// Caller-supplied deduplication key, usually the originating event ID.
    #[serde(default)]
    pub key: String,
}

impl Identifier {
    /// Creates an identifier with a fresh run ID.
    #[must_use]
    pub fn new(workflow_id: Uuid, key: impl Into<String>) -> Self {
        Self {
            workflow_id,
            run_id: RunId::new(),
            key: key.into(),
        }
    }

    /// The deterministic primary key for this run's state.
    ///
    /// When `key` is empty the run ID stands in, making every keyless run
    /// unique; otherwise the key scopes deduplication to the workflow.
    #[must_use]
    pub fn idempotency_key(&self) -> String {
        if self.key.is_empty() {
            format!("{}:{}", self.workflow_id, self.run_id)
        } else {
            format!("{}:{}", self.workflow_id, self.key)
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.workflow_id, self.run_id)
    }
}

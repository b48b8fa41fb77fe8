//! The state manager contract.
//!
//! The state manager is the correctness boundary of the whole system: every
//! scheduling invariant (pending accounting, at-most-once resumption,
//! identifier uniqueness, snapshot isolation) is enforced behind this trait.
//! Persistent backends may substitute row locks or conditional updates for
//! the in-memory lock, provided each operation stays individually atomic.

use crate::identifier::Identifier;
use crate::pause::Pause;
use crate::response::DriverResponse;
use amber_relay_workflow::{Workflow, edge_expression_data};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Errors from state manager operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// A run with this idempotency key already exists. Callers racing on
    /// scheduled triggers treat this as duplicate suppression, not failure.
    IdentifierExists { key: String },
    /// No run exists for this identifier.
    RunNotFound { key: String },
    /// The pause is missing or expired.
    PauseNotFound,
    /// Another caller holds the resumption lease.
    PauseLeased,
    /// A pause with this ID was already saved; indicates an upstream bug.
    PauseExists { id: Uuid },
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IdentifierExists { key } => write!(f, "identifier already exists: {key}"),
            Self::RunNotFound { key } => write!(f, "run not found: {key}"),
            Self::PauseNotFound => write!(f, "pause not found"),
            Self::PauseLeased => write!(f, "pause is leased"),
            Self::PauseExists { id } => write!(f, "pause already exists: {id}"),
        }
    }
}

impl std::error::Error for StateError {}

/// Run metadata tracked alongside the step outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct RunMetadata {
    /// When the run was created.
    pub started_at: DateTime<Utc>,
    /// Outstanding-work counter. Starts at 1 for the source edge, increments
    /// per scheduled step, decrements per finalized step; the run is complete
    /// at zero.
    pub pending: u32,
}

/// A snapshot of one run's state.
///
/// Snapshots are disconnected from the store: mutations after a load are
/// never visible through a previously returned snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RunState {
    /// The run's identifier.
    pub identifier: Identifier,
    /// Counter and timestamps.
    pub metadata: RunMetadata,
    /// The workflow as it was at initialization.
    pub workflow: Workflow,
    /// Map form of the originating event.
    pub event: Map<String, Value>,
    /// Successful driver outputs, keyed by step ID.
    pub actions: HashMap<String, Map<String, Value>>,
    /// Most recent error per step, cleared on success.
    pub errors: HashMap<String, String>,
}

impl RunState {
    /// True once every scheduled step has been finalized.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.metadata.pending == 0
    }

    /// Builds the data bound into edge guard expressions: the originating
    /// `event` plus per-step outputs under `steps`.
    #[must_use]
    pub fn expression_data(&self) -> Map<String, Value> {
        edge_expression_data(&self.event, &self.actions)
    }
}

/// Lazy sequence of pauses matching an event.
///
/// Backends may stream entries; an entry can be evicted between `next` and
/// `val`, in which case `val` returns `None` and consumers skip it.
#[async_trait]
pub trait PauseIterator: Send {
    /// Advances to the next entry, returning false when exhausted.
    async fn next(&mut self) -> bool;

    /// Returns the current entry, or `None` for a since-evicted one.
    fn val(&self) -> Option<Pause>;
}

/// Persistent record of workflow runs and their suspension points.
#[async_trait]
pub trait StateManager: Send + Sync {
    /// Creates state for a new run with `pending = 1`.
    ///
    /// # Errors
    ///
    /// [`StateError::IdentifierExists`] when the idempotency key is taken.
    async fn new_run(
        &self,
        workflow: Workflow,
        id: Identifier,
        event: Map<String, Value>,
    ) -> Result<RunState, StateError>;

    /// Returns a disconnected snapshot of the run.
    async fn load(&self, id: &Identifier) -> Result<RunState, StateError>;

    /// True iff the run's pending counter is zero.
    async fn is_complete(&self, id: &Identifier) -> Result<bool, StateError>;

    /// Records that a step has been enqueued: `pending += 1`.
    async fn scheduled(&self, id: &Identifier, step_id: &str) -> Result<(), StateError>;

    /// Records that a step has finished outside of a final response:
    /// `pending -= 1`.
    async fn finalized(&self, id: &Identifier, step_id: &str) -> Result<(), StateError>;

    /// Records a driver response: output on success (clearing the step's
    /// error), error on failure. Final responses decrement `pending`.
    /// Returns the post-update snapshot.
    async fn save_response(
        &self,
        id: &Identifier,
        response: DriverResponse,
        attempt: u32,
    ) -> Result<RunState, StateError>;

    /// Stores a pause keyed by its ID.
    ///
    /// # Errors
    ///
    /// [`StateError::PauseExists`] on a duplicate ID.
    async fn save_pause(&self, pause: Pause) -> Result<(), StateError>;

    /// Takes the resumption lease on a pause for
    /// [`PAUSE_LEASE_DURATION`](crate::pause::PAUSE_LEASE_DURATION).
    ///
    /// # Errors
    ///
    /// [`StateError::PauseNotFound`] when missing or expired;
    /// [`StateError::PauseLeased`] while another caller holds the lease.
    async fn lease_pause(&self, id: Uuid) -> Result<(), StateError>;

    /// Atomically removes a pause.
    ///
    /// # Errors
    ///
    /// [`StateError::PauseNotFound`] when already consumed.
    async fn consume_pause(&self, id: Uuid) -> Result<(), StateError>;

    /// Iterates pauses waiting on the named event.
    async fn pauses_by_event(
        &self,
        event_name: &str,
    ) -> Result<Box<dyn PauseIterator>, StateError>;

    /// Returns the pause opened by the given outgoing step of a run.
    async fn pause_by_step(&self, id: &Identifier, step_id: &str) -> Result<Pause, StateError>;

    /// Returns a pause by ID.
    async fn pause_by_id(&self, id: Uuid) -> Result<Pause, StateError>;
}

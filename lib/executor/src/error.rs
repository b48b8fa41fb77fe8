//! Executor error types.

use crate::driver::DriverError;
use amber_relay_expr::ExpressionError;
use amber_relay_queue::QueueError;
use amber_relay_state::StateError;
use amber_relay_workflow::WorkflowError;
use std::fmt;

/// Errors from the executor service.
#[derive(Debug)]
pub enum ExecutorError {
    /// An edge item names a step missing from the run's workflow snapshot.
    UnknownStep { step: String },
    /// No driver is registered for a step's runtime kind.
    UnknownDriver { kind: String },
    /// State manager error.
    State(StateError),
    /// Queue error.
    Queue(QueueError),
    /// Workflow metadata error (e.g. an unparsable TTL).
    Workflow(WorkflowError),
    /// Edge guard expression error.
    Expression(ExpressionError),
    /// Driver infrastructure error.
    Driver(DriverError),
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownStep { step } => write!(f, "unknown step: {step}"),
            Self::UnknownDriver { kind } => write!(f, "no driver for runtime kind: {kind}"),
            Self::State(e) => write!(f, "state error: {e}"),
            Self::Queue(e) => write!(f, "queue error: {e}"),
            Self::Workflow(e) => write!(f, "workflow error: {e}"),
            Self::Expression(e) => write!(f, "expression error: {e}"),
            Self::Driver(e) => write!(f, "driver error: {e}"),
        }
    }
}

impl std::error::Error for ExecutorError {}

impl From<StateError> for ExecutorError {
    fn from(e: StateError) -> Self {
        Self::State(e)
    }
}

impl From<QueueError> for ExecutorError {
    fn from(e: QueueError) -> Self {
        Self::Queue(e)
    }
}

impl From<WorkflowError> for ExecutorError {
    fn from(e: WorkflowError) -> Self {
        Self::Workflow(e)
    }
}

impl From<ExpressionError> for ExecutorError {
    fn from(e: ExpressionError) -> Self {
        Self::Expression(e)
    }
}

impl From<DriverError> for ExecutorError {
    fn from(e: DriverError) -> Self {
        Self::Driver(e)
    }
}

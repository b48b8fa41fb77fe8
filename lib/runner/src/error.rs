//! Runner error types.

use amber_relay_data::DataError;
use amber_relay_expr::ExpressionError;
use amber_relay_pubsub::PubSubError;
use amber_relay_queue::QueueError;
use amber_relay_state::StateError;
use amber_relay_workflow::WorkflowError;
use std::fmt;

/// Errors from the runner service.
#[derive(Debug)]
pub enum RunnerError {
    /// The envelope's name is not one the runner handles.
    UnknownEventType { name: String },
    /// The envelope's payload could not be decoded as an event.
    Unmarshal { source: serde_json::Error },
    /// A cron expression could not be parsed.
    InvalidCron { expression: String, reason: String },
    /// Shutdown exceeded its deadline.
    TimedOutStopping,
    /// State manager error.
    State(StateError),
    /// Queue error.
    Queue(QueueError),
    /// Event stream error.
    PubSub(PubSubError),
    /// Function loading error.
    Data(DataError),
    /// Workflow compilation error.
    Workflow(WorkflowError),
    /// Guard expression error.
    Expression(ExpressionError),
}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownEventType { name } => write!(f, "unknown event type: {name}"),
            Self::Unmarshal { source } => write!(f, "error unmarshalling event: {source}"),
            Self::InvalidCron { expression, reason } => {
                write!(f, "invalid cron expression '{expression}': {reason}")
            }
            Self::TimedOutStopping => {
                write!(f, "error waiting for scheduled executions to finish")
            }
            Self::State(e) => write!(f, "state error: {e}"),
            Self::Queue(e) => write!(f, "queue error: {e}"),
            Self::PubSub(e) => write!(f, "event stream error: {e}"),
            Self::Data(e) => write!(f, "data error: {e}"),
            Self::Workflow(e) => write!(f, "workflow error: {e}"),
            Self::Expression(e) => write!(f, "expression error: {e}"),
        }
    }
}

impl std::error::Error for RunnerError {}

impl From<StateError> for RunnerError {
    fn from(e: StateError) -> Self {
        Self::State(e)
    }
}

impl From<QueueError> for RunnerError {
    fn from(e: QueueError) -> Self {
        Self::Queue(e)
    }
}

impl From<PubSubError> for RunnerError {
    fn from(e: PubSubError) -> Self {
        Self::PubSub(e)
    }
}

impl From<DataError> for RunnerError {
    fn from(e: DataError) -> Self {
        Self::Data(e)
    }
}

impl From<WorkflowError> for RunnerError {
    fn from(e: WorkflowError) -> Self {
        Self::Workflow(e)
    }
}

impl From<ExpressionError> for RunnerError {
    fn from(e: ExpressionError) -> Self {
        Self::Expression(e)
    }
}

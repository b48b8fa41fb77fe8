//! Queue contracts.

use crate::item::Item;
use amber_relay_core::BoxError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Errors from queue operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The queue is no longer accepting items.
    Closed,
    /// Enqueueing failed.
    EnqueueFailed { message: String },
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "queue is closed"),
            Self::EnqueueFailed { message } => write!(f, "enqueue failed: {message}"),
        }
    }
}

impl std::error::Error for QueueError {}

/// Produces work items.
#[async_trait]
pub trait Producer: Send + Sync {
    /// Enqueues an item for delivery at or after `not_before`.
    async fn enqueue(&self, item: Item, not_before: DateTime<Utc>) -> Result<(), QueueError>;
}

/// Handles dequeued items. Implemented by the executor.
#[async_trait]
pub trait ItemHandler: Send + Sync {
    /// Processes one item. An error is logged by the consumer; redelivery is
    /// the handler's own responsibility (via re-enqueue), not the queue's.
    async fn handle(&self, item: Item) -> Result<(), BoxError>;
}

/// Consumes work items.
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Delivers items to `handler` until `cancel` fires.
    async fn run(
        &self,
        handler: Arc<dyn ItemHandler>,
        cancel: CancellationToken,
    ) -> Result<(), QueueError>;
}

/// A queue usable from both ends of the contract.
pub trait Queue: Producer + Consumer {}

impl<T: Producer + Consumer> Queue for T {}

//! Publish/subscribe contracts.

use crate::message::Message;
use amber_relay_core::BoxError;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Errors from event stream operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PubSubError {
    /// Failed to connect to the transport.
    ConnectionFailed { message: String },
    /// Failed to publish an envelope.
    PublishFailed { message: String },
    /// Failed to establish or maintain a subscription.
    SubscribeFailed { message: String },
}

impl fmt::Display for PubSubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed { message } => {
                write!(f, "event stream connection failed: {message}")
            }
            Self::PublishFailed { message } => write!(f, "event publish failed: {message}"),
            Self::SubscribeFailed { message } => write!(f, "event subscribe failed: {message}"),
        }
    }
}

impl std::error::Error for PubSubError {}

/// Handles messages delivered on a subscription. Implemented by the runner.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Processes one envelope. Errors are logged by the transport; whether
    /// they trigger redelivery is transport-defined.
    async fn handle(&self, message: Message) -> Result<(), BoxError>;
}

/// Publishes envelopes to a topic.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes one envelope.
    async fn publish(&self, topic: &str, message: Message) -> Result<(), PubSubError>;
}

/// Subscribes to a topic.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Delivers envelopes to `handler` until `cancel` fires.
    async fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
        cancel: CancellationToken,
    ) -> Result<(), PubSubError>;
}

/// A transport usable from both ends of the contract.
pub trait PublishSubscriber: Publisher + Subscriber {}

impl<T: Publisher + Subscriber> PublishSubscriber for T {}

//! NATS-backed event stream.
//!
//! Core NATS pub/sub (no persistent stream): topics map directly to
//! subjects, and envelopes are JSON-encoded [`Message`]s.

use crate::message::Message;
use crate::pubsub::{MessageHandler, PubSubError, Publisher, Subscriber};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Configuration for the NATS transport.
#[derive(Debug, Clone)]
pub struct NatsConfig {
    /// NATS server URL.
    pub url: String,
}

impl NatsConfig {
    /// Creates a config pointing at the given server.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// NATS-backed transport.
pub struct NatsPubSub {
    client: async_nats::Client,
}

impl NatsPubSub {
    /// Connects to the configured server.
    ///
    /// # Errors
    ///
    /// Returns [`PubSubError::ConnectionFailed`] when the connection cannot
    /// be established.
    pub async fn connect(config: &NatsConfig) -> Result<Self, PubSubError> {
        let client = async_nats::connect(&config.url).await.map_err(|e| {
            PubSubError::ConnectionFailed {
                message: e.to_string(),
            }
        })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Publisher for NatsPubSub {
    async fn publish(&self, topic: &str, message: Message) -> Result<(), PubSubError> {
        let bytes = message
            .to_json_bytes()
            .map_err(|e| PubSubError::PublishFailed {
                message: format!("failed to serialize message: {e}"),
            })?;

        self.client
            .publish(topic.to_string(), bytes.into())
            .await
            .map_err(|e| PubSubError::PublishFailed {
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl Subscriber for NatsPubSub {
    async fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
        cancel: CancellationToken,
    ) -> Result<(), PubSubError> {
        let mut subscription = self.client.subscribe(topic.to_string()).await.map_err(|e| {
            PubSubError::SubscribeFailed {
                message: e.to_string(),
            }
        })?;

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                received = subscription.next() => match received {
                    None => return Ok(()),
                    Some(nats_message) => {
                        match Message::from_json_bytes(&nats_message.payload) {
                            Ok(message) => {
                                if let Err(err) = handler.handle(message).await {
                                    tracing::error!(topic, error = %err, "error handling message");
                                }
                            }
                            Err(err) => {
                                tracing::warn!(topic, error = %err, "discarding undecodable envelope");
                            }
                        }
                    }
                },
            }
        }

        subscription
            .unsubscribe()
            .await
            .map_err(|e| PubSubError::SubscribeFailed {
                message: format!("failed to unsubscribe: {e}"),
            })
    }
}

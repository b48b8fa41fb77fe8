//! In-memory event stream, for development and tests.

use crate::message::Message;
use crate::pubsub::{MessageHandler, PubSubError, Publisher, Subscriber};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

const TOPIC_CAPACITY: usize = 256;

/// In-memory transport over per-topic broadcast channels.
///
/// Clones share topics, so every subscriber in the process sees every
/// publish, matching the fan-out of a real broker.
#[derive(Debug, Clone, Default)]
pub struct MemoryPubSub {
    topics: Arc<Mutex<HashMap<String, broadcast::Sender<Message>>>>,
}

impl MemoryPubSub {
    /// Creates an empty transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn topic(&self, name: &str) -> broadcast::Sender<Message> {
        self.topics
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .clone()
    }
}

#[async_trait]
impl Publisher for MemoryPubSub {
    async fn publish(&self, topic: &str, message: Message) -> Result<(), PubSubError> {
        // A publish with no live subscribers is dropped, as on a real broker
        // without a persistent stream.
        let _ = self.topic(topic).send(message);
        Ok(())
    }
}

#[async_trait]
impl Subscriber for MemoryPubSub {
    async fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
        cancel: CancellationToken,
    ) -> Result<(), PubSubError> {
        let mut rx = self.topic(topic).subscribe();

        loop {
            tokio::select! {
                () = cancel.cancelled() => return Ok(()),
                received = rx.recv() => match received {
                    Ok(message) => {
                        if let Err(err) = handler.handle(message).await {
                            tracing::error!(topic, error = %err, "error handling message");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(topic, skipped, "subscriber lagged; messages dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => return Ok(()),
                },
            }
        }
    }
}

//! In-memory queue, for development and tests.

use crate::item::Item;
use crate::queue::{Consumer, ItemHandler, Producer, QueueError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

/// In-memory queue over an unbounded channel.
///
/// Items with a future `not_before` are held by a timer task and sent when
/// due. Clones share the same channel, so one consumer drains items from
/// every producer in the process.
#[derive(Debug, Clone)]
pub struct MemoryQueue {
    tx: mpsc::UnboundedSender<Item>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Item>>>,
}

impl MemoryQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Producer for MemoryQueue {
    async fn enqueue(&self, item: Item, not_before: DateTime<Utc>) -> Result<(), QueueError> {
        let delay = (not_before - Utc::now()).to_std().ok();

        match delay {
            Some(delay) if !delay.is_zero() => {
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    // The queue may have shut down while we slept.
                    let _ = tx.send(item);
                });
                Ok(())
            }
            _ => self.tx.send(item).map_err(|_| QueueError::Closed),
        }
    }
}

#[async_trait]
impl Consumer for MemoryQueue {
    async fn run(
        &self,
        handler: Arc<dyn ItemHandler>,
        cancel: CancellationToken,
    ) -> Result<(), QueueError> {
        let mut rx = self.rx.lock().await;

        loop {
            tokio::select! {
                () = cancel.cancelled() => return Ok(()),
                item = rx.recv() => match item {
                    None => return Ok(()),
                    Some(item) => {
                        if let Err(err) = handler.handle(item).await {
                            tracing::error!(error = %err, "error handling queue item");
                        }
                    }
                },
            }
        }
    }
}

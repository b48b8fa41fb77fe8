//! Event stream messages.

use amber_relay_core::{EVENT_RECEIVED, Event};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An envelope on the event stream.
///
/// `name` routes the envelope (the runner only accepts
/// [`EVENT_RECEIVED`]); `data` is the JSON-encoded payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Envelope name.
    pub name: String,
    /// JSON-encoded payload.
    pub data: String,
    /// When the envelope was published.
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Wraps an event in a received-event envelope.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be serialized.
    pub fn received_event(event: &Event) -> Result<Self, serde_json::Error> {
        Ok(Self {
            name: EVENT_RECEIVED.to_string(),
            data: serde_json::to_string(event)?,
            timestamp: Utc::now(),
        })
    }

    /// Serializes the envelope for the wire.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserializes an envelope from the wire.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

//! The external event type.
//!
//! Events are the unit of ingress for the whole system: the event API accepts
//! them over HTTP, the runner receives them from the event stream, and guard
//! expressions are evaluated against their map form.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The pub/sub message name under which received events are forwarded to the
/// runner. Envelopes with any other name are rejected.
pub const EVENT_RECEIVED: &str = "event/event.received";

/// The synthetic event name used for cron-scheduled function invocations.
pub const SCHEDULED_TIMER: &str = "relay/scheduled.timer";

/// An external event.
///
/// `id` doubles as the idempotency key for any runs the event initializes:
/// re-delivering an event with the same ID will not create duplicate runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Caller-assigned unique ID for deduplication.
    #[serde(default)]
    pub id: String,
    /// The event name, e.g. `"billing/invoice.paid"`.
    pub name: String,
    /// Arbitrary event payload.
    #[serde(default)]
    pub data: Map<String, Value>,
    /// Information about the user that generated the event.
    #[serde(default)]
    pub user: Map<String, Value>,
    /// Unix millisecond timestamp of the event.
    #[serde(default)]
    pub ts: i64,
    /// Event schema version.
    #[serde(default)]
    pub version: String,
}

impl Event {
    /// Creates a bare event with only a name, as used for scheduled timers.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Projects the event into the JSON map bound as `event` in guard
    /// expressions.
    #[must_use]
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("name".to_string(), Value::String(self.name.clone()));
        map.insert("data".to_string(), Value::Object(self.data.clone()));
        map.insert("user".to_string(), Value::Object(self.user.clone()));
        map.insert("id".to_string(), Value::String(self.id.clone()));
        map.insert("ts".to_string(), Value::from(self.ts));
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_map_form_binds_expected_keys() {
        let mut data = Map::new();
        data.insert("x".to_string(), json!(1));
        let event = Event {
            id: "evt_1".to_string(),
            name: "test".to_string(),
            data,
            ts: 1234,
            ..Event::default()
        };

        let map = event.to_map();
        assert_eq!(map["name"], json!("test"));
        assert_eq!(map["data"], json!({"x": 1}));
        assert_eq!(map["id"], json!("evt_1"));
        assert_eq!(map["ts"], json!(1234));
    }

    #[test]
    fn event_deserializes_with_only_a_name() {
        let event: Event = serde_json::from_str(r#"{"name": "t"}"#).expect("deserialize");
        assert_eq!(event.name, "t");
        assert!(event.id.is_empty());
        assert!(event.data.is_empty());
    }

    #[test]
    fn named_event_has_empty_payload() {
        let event = Event::named(SCHEDULED_TIMER);
        assert_eq!(event.name, SCHEDULED_TIMER);
        assert!(event.data.is_empty());
        assert!(event.id.is_empty());
    }
}

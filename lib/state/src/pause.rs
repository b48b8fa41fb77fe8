//! Persisted suspension points.
//!
//! A pause represents a halted async edge: the outgoing step has completed
//! and the run waits for a correlated event (or the TTL) before the incoming
//! step becomes eligible. Pauses are leased before resumption so that only
//! one of many concurrent runners enqueues the continuation.

use crate::identifier::Identifier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// How long a pause lease is held.
///
/// Long enough for the leasing runner to enqueue the continuation, short
/// enough that a crashed runner does not block resumption indefinitely.
pub const PAUSE_LEASE_DURATION: Duration = Duration::from_secs(5);

/// A persisted suspension point for an outstanding async edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pause {
    /// Unique pause ID.
    pub id: Uuid,
    /// The run this pause belongs to.
    pub identifier: Identifier,
    /// The step whose completion opened this pause.
    pub outgoing: String,
    /// The step that runs when the pause resolves.
    pub incoming: String,
    /// When the pause stops matching events; after this instant the timeout
    /// path owns it.
    pub expires: DateTime<Utc>,
    /// The event that resolves this pause.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    /// Guard evaluated against the run's edge data plus the `async` event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    /// When true the edge continues on TTL expiry, not on event arrival.
    #[serde(default)]
    pub on_timeout: bool,
    /// Lease expiry; while in the future, another runner owns resumption.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leased_until: Option<DateTime<Utc>>,
}

impl Pause {
    /// Returns true once the pause can no longer be resolved by an event.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires < now
    }

    /// Returns true while another caller holds the resumption lease.
    #[must_use]
    pub fn is_leased(&self, now: DateTime<Utc>) -> bool {
        self.leased_until.is_some_and(|until| now < until)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amber_relay_core::RunId;
    use chrono::TimeDelta;

    fn pause(expires: DateTime<Utc>) -> Pause {
        Pause {
            id: Uuid::new_v4(),
            identifier: Identifier {
                workflow_id: Uuid::new_v4(),
                run_id: RunId::new(),
                key: String::new(),
            },
            outgoing: "1".to_string(),
            incoming: "2".to_string(),
            expires,
            event: Some("async/continue".to_string()),
            expression: None,
            on_timeout: false,
            leased_until: None,
        }
    }

    #[test]
    fn expiry_is_strict() {
        let now = Utc::now();
        assert!(pause(now - TimeDelta::seconds(1)).is_expired(now));
        assert!(!pause(now + TimeDelta::seconds(1)).is_expired(now));
    }

    #[test]
    fn lease_windows_are_half_open() {
        let now = Utc::now();
        let mut p = pause(now + TimeDelta::minutes(5));
        assert!(!p.is_leased(now));

        p.leased_until = Some(now + TimeDelta::seconds(5));
        assert!(p.is_leased(now));

        p.leased_until = Some(now - TimeDelta::seconds(1));
        assert!(!p.is_leased(now));
    }
}

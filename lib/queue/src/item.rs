//! Queue work items.
//!
//! An item names a run and the work to perform against it: execute an edge,
//! or resolve a pause whose TTL has elapsed. Items are the only coupling
//! between the runner (producer) and the executor (consumer).

use amber_relay_state::Identifier;
use amber_relay_workflow::Edge;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of work an item represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    /// Execute the edge named in the payload.
    Edge,
    /// Resolve a pause whose TTL has elapsed.
    Pause,
}

/// Payload for [`Kind::Edge`] items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadEdge {
    /// The edge to execute; its `incoming` step is what runs.
    pub edge: Edge,
}

/// Payload for [`Kind::Pause`] items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadPauseTimeout {
    /// The pause whose TTL has elapsed.
    pub pause_id: Uuid,
}

/// The payload of a work item, matching its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Edge(PayloadEdge),
    PauseTimeout(PayloadPauseTimeout),
}

/// A unit of work for the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// What to do.
    pub kind: Kind,
    /// The run to do it to.
    pub identifier: Identifier,
    /// Kind-specific payload.
    pub payload: Payload,
    /// How many times this item has already been attempted.
    #[serde(default)]
    pub attempt: u32,
}

impl Item {
    /// An item that executes the given edge.
    #[must_use]
    pub fn edge(identifier: Identifier, edge: Edge) -> Self {
        Self {
            kind: Kind::Edge,
            identifier,
            payload: Payload::Edge(PayloadEdge { edge }),
            attempt: 0,
        }
    }

    /// An item that resolves a pause after its TTL.
    #[must_use]
    pub fn pause_timeout(identifier: Identifier, pause_id: Uuid) -> Self {
        Self {
            kind: Kind::Pause,
            identifier,
            payload: Payload::PauseTimeout(PayloadPauseTimeout { pause_id }),
            attempt: 0,
        }
    }

    /// The same work, one attempt later.
    #[must_use]
    pub fn retried(mut self) -> Self {
        self.attempt += 1;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn identifier() -> Identifier {
        Identifier::new(Uuid::new_v4(), "evt_1")
    }

    #[test]
    fn edge_item_carries_the_incoming_step() {
        let item = Item::edge(identifier(), Edge::between("1", "2"));
        assert_eq!(item.kind, Kind::Edge);
        match &item.payload {
            Payload::Edge(p) => assert_eq!(p.edge.incoming, "2"),
            Payload::PauseTimeout(_) => panic!("expected edge payload"),
        }
    }

    #[test]
    fn retried_increments_attempt() {
        let item = Item::edge(identifier(), Edge::source());
        assert_eq!(item.attempt, 0);
        assert_eq!(item.retried().retried().attempt, 2);
    }

    #[test]
    fn item_serde_roundtrip() {
        let item = Item::pause_timeout(identifier(), Uuid::new_v4());
        let json = serde_json::to_string(&item).expect("serialize");
        let parsed: Item = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(item, parsed);
    }
}

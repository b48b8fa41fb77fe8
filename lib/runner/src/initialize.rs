//! Run initialization.
//!
//! The single path through which every run begins, shared by the event
//! dispatcher and the cron scheduler: compile the function, allocate an
//! identifier, store initial state, and enqueue the source edge.

use crate::error::RunnerError;
use amber_relay_core::Event;
use amber_relay_queue::{Item, Producer};
use amber_relay_state::{Identifier, StateManager};
use amber_relay_workflow::{Edge, Function};
use chrono::Utc;

/// Creates a new run for the given function and event.
///
/// The identifier's key is the event ID, so re-delivered events (and
/// concurrent cron firings sharing a synthetic ID) collapse into one run via
/// [`StateError::IdentifierExists`](amber_relay_state::StateError).
///
/// # Errors
///
/// Propagates workflow compilation, state, and queue errors. An
/// `IdentifierExists` state error means another caller already initialized
/// this run; callers racing on schedules treat it as success.
pub async fn initialize(
    function: &Function,
    event: &Event,
    state: &dyn StateManager,
    queue: &dyn Producer,
) -> Result<Identifier, RunnerError> {
    let flow = function.workflow()?;

    let id = Identifier::new(flow.uuid, event.id.clone());
    state.new_run(flow, id.clone(), event.to_map()).await?;

    tracing::debug!(function = %function.id, run = %id, "initialized run");

    queue
        .enqueue(Item::edge(id.clone(), Edge::source()), Utc::now())
        .await?;

    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use amber_relay_queue::MemoryQueue;
    use amber_relay_state::{MemoryStateManager, StateError};
    use amber_relay_workflow::{EventTrigger, RuntimeConfig, StepDef, TRIGGER_NAME, Trigger};
    use std::collections::BTreeMap;

    fn function() -> Function {
        let mut steps = BTreeMap::new();
        steps.insert(
            "1".to_string(),
            StepDef {
                id: "1".to_string(),
                name: String::new(),
                runtime: RuntimeConfig::Mock,
                after: Vec::new(),
            },
        );
        Function {
            id: "test".to_string(),
            name: "test".to_string(),
            uuid: None,
            triggers: vec![Trigger::Event(EventTrigger {
                event: "test-evt".to_string(),
                expression: None,
            })],
            steps,
        }
    }

    fn event(id: &str) -> Event {
        Event {
            id: id.to_string(),
            ..Event::named("test-evt")
        }
    }

    #[tokio::test]
    async fn initialize_stores_state_and_enqueues_the_source_edge() {
        let state = MemoryStateManager::new();
        let queue = MemoryQueue::new();

        let id = initialize(&function(), &event("evt_1"), &state, &queue)
            .await
            .unwrap();

        let run = state.load(&id).await.unwrap();
        assert_eq!(run.metadata.pending, 1);
        assert_eq!(run.workflow.uuid, function().deterministic_uuid());
        assert_eq!(run.event["name"], serde_json::json!("test-evt"));
        assert_eq!(id.key, "evt_1");
    }

    #[tokio::test]
    async fn duplicate_initialization_reports_identifier_exists() {
        let state = MemoryStateManager::new();
        let queue = MemoryQueue::new();

        initialize(&function(), &event("evt_1"), &state, &queue)
            .await
            .unwrap();
        let err = initialize(&function(), &event("evt_1"), &state, &queue)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RunnerError::State(StateError::IdentifierExists { .. })
        ));
    }

    #[tokio::test]
    async fn distinct_events_initialize_distinct_runs() {
        let state = MemoryStateManager::new();
        let queue = MemoryQueue::new();

        let a = initialize(&function(), &event("evt_1"), &state, &queue)
            .await
            .unwrap();
        let b = initialize(&function(), &event("evt_2"), &state, &queue)
            .await
            .unwrap();
        assert_ne!(a.idempotency_key(), b.idempotency_key());
    }

    #[tokio::test]
    async fn source_edge_names_the_trigger() {
        let edge = Edge::source();
        assert_eq!(edge.incoming, TRIGGER_NAME);
        assert!(edge.outgoing.is_empty());
    }
}

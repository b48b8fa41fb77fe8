//! In-memory state manager, for development and tests.
//!
//! A single reader/writer lock guards both the run and pause maps; no lock is
//! held across an await point. Returned snapshots are deep clones, so
//! mutations after a load never show through previously returned state.

use crate::identifier::Identifier;
use crate::manager::{PauseIterator, RunMetadata, RunState, StateError, StateManager};
use crate::pause::{PAUSE_LEASE_DURATION, Pause};
use crate::response::DriverResponse;
use amber_relay_workflow::Workflow;
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Shared {
    runs: HashMap<String, RunState>,
    pauses: HashMap<Uuid, Pause>,
}

/// In-memory [`StateManager`].
///
/// Cheap to clone; clones share the same backing maps, mirroring how every
/// runner process shares one persistent store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateManager {
    shared: Arc<RwLock<Shared>>,
}

impl MemoryStateManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateManager for MemoryStateManager {
    async fn new_run(
        &self,
        workflow: Workflow,
        id: Identifier,
        event: Map<String, Value>,
    ) -> Result<RunState, StateError> {
        let key = id.idempotency_key();
        let mut shared = self.shared.write();

        if shared.runs.contains_key(&key) {
            return Err(StateError::IdentifierExists { key });
        }

        let state = RunState {
            identifier: id,
            metadata: RunMetadata {
                started_at: Utc::now(),
                pending: 1,
            },
            workflow,
            event,
            actions: HashMap::new(),
            errors: HashMap::new(),
        };
        shared.runs.insert(key, state.clone());
        Ok(state)
    }

    async fn load(&self, id: &Identifier) -> Result<RunState, StateError> {
        let key = id.idempotency_key();
        self.shared
            .read()
            .runs
            .get(&key)
            .cloned()
            .ok_or(StateError::RunNotFound { key })
    }

    async fn is_complete(&self, id: &Identifier) -> Result<bool, StateError> {
        self.load(id).await.map(|state| state.is_complete())
    }

    async fn scheduled(&self, id: &Identifier, _step_id: &str) -> Result<(), StateError> {
        let key = id.idempotency_key();
        let mut shared = self.shared.write();
        let state = shared
            .runs
            .get_mut(&key)
            .ok_or(StateError::RunNotFound { key })?;
        state.metadata.pending += 1;
        Ok(())
    }

    async fn finalized(&self, id: &Identifier, _step_id: &str) -> Result<(), StateError> {
        let key = id.idempotency_key();
        let mut shared = self.shared.write();
        let state = shared
            .runs
            .get_mut(&key)
            .ok_or(StateError::RunNotFound { key })?;
        state.metadata.pending = state.metadata.pending.saturating_sub(1);
        Ok(())
    }

    async fn save_response(
        &self,
        id: &Identifier,
        response: DriverResponse,
        _attempt: u32,
    ) -> Result<RunState, StateError> {
        let key = id.idempotency_key();
        let mut shared = self.shared.write();
        let state = shared
            .runs
            .get_mut(&key)
            .ok_or(StateError::RunNotFound { key })?;

        match &response.err {
            None => {
                state
                    .actions
                    .insert(response.step.id.clone(), response.output.clone());
                state.errors.remove(&response.step.id);
            }
            Some(err) => {
                state.errors.insert(response.step.id.clone(), err.clone());
            }
        }

        if response.is_final() {
            state.metadata.pending = state.metadata.pending.saturating_sub(1);
        }

        Ok(state.clone())
    }

    async fn save_pause(&self, pause: Pause) -> Result<(), StateError> {
        let mut shared = self.shared.write();
        if shared.pauses.contains_key(&pause.id) {
            return Err(StateError::PauseExists { id: pause.id });
        }
        shared.pauses.insert(pause.id, pause);
        Ok(())
    }

    async fn lease_pause(&self, id: Uuid) -> Result<(), StateError> {
        let now = Utc::now();
        let mut shared = self.shared.write();

        let pause = shared
            .pauses
            .get_mut(&id)
            .ok_or(StateError::PauseNotFound)?;
        if pause.is_expired(now) {
            return Err(StateError::PauseNotFound);
        }
        if pause.is_leased(now) {
            return Err(StateError::PauseLeased);
        }

        let lease = TimeDelta::from_std(PAUSE_LEASE_DURATION).unwrap_or(TimeDelta::seconds(5));
        pause.leased_until = Some(now + lease);
        Ok(())
    }

    async fn consume_pause(&self, id: Uuid) -> Result<(), StateError> {
        self.shared
            .write()
            .pauses
            .remove(&id)
            .map(|_| ())
            .ok_or(StateError::PauseNotFound)
    }

    async fn pauses_by_event(
        &self,
        event_name: &str,
    ) -> Result<Box<dyn PauseIterator>, StateError> {
        let matching = self
            .shared
            .read()
            .pauses
            .values()
            .filter(|p| p.event.as_deref() == Some(event_name))
            .cloned()
            .collect();

        Ok(Box::new(MemoryPauseIterator {
            remaining: matching,
            current: None,
            shared: Arc::clone(&self.shared),
        }))
    }

    async fn pause_by_step(&self, id: &Identifier, step_id: &str) -> Result<Pause, StateError> {
        self.shared
            .read()
            .pauses
            .values()
            .find(|p| p.identifier.run_id == id.run_id && p.outgoing == step_id)
            .cloned()
            .ok_or(StateError::PauseNotFound)
    }

    async fn pause_by_id(&self, id: Uuid) -> Result<Pause, StateError> {
        self.shared
            .read()
            .pauses
            .get(&id)
            .cloned()
            .ok_or(StateError::PauseNotFound)
    }
}

/// Iterator over a snapshot of matching pauses.
///
/// `val` re-checks the store so entries consumed after the snapshot was taken
/// read as absent, which consumers must tolerate.
struct MemoryPauseIterator {
    remaining: VecDeque<Pause>,
    current: Option<Pause>,
    shared: Arc<RwLock<Shared>>,
}

#[async_trait]
impl PauseIterator for MemoryPauseIterator {
    async fn next(&mut self) -> bool {
        self.current = self.remaining.pop_front();
        self.current.is_some()
    }

    fn val(&self) -> Option<Pause> {
        let current = self.current.as_ref()?;
        let shared = self.shared.read();
        shared.pauses.get(&current.id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amber_relay_workflow::{Edge, RuntimeConfig, Step, TRIGGER_NAME};
    use serde_json::json;

    fn workflow() -> Workflow {
        Workflow {
            uuid: Uuid::new_v4(),
            name: "test".to_string(),
            steps: vec![Step {
                id: "1".to_string(),
                name: String::new(),
                runtime: RuntimeConfig::Mock,
            }],
            edges: vec![Edge::between(TRIGGER_NAME, "1")],
        }
    }

    fn identifier(workflow: &Workflow, key: &str) -> Identifier {
        Identifier::new(workflow.uuid, key)
    }

    fn step(id: &str) -> Step {
        Step {
            id: id.to_string(),
            name: String::new(),
            runtime: RuntimeConfig::Mock,
        }
    }

    fn pause(event: &str, expires_in: TimeDelta) -> Pause {
        let flow = workflow();
        Pause {
            id: Uuid::new_v4(),
            identifier: identifier(&flow, ""),
            outgoing: TRIGGER_NAME.to_string(),
            incoming: "1".to_string(),
            expires: Utc::now() + expires_in,
            event: Some(event.to_string()),
            expression: None,
            on_timeout: false,
            leased_until: None,
        }
    }

    async fn new_run(sm: &MemoryStateManager, key: &str) -> Identifier {
        let flow = workflow();
        let id = identifier(&flow, key);
        sm.new_run(flow, id.clone(), Map::new()).await.unwrap();
        id
    }

    #[tokio::test]
    async fn new_run_starts_with_pending_one() {
        let sm = MemoryStateManager::new();
        let id = new_run(&sm, "evt_1").await;

        let state = sm.load(&id).await.unwrap();
        assert_eq!(state.metadata.pending, 1);
        assert!(state.actions.is_empty());
        assert!(state.errors.is_empty());
        assert!(!sm.is_complete(&id).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_identifier_is_rejected() {
        let sm = MemoryStateManager::new();
        let flow = workflow();
        let first = identifier(&flow, "evt_1");
        sm.new_run(flow.clone(), first.clone(), Map::new())
            .await
            .unwrap();

        // A distinct run ID with the same key still collides.
        let second = identifier(&flow, "evt_1");
        let err = sm.new_run(flow, second, Map::new()).await.unwrap_err();
        assert!(matches!(err, StateError::IdentifierExists { .. }));

        // The original run is untouched.
        let state = sm.load(&first).await.unwrap();
        assert_eq!(state.identifier.run_id, first.run_id);
    }

    #[tokio::test]
    async fn load_unknown_run_fails() {
        let sm = MemoryStateManager::new();
        let flow = workflow();
        let id = identifier(&flow, "missing");
        assert!(matches!(
            sm.load(&id).await,
            Err(StateError::RunNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn scheduled_and_finalized_balance_pending() {
        let sm = MemoryStateManager::new();
        let id = new_run(&sm, "evt_1").await;

        sm.scheduled(&id, "1").await.unwrap();
        assert_eq!(sm.load(&id).await.unwrap().metadata.pending, 2);

        sm.finalized(&id, "1").await.unwrap();
        sm.finalized(&id, TRIGGER_NAME).await.unwrap();
        assert_eq!(sm.load(&id).await.unwrap().metadata.pending, 0);
        assert!(sm.is_complete(&id).await.unwrap());
    }

    #[tokio::test]
    async fn pending_never_goes_negative() {
        let sm = MemoryStateManager::new();
        let id = new_run(&sm, "evt_1").await;

        sm.finalized(&id, "1").await.unwrap();
        sm.finalized(&id, "1").await.unwrap();
        assert_eq!(sm.load(&id).await.unwrap().metadata.pending, 0);
    }

    #[tokio::test]
    async fn save_response_success_sets_action_and_clears_error() {
        let sm = MemoryStateManager::new();
        let id = new_run(&sm, "evt_1").await;

        let failure = DriverResponse::error(step("1"), "boom");
        sm.save_response(&id, failure, 0).await.unwrap();
        assert_eq!(
            sm.load(&id).await.unwrap().errors.get("1"),
            Some(&"boom".to_string())
        );

        let mut output = Map::new();
        output.insert("id".to_string(), json!(1));
        let success = DriverResponse::output(step("1"), output.clone());
        let state = sm.save_response(&id, success, 1).await.unwrap();
        assert_eq!(state.actions.get("1"), Some(&output));
        assert!(state.errors.is_empty());
    }

    #[tokio::test]
    async fn save_response_failure_preserves_prior_output() {
        let sm = MemoryStateManager::new();
        let id = new_run(&sm, "evt_1").await;

        let mut output = Map::new();
        output.insert("id".to_string(), json!(1));
        sm.save_response(&id, DriverResponse::output(step("1"), output.clone()), 0)
            .await
            .unwrap();

        let state = sm
            .save_response(&id, DriverResponse::error(step("1"), "boom"), 1)
            .await
            .unwrap();
        assert_eq!(state.actions.get("1"), Some(&output));
        assert_eq!(state.errors.get("1"), Some(&"boom".to_string()));
    }

    #[tokio::test]
    async fn final_response_decrements_pending() {
        let sm = MemoryStateManager::new();
        let id = new_run(&sm, "evt_1").await;

        // 404 is not retryable, so the response is final.
        let mut output = Map::new();
        output.insert("status".to_string(), json!(404));
        let response = DriverResponse::error(step("1"), "boom").with_output(output);
        let state = sm.save_response(&id, response, 0).await.unwrap();
        assert_eq!(state.metadata.pending, 0);
    }

    #[tokio::test]
    async fn non_final_response_leaves_pending() {
        let sm = MemoryStateManager::new();
        let id = new_run(&sm, "evt_1").await;

        let state = sm
            .save_response(&id, DriverResponse::output(step("1"), Map::new()), 0)
            .await
            .unwrap();
        assert_eq!(state.metadata.pending, 1);
    }

    #[tokio::test]
    async fn snapshots_are_isolated_from_later_writes() {
        let sm = MemoryStateManager::new();
        let id = new_run(&sm, "evt_1").await;

        let before = sm.load(&id).await.unwrap();

        let mut output = Map::new();
        output.insert("id".to_string(), json!(1));
        sm.save_response(&id, DriverResponse::output(step("1"), output), 0)
            .await
            .unwrap();

        assert!(before.actions.is_empty());
        let after = sm.load(&id).await.unwrap();
        assert_eq!(after.actions.len(), 1);
    }

    #[tokio::test]
    async fn lease_is_mutually_exclusive() {
        let sm = MemoryStateManager::new();
        let p = pause("async/continue", TimeDelta::minutes(5));
        sm.save_pause(p.clone()).await.unwrap();

        sm.lease_pause(p.id).await.unwrap();
        assert!(matches!(
            sm.lease_pause(p.id).await,
            Err(StateError::PauseLeased)
        ));
    }

    #[tokio::test]
    async fn concurrent_leases_admit_exactly_one() {
        let sm = MemoryStateManager::new();
        let p = pause("async/continue", TimeDelta::minutes(5));
        sm.save_pause(p.clone()).await.unwrap();

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let sm = sm.clone();
            let pause_id = p.id;
            tasks.spawn(async move { sm.lease_pause(pause_id).await.is_ok() });
        }

        let mut winners = 0;
        while let Some(result) = tasks.join_next().await {
            if result.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn leasing_expired_pause_reports_not_found() {
        let sm = MemoryStateManager::new();
        let p = pause("async/continue", TimeDelta::milliseconds(-1));
        sm.save_pause(p.clone()).await.unwrap();

        assert!(matches!(
            sm.lease_pause(p.id).await,
            Err(StateError::PauseNotFound)
        ));
    }

    #[tokio::test]
    async fn consume_is_idempotent_by_absence() {
        let sm = MemoryStateManager::new();
        let p = pause("async/continue", TimeDelta::minutes(5));
        sm.save_pause(p.clone()).await.unwrap();

        sm.consume_pause(p.id).await.unwrap();
        assert!(matches!(
            sm.consume_pause(p.id).await,
            Err(StateError::PauseNotFound)
        ));
        assert!(matches!(
            sm.lease_pause(p.id).await,
            Err(StateError::PauseNotFound)
        ));
        assert!(matches!(
            sm.pause_by_id(p.id).await,
            Err(StateError::PauseNotFound)
        ));
    }

    #[tokio::test]
    async fn duplicate_save_pause_is_rejected() {
        let sm = MemoryStateManager::new();
        let p = pause("async/continue", TimeDelta::minutes(5));
        sm.save_pause(p.clone()).await.unwrap();
        assert!(matches!(
            sm.save_pause(p).await,
            Err(StateError::PauseExists { .. })
        ));
    }

    #[tokio::test]
    async fn pauses_by_event_filters_by_name() {
        let sm = MemoryStateManager::new();
        sm.save_pause(pause("async/continue", TimeDelta::minutes(5)))
            .await
            .unwrap();
        sm.save_pause(pause("async/other", TimeDelta::minutes(5)))
            .await
            .unwrap();

        let mut iter = sm.pauses_by_event("async/continue").await.unwrap();
        let mut seen = 0;
        while iter.next().await {
            let p = iter.val().expect("pause should be live");
            assert_eq!(p.event.as_deref(), Some("async/continue"));
            seen += 1;
        }
        assert_eq!(seen, 1);
    }

    #[tokio::test]
    async fn iterator_val_tolerates_consumed_entries() {
        let sm = MemoryStateManager::new();
        let p = pause("async/continue", TimeDelta::minutes(5));
        sm.save_pause(p.clone()).await.unwrap();

        let mut iter = sm.pauses_by_event("async/continue").await.unwrap();
        assert!(iter.next().await);

        // Consumed behind the iterator's back, as a racing runner would.
        sm.consume_pause(p.id).await.unwrap();
        assert!(iter.val().is_none());
    }

    #[tokio::test]
    async fn pause_by_step_matches_run_and_outgoing() {
        let sm = MemoryStateManager::new();
        let p = pause("async/continue", TimeDelta::minutes(5));
        sm.save_pause(p.clone()).await.unwrap();

        let found = sm
            .pause_by_step(&p.identifier, TRIGGER_NAME)
            .await
            .unwrap();
        assert_eq!(found.id, p.id);

        assert!(matches!(
            sm.pause_by_step(&p.identifier, "9").await,
            Err(StateError::PauseNotFound)
        ));
    }
}

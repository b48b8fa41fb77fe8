//! Cron-scheduled function triggers.
//!
//! Every runner instance schedules crons independently; there is no leader.
//! Duplicate firings across instances are collapsed by the state manager's
//! identifier uniqueness, because each firing derives its event ID from the
//! function and the firing instant.

use crate::error::RunnerError;
use crate::initialize::initialize;
use amber_relay_core::{Event, SCHEDULED_TIMER};
use amber_relay_queue::Producer;
use amber_relay_state::{StateError, StateManager};
use amber_relay_workflow::Function;
use chrono::Utc;
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Parses a five-field cron expression (minute hour day-of-month month
/// day-of-week).
///
/// # Errors
///
/// Returns [`RunnerError::InvalidCron`] for anything else.
pub fn parse_cron(expression: &str) -> Result<Schedule, RunnerError> {
    let fields = expression.split_whitespace().count();
    if fields != 5 {
        return Err(RunnerError::InvalidCron {
            expression: expression.to_string(),
            reason: format!("expected 5 fields, got {fields}"),
        });
    }

    // The parser wants a seconds field; pin it to zero for minute granularity.
    Schedule::from_str(&format!("0 {expression}")).map_err(|e| RunnerError::InvalidCron {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}

/// Drives cron triggers for scheduled functions.
pub struct CronManager {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl CronManager {
    /// Creates a manager with no schedules.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    /// Registers a schedule for a function. Each firing initializes the
    /// function with a synthetic timer event whose ID is derived from the
    /// firing instant.
    pub fn register(
        &mut self,
        schedule: Schedule,
        function: Function,
        state: Arc<dyn StateManager>,
        queue: Arc<dyn Producer>,
    ) {
        let cancel = self.cancel.child_token();

        self.tasks.push(tokio::spawn(async move {
            loop {
                let Some(next) = schedule.upcoming(Utc).next() else {
                    return;
                };
                let delay = (next - Utc::now()).to_std().unwrap_or_default();

                tokio::select! {
                    () = cancel.cancelled() => return,
                    () = tokio::time::sleep(delay) => {}
                }

                let event = Event {
                    id: format!("{}:{}", function.id, next.timestamp()),
                    ..Event::named(SCHEDULED_TIMER)
                };

                match initialize(&function, &event, state.as_ref(), queue.as_ref()).await {
                    Ok(id) => {
                        tracing::info!(function = %function.id, run = %id, "scheduled run started");
                    }
                    Err(RunnerError::State(StateError::IdentifierExists { .. })) => {
                        // Another runner fired this instant first.
                        tracing::debug!(function = %function.id, "scheduled run already initialized");
                    }
                    Err(err) => {
                        tracing::error!(function = %function.id, error = %err, "error initializing scheduled function");
                    }
                }
            }
        }));
    }

    /// Cancels all schedules without waiting for in-flight firings.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Cancels all schedules and waits for in-flight firings to drain,
    /// bounded by `deadline`.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::TimedOutStopping`] when `deadline` fires first.
    pub async fn stop(mut self, deadline: CancellationToken) -> Result<(), RunnerError> {
        self.cancel.cancel();

        let drain = async {
            for task in self.tasks.drain(..) {
                let _ = task.await;
            }
        };

        tokio::select! {
            () = drain => Ok(()),
            () = deadline.cancelled() => Err(RunnerError::TimedOutStopping),
        }
    }
}

impl Default for CronManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_field_expressions_parse() {
        assert!(parse_cron("* * * * *").is_ok());
        assert!(parse_cron("0 7 * * 1-5").is_ok());
    }

    #[test]
    fn wrong_arity_is_rejected() {
        assert!(parse_cron("* * * *").is_err());
        assert!(parse_cron("0 0 7 * * *").is_err());
        assert!(parse_cron("not a cron").is_err());
    }

    #[test]
    fn schedules_produce_upcoming_instants() {
        let schedule = parse_cron("* * * * *").unwrap();
        let next = schedule.upcoming(Utc).next().expect("next firing");
        assert!(next > Utc::now() - chrono::TimeDelta::minutes(1));
    }

    #[tokio::test]
    async fn stop_with_no_schedules_returns_immediately() {
        let manager = CronManager::new();
        manager.stop(CancellationToken::new()).await.unwrap();
    }

    #[tokio::test]
    async fn stop_cancels_registered_schedules() {
        let mut manager = CronManager::new();
        let state: Arc<dyn StateManager> = Arc::new(amber_relay_state::MemoryStateManager::new());
        let queue: Arc<dyn Producer> = Arc::new(amber_relay_queue::MemoryQueue::new());

        let mut steps = std::collections::BTreeMap::new();
        steps.insert(
            "1".to_string(),
            amber_relay_workflow::StepDef {
                id: "1".to_string(),
                name: String::new(),
                runtime: amber_relay_workflow::RuntimeConfig::Mock,
                after: Vec::new(),
            },
        );
        let function = Function {
            id: "cron".to_string(),
            name: "cron".to_string(),
            uuid: None,
            triggers: vec![amber_relay_workflow::Trigger::Cron(
                amber_relay_workflow::CronTrigger {
                    cron: "0 0 1 1 *".to_string(),
                },
            )],
            steps,
        };

        manager.register(parse_cron("0 0 1 1 *").unwrap(), function, state, queue);
        manager.stop(CancellationToken::new()).await.unwrap();
    }
}

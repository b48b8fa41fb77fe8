//! The executor service.
//!
//! The executor drains the work queue. For each edge item it runs the named
//! step through its driver, records the response, and schedules child edges;
//! for each pause-timeout item it resolves a suspension whose TTL elapsed.
//! Pending accounting follows one rule: every scheduled edge is eventually
//! balanced by exactly one decrement, either from a final response, from
//! `finalized` after a successful fan-out, or from an abandoned pause.

use crate::driver::{Driver, MockDriver};
use crate::error::ExecutorError;
use amber_relay_config::{Config, DriverConfig};
use amber_relay_core::{BoxError, Service};
use amber_relay_expr::{DefaultEvaluator, ExpressionEvaluator};
use amber_relay_queue::{Consumer, Item, ItemHandler, Payload, Producer, Queue};
use amber_relay_state::{Pause, RunState, StateError, StateManager};
use amber_relay_workflow::{Edge, TRIGGER_NAME};
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// How many times a retryable step is attempted before it is finalized.
pub const MAX_ATTEMPTS: u32 = 3;

fn retry_backoff(attempt: u32) -> Duration {
    Duration::from_millis(200 * u64::from(attempt))
}

/// The long-lived queue consumer service.
pub struct ExecutorService {
    config: Arc<Config>,
    drivers: HashMap<String, Arc<dyn Driver>>,
    queue: Option<Arc<dyn Queue>>,
    processor: Option<Arc<Processor>>,
}

impl ExecutorService {
    /// Creates an executor over the given configuration.
    #[must_use]
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            drivers: HashMap::new(),
            queue: None,
            processor: None,
        }
    }

    /// Registers a driver ahead of `pre`, overriding any driver the
    /// configuration would construct for the same kind.
    #[must_use]
    pub fn with_driver(mut self, driver: Arc<dyn Driver>) -> Self {
        self.drivers.insert(driver.name().to_string(), driver);
        self
    }
}

#[async_trait]
impl Service for ExecutorService {
    fn name(&self) -> &'static str {
        "executor"
    }

    async fn pre(&mut self) -> Result<(), BoxError> {
        for (name, driver_config) in &self.config.execution.drivers {
            if self.drivers.contains_key(name) {
                continue;
            }
            match driver_config {
                DriverConfig::Mock => {
                    self.drivers
                        .insert(name.clone(), Arc::new(MockDriver::new()));
                }
                DriverConfig::Http { .. } | DriverConfig::Docker { .. } => {
                    return Err(ExecutorError::UnknownDriver { kind: name.clone() }.into());
                }
            }
        }

        let queue = self.config.queue.queue();
        let producer: Arc<dyn Producer> = Arc::clone(&queue) as Arc<dyn Producer>;
        self.processor = Some(Arc::new(Processor {
            state: self.config.state.manager(),
            queue: producer,
            drivers: self.drivers.clone(),
            evaluator: Arc::new(DefaultEvaluator::new()),
        }));
        self.queue = Some(queue);
        Ok(())
    }

    async fn run(&mut self, cancel: CancellationToken) -> Result<(), BoxError> {
        let (queue, processor) = match (&self.queue, &self.processor) {
            (Some(queue), Some(processor)) => (Arc::clone(queue), Arc::clone(processor)),
            _ => return Err("executor started without pre".into()),
        };

        tracing::info!("draining queue");
        queue.run(processor, cancel).await?;
        Ok(())
    }

    async fn stop(&mut self, _cancel: CancellationToken) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Per-item execution logic, shared with the queue consumer.
struct Processor {
    state: Arc<dyn StateManager>,
    queue: Arc<dyn Producer>,
    drivers: HashMap<String, Arc<dyn Driver>>,
    evaluator: Arc<dyn ExpressionEvaluator>,
}

#[async_trait]
impl ItemHandler for Processor {
    async fn handle(&self, item: Item) -> Result<(), BoxError> {
        match &item.payload {
            Payload::Edge(payload) => {
                let edge = payload.edge.clone();
                self.handle_edge(&item, &edge).await?;
            }
            Payload::PauseTimeout(payload) => {
                self.handle_pause_timeout(&item, payload.pause_id).await?;
            }
        }
        Ok(())
    }
}

impl Processor {
    fn driver(&self, kind: &str) -> Result<&Arc<dyn Driver>, ExecutorError> {
        self.drivers
            .get(kind)
            .ok_or_else(|| ExecutorError::UnknownDriver {
                kind: kind.to_string(),
            })
    }

    /// Executes an edge item: the source edge fans out the trigger's
    /// children; any other edge runs its incoming step.
    async fn handle_edge(&self, item: &Item, edge: &Edge) -> Result<(), ExecutorError> {
        let run = self.state.load(&item.identifier).await?;

        if edge.incoming == TRIGGER_NAME {
            // The run's initial pending slot belongs to the source edge.
            self.schedule_children(&run, TRIGGER_NAME).await?;
            self.state.finalized(&item.identifier, TRIGGER_NAME).await?;
            return Ok(());
        }

        let step = run
            .workflow
            .step(&edge.incoming)
            .ok_or_else(|| ExecutorError::UnknownStep {
                step: edge.incoming.clone(),
            })?
            .clone();
        let driver = self.driver(step.runtime.kind())?;

        tracing::debug!(run = %item.identifier.run_id, step = %step.id, attempt = item.attempt, "executing step");
        let mut response = driver.execute(&run, &step).await?;

        if response.err.is_some() && response.retryable() {
            if item.attempt + 1 >= MAX_ATTEMPTS {
                response.set_final();
            } else {
                self.state
                    .save_response(&item.identifier, response, item.attempt)
                    .await?;
                self.queue
                    .enqueue(
                        item.clone().retried(),
                        Utc::now() + to_delta(retry_backoff(item.attempt + 1)),
                    )
                    .await?;
                return Ok(());
            }
        }

        let is_final = response.is_final();
        let saved = self
            .state
            .save_response(&item.identifier, response, item.attempt)
            .await?;

        if !is_final {
            // Success: fan out child edges, then release this step's slot.
            self.schedule_children(&saved, &step.id).await?;
            self.state.finalized(&item.identifier, &step.id).await?;
        }

        Ok(())
    }

    /// Schedules every edge leaving `outgoing`: synchronous children are
    /// enqueued immediately, asynchronous children open a pause and a
    /// timeout item at the pause's expiry.
    async fn schedule_children(&self, run: &RunState, outgoing: &str) -> Result<(), ExecutorError> {
        let now = Utc::now();

        for edge in run.workflow.edges_from(outgoing) {
            match &edge.asynchronous {
                None => {
                    if let Some(expression) = &edge.expression
                        && !self.evaluator.evaluate(expression, &run.expression_data())?
                    {
                        continue;
                    }

                    self.state.scheduled(&run.identifier, &edge.incoming).await?;
                    self.queue
                        .enqueue(Item::edge(run.identifier.clone(), edge.clone()), now)
                        .await?;
                }
                Some(meta) => {
                    let ttl = meta.ttl()?;
                    let expires = now
                        + TimeDelta::from_std(ttl).map_err(|_| {
                            amber_relay_workflow::WorkflowError::InvalidDuration {
                                value: meta.ttl.clone(),
                            }
                        })?;

                    // Guards on async edges resolve at event arrival, so the
                    // expression travels with the pause.
                    let pause = Pause {
                        id: Uuid::new_v4(),
                        identifier: run.identifier.clone(),
                        outgoing: outgoing.to_string(),
                        incoming: edge.incoming.clone(),
                        expires,
                        event: Some(meta.event.clone()),
                        expression: edge.expression.clone(),
                        on_timeout: meta.on_timeout,
                        leased_until: None,
                    };

                    let pause_id = pause.id;
                    self.state.scheduled(&run.identifier, &edge.incoming).await?;
                    self.state.save_pause(pause).await?;
                    self.queue
                        .enqueue(Item::pause_timeout(run.identifier.clone(), pause_id), expires)
                        .await?;
                }
            }
        }

        Ok(())
    }

    /// Resolves a pause whose TTL elapsed. `on_timeout` pauses continue
    /// their edge; plain pauses are abandoned and release their slot.
    async fn handle_pause_timeout(
        &self,
        item: &Item,
        pause_id: Uuid,
    ) -> Result<(), ExecutorError> {
        let pause = match self.state.pause_by_id(pause_id).await {
            Ok(pause) => pause,
            // Already resolved by the event path.
            Err(StateError::PauseNotFound) => return Ok(()),
            Err(err) => return Err(err.into()),
        };

        if pause.is_leased(Utc::now()) {
            // A runner is resuming this pause right now; the event wins.
            return Ok(());
        }

        match self.state.consume_pause(pause_id).await {
            Ok(()) => {}
            Err(StateError::PauseNotFound) => return Ok(()),
            Err(err) => return Err(err.into()),
        }

        if pause.on_timeout {
            // The TTL elapsed without the event: run the timeout edge. The
            // pending slot transfers from the pause to the edge.
            let continuation = Edge {
                outgoing: pause.outgoing.clone(),
                incoming: pause.incoming.clone(),
                expression: None,
                asynchronous: None,
            };
            self.queue
                .enqueue(Item::edge(item.identifier.clone(), continuation), Utc::now())
                .await?;
        } else {
            // The awaited event never arrived; the edge will never run.
            self.state.finalized(&item.identifier, &pause.incoming).await?;
        }

        Ok(())
    }
}

fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or_else(|_| TimeDelta::seconds(1))
}

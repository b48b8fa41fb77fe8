//! The runner service.
//!
//! The runner is the event dispatcher: it subscribes to the event topic and,
//! for each received event, concurrently (a) initializes runs for functions
//! whose triggers match and (b) resumes runs suspended on the event. It also
//! owns cron scheduling for time-triggered functions.

use crate::cron::{CronManager, parse_cron};
use crate::error::RunnerError;
use crate::initialize::initialize;
use amber_relay_config::Config;
use amber_relay_core::{BoxError, EVENT_RECEIVED, Event, MultiError, Service};
use amber_relay_data::ExecutionLoader;
use amber_relay_expr::{DefaultEvaluator, ExpressionEvaluator};
use amber_relay_pubsub::{Message, MessageHandler, PublishSubscriber};
use amber_relay_queue::{Item, Producer};
use amber_relay_state::{StateError, StateManager};
use amber_relay_workflow::Edge;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The long-lived event dispatcher service.
pub struct RunnerService {
    config: Arc<Config>,
    loader: Arc<dyn ExecutionLoader>,
    evaluator: Arc<dyn ExpressionEvaluator>,
    dispatcher: Option<Arc<Dispatcher>>,
    pubsub: Option<Arc<dyn PublishSubscriber>>,
    cron: Option<CronManager>,
}

impl RunnerService {
    /// Creates a runner over the given configuration and function loader.
    #[must_use]
    pub fn new(config: Arc<Config>, loader: Arc<dyn ExecutionLoader>) -> Self {
        Self {
            config,
            loader,
            evaluator: Arc::new(DefaultEvaluator::new()),
            dispatcher: None,
            pubsub: None,
            cron: None,
        }
    }

    /// Overrides the guard-expression evaluator.
    #[must_use]
    pub fn with_evaluator(mut self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Builds a fresh cron scheduler from the loader's scheduled functions,
    /// replacing (and cancelling) any prior one.
    async fn initialize_crons(
        &mut self,
        state: Arc<dyn StateManager>,
        queue: Arc<dyn Producer>,
    ) -> Result<CronManager, RunnerError> {
        if let Some(prior) = self.cron.take() {
            prior.shutdown();
        }

        let mut manager = CronManager::new();
        let functions = self.loader.functions_scheduled().await?;
        tracing::debug!(functions = functions.len(), "initializing scheduled functions");

        for function in functions {
            for trigger in &function.triggers {
                let Some(cron_trigger) = trigger.as_cron() else {
                    continue;
                };
                let schedule = parse_cron(&cron_trigger.cron)?;
                manager.register(
                    schedule,
                    function.clone(),
                    Arc::clone(&state),
                    Arc::clone(&queue),
                );
            }
        }

        Ok(manager)
    }
}

#[async_trait]
impl Service for RunnerService {
    fn name(&self) -> &'static str {
        "runner"
    }

    async fn pre(&mut self) -> Result<(), BoxError> {
        let state = self.config.state.manager();
        let queue: Arc<dyn Producer> = self.config.queue.queue();
        let pubsub = self.config.event_stream.publish_subscriber().await?;

        self.dispatcher = Some(Arc::new(Dispatcher {
            loader: Arc::clone(&self.loader),
            state: Arc::clone(&state),
            queue: Arc::clone(&queue),
            evaluator: Arc::clone(&self.evaluator),
        }));
        self.pubsub = Some(pubsub);

        self.cron = Some(self.initialize_crons(state, queue).await?);
        Ok(())
    }

    async fn run(&mut self, cancel: CancellationToken) -> Result<(), BoxError> {
        let (pubsub, dispatcher) = match (&self.pubsub, &self.dispatcher) {
            (Some(pubsub), Some(dispatcher)) => (Arc::clone(pubsub), Arc::clone(dispatcher)),
            _ => return Err("runner started without pre".into()),
        };

        let topic = &self.config.event_stream.topic;
        tracing::info!(%topic, "subscribing to events");
        pubsub.subscribe(topic, dispatcher, cancel).await?;
        Ok(())
    }

    async fn stop(&mut self, cancel: CancellationToken) -> Result<(), BoxError> {
        if let Some(cron) = self.cron.take() {
            cron.stop(cancel).await?;
        }
        Ok(())
    }
}

/// Per-event dispatch logic, shared with the pub/sub subscription.
struct Dispatcher {
    loader: Arc<dyn ExecutionLoader>,
    state: Arc<dyn StateManager>,
    queue: Arc<dyn Producer>,
    evaluator: Arc<dyn ExpressionEvaluator>,
}

#[async_trait]
impl MessageHandler for Dispatcher {
    async fn handle(&self, message: Message) -> Result<(), BoxError> {
        if message.name != EVENT_RECEIVED {
            return Err(RunnerError::UnknownEventType { name: message.name }.into());
        }

        let event: Event = serde_json::from_str(&message.data)
            .map_err(|source| RunnerError::Unmarshal { source })?;

        tracing::debug!(event = %event.name, id = %event.id, "received message");

        let mut errs = MultiError::new();
        let (functions, pauses) = tokio::join!(self.functions(&event), self.pauses(&event));

        if let Err(err) = functions {
            tracing::error!(event = %event.name, error = %err, "error scheduling functions");
            errs.merge(err);
        }
        if let Err(err) = pauses {
            tracing::error!(event = %event.name, error = %err, "error consuming pauses");
            errs.push(err);
        }

        errs.into_result().map_err(Into::into)
    }
}

impl Dispatcher {
    /// Initializes runs for every function triggered by this event.
    async fn functions(&self, event: &Event) -> Result<(), MultiError> {
        let mut errs = MultiError::new();

        let functions = match self.loader.functions_by_trigger(&event.name).await {
            Ok(functions) => functions,
            Err(err) => {
                errs.push(RunnerError::Data(err));
                return errs.into_result();
            }
        };
        if functions.is_empty() {
            return Ok(());
        }

        tracing::debug!(event = %event.name, functions = functions.len(), "scheduling functions");

        // Computed once; trigger expressions may share it.
        let event_map = event.to_map();

        // Each function initializes concurrently so a slow guard expression
        // on one cannot delay the others.
        let mut tasks = tokio::task::JoinSet::new();
        for function in functions {
            let state = Arc::clone(&self.state);
            let queue = Arc::clone(&self.queue);
            let evaluator = Arc::clone(&self.evaluator);
            let event = event.clone();
            let event_map = event_map.clone();

            tasks.spawn(async move {
                let mut errs = MultiError::new();
                for trigger in &function.triggers {
                    let Some(event_trigger) = trigger.as_event() else {
                        continue;
                    };
                    if event_trigger.event != event.name {
                        continue;
                    }

                    if let Some(expression) = &event_trigger.expression {
                        let mut data = Map::new();
                        data.insert("event".to_string(), Value::Object(event_map.clone()));
                        match evaluator.evaluate(expression, &data) {
                            Err(err) => {
                                errs.push(RunnerError::Expression(err));
                                continue;
                            }
                            Ok(false) => continue,
                            Ok(true) => {}
                        }
                    }

                    // However many triggers match, the function runs at most
                    // once per event.
                    if let Err(err) =
                        initialize(&function, &event, state.as_ref(), queue.as_ref()).await
                    {
                        tracing::error!(function = %function.id, error = %err, "error initializing function");
                        errs.push(err);
                    }
                    break;
                }
                errs
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(task_errs) => errs.merge(task_errs),
                Err(err) => errs.push(format!("function task panicked: {err}")),
            }
        }

        errs.into_result()
    }

    /// Resumes runs suspended on this event.
    async fn pauses(&self, event: &Event) -> Result<(), RunnerError> {
        tracing::trace!(event = %event.name, "querying for pauses");
        let mut iter = self.state.pauses_by_event(&event.name).await?;
        let event_map = event.to_map();

        while iter.next().await {
            // Entries may have been consumed or expired while iterating.
            let Some(pause) = iter.val() else { continue };
            if pause.is_expired(Utc::now()) {
                continue;
            }

            tracing::trace!(pause = %pause.id, "handling pause");

            if let Some(expression) = &pause.expression {
                let run = self.state.load(&pause.identifier).await?;
                let mut data = run.expression_data();
                data.insert("async".to_string(), Value::Object(event_map.clone()));
                if !self.evaluator.evaluate(expression, &data)? {
                    tracing::trace!(pause = %pause.id, %expression, "expression false");
                    continue;
                }
            }

            if pause.on_timeout {
                // The awaited event arrived, so the timeout edge must never
                // fire: drop the pause and release its pending slot.
                match self.state.consume_pause(pause.id).await {
                    Ok(()) => {
                        self.state
                            .finalized(&pause.identifier, &pause.incoming)
                            .await?;
                    }
                    Err(StateError::PauseNotFound) => {}
                    Err(err) => return Err(err.into()),
                }
                continue;
            }

            // Lease so that of all runners seeing this event, only this one
            // schedules the continuation.
            match self.state.lease_pause(pause.id).await {
                Ok(()) => {}
                Err(StateError::PauseLeased) => continue,
                Err(err) => return Err(err.into()),
            }

            tracing::info!(pause = %pause.id, run = %pause.identifier.run_id, "resuming function");

            let continuation = Edge {
                outgoing: pause.outgoing.clone(),
                incoming: pause.incoming.clone(),
                expression: None,
                asynchronous: None,
            };
            self.queue
                .enqueue(
                    Item::edge(pause.identifier.clone(), continuation),
                    Utc::now(),
                )
                .await?;

            self.state.consume_pause(pause.id).await?;
        }

        Ok(())
    }
}

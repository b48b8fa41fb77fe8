//! Typed configuration, loaded via the `config` crate from environment
//! variables with a `__` separator (e.g. `EVENT_API__PORT=8288`).
//!
//! Backend sections double as factories: `state.manager()`,
//! `queue.queue()`, and `event_stream.publish_subscriber()` hand out the
//! process-wide shared backend instance, so the runner, executor, and event
//! API all observe the same state.

use amber_relay_pubsub::{MemoryPubSub, NatsConfig, NatsPubSub, PubSubError, PublishSubscriber};
use amber_relay_queue::{MemoryQueue, Queue};
use amber_relay_state::{MemoryStateManager, StateManager};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Maximum accepted event payload, 256 KiB.
pub const DEFAULT_MAX_EVENT_SIZE: usize = 256 * 1024;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Event-ingest API settings.
    #[serde(default)]
    pub event_api: EventApiConfig,

    /// Event stream transport settings.
    #[serde(default)]
    pub event_stream: EventStreamConfig,

    /// Work queue settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Run state settings.
    #[serde(default)]
    pub state: StateConfig,

    /// Executor settings.
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Function definition source settings.
    #[serde(default)]
    pub data: DataConfig,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a present variable fails to parse.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

/// Event-ingest API settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EventApiConfig {
    /// Bind address.
    #[serde(default = "default_api_addr")]
    pub addr: String,

    /// Bind port.
    #[serde(default = "default_api_port")]
    pub port: u16,

    /// Maximum accepted event payload in bytes.
    #[serde(default = "default_max_size")]
    pub max_size: usize,
}

fn default_api_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8288
}

fn default_max_size() -> usize {
    DEFAULT_MAX_EVENT_SIZE
}

impl Default for EventApiConfig {
    fn default() -> Self {
        Self {
            addr: default_api_addr(),
            port: default_api_port(),
            max_size: default_max_size(),
        }
    }
}

/// Event stream backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamBackend {
    /// In-process broadcast channels.
    #[default]
    InMemory,
    /// NATS core pub/sub.
    Nats,
}

/// Event stream transport settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EventStreamConfig {
    /// Which transport to use.
    #[serde(default)]
    pub backend: StreamBackend,

    /// The topic events are published on.
    #[serde(default = "default_topic")]
    pub topic: String,

    /// NATS server URL, for the NATS backend.
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    #[serde(skip)]
    shared: Arc<OnceLock<Arc<MemoryPubSub>>>,
}

fn default_topic() -> String {
    "events".to_string()
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

impl Default for EventStreamConfig {
    fn default() -> Self {
        Self {
            backend: StreamBackend::default(),
            topic: default_topic(),
            nats_url: default_nats_url(),
            shared: Arc::default(),
        }
    }
}

impl EventStreamConfig {
    /// Returns the configured transport.
    ///
    /// The in-memory transport is shared per config instance; the NATS
    /// transport opens a connection per caller.
    ///
    /// # Errors
    ///
    /// Returns a [`PubSubError`] when the NATS connection fails.
    pub async fn publish_subscriber(&self) -> Result<Arc<dyn PublishSubscriber>, PubSubError> {
        match self.backend {
            StreamBackend::InMemory => {
                let shared = self
                    .shared
                    .get_or_init(|| Arc::new(MemoryPubSub::new()))
                    .clone();
                Ok(shared)
            }
            StreamBackend::Nats => {
                let transport = NatsPubSub::connect(&NatsConfig::new(&self.nats_url)).await?;
                Ok(Arc::new(transport))
            }
        }
    }
}

/// Work queue backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueBackend {
    /// In-process channel queue.
    #[default]
    InMemory,
}

/// Work queue settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueueConfig {
    /// Which queue backend to use.
    #[serde(default)]
    pub backend: QueueBackend,

    #[serde(skip)]
    shared: Arc<OnceLock<Arc<MemoryQueue>>>,
}

impl QueueConfig {
    /// Returns the process-wide shared queue.
    #[must_use]
    pub fn queue(&self) -> Arc<dyn Queue> {
        match self.backend {
            QueueBackend::InMemory => self
                .shared
                .get_or_init(|| Arc::new(MemoryQueue::new()))
                .clone(),
        }
    }
}

/// Run state backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateBackend {
    /// In-process state maps.
    #[default]
    InMemory,
}

/// Run state settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StateConfig {
    /// Which state backend to use.
    #[serde(default)]
    pub backend: StateBackend,

    #[serde(skip)]
    shared: Arc<OnceLock<Arc<MemoryStateManager>>>,
}

impl StateConfig {
    /// Returns the process-wide shared state manager.
    #[must_use]
    pub fn manager(&self) -> Arc<dyn StateManager> {
        match self.backend {
            StateBackend::InMemory => self
                .shared
                .get_or_init(|| Arc::new(MemoryStateManager::new()))
                .clone(),
        }
    }
}

/// Per-driver configuration, keyed by driver kind.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "driver", rename_all = "snake_case")]
pub enum DriverConfig {
    /// HTTP driver settings.
    Http {
        /// Request timeout in seconds.
        #[serde(default = "default_http_timeout")]
        timeout_seconds: u64,
    },
    /// Docker driver settings.
    Docker {
        /// Container network name.
        #[serde(default)]
        network: Option<String>,
    },
    /// Mock driver; responses are registered programmatically.
    Mock,
}

fn default_http_timeout() -> u64 {
    30
}

/// Executor settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutionConfig {
    /// Driver configurations by name.
    #[serde(default)]
    pub drivers: HashMap<String, DriverConfig>,
}

/// Function definition source settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    /// Directory scanned for `*.json` function declarations.
    #[serde(default = "default_data_dir")]
    pub dir: String,
}

fn default_data_dir() -> String {
    ".".to_string()
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.event_api.port, 8288);
        assert_eq!(config.event_api.max_size, 256 * 1024);
        assert_eq!(config.event_stream.topic, "events");
        assert_eq!(config.event_stream.backend, StreamBackend::InMemory);
        assert_eq!(config.queue.backend, QueueBackend::InMemory);
        assert_eq!(config.state.backend, StateBackend::InMemory);
        assert!(config.execution.drivers.is_empty());
    }

    #[test]
    fn state_factory_returns_the_shared_instance() {
        let config = StateConfig::default();
        let a = config.manager();
        let b = config.manager();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn queue_factory_returns_the_shared_instance() {
        let config = QueueConfig::default();
        let a = config.queue();
        let b = config.queue();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn memory_stream_is_shared() {
        let config = EventStreamConfig::default();
        let a = config.publish_subscriber().await.unwrap();
        let b = config.publish_subscriber().await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn driver_config_is_keyed_by_kind() {
        let parsed: DriverConfig =
            serde_json::from_str(r#"{"driver": "mock"}"#).expect("deserialize");
        assert_eq!(parsed, DriverConfig::Mock);

        let parsed: DriverConfig =
            serde_json::from_str(r#"{"driver": "http", "timeout_seconds": 5}"#)
                .expect("deserialize");
        assert_eq!(
            parsed,
            DriverConfig::Http {
                timeout_seconds: 5
            }
        );
    }
}

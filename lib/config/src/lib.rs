//! Configuration surface and backend factories for the amber-relay platform.
//!
//! Every service in a process is built from one [`Config`]: the event API
//! binds from `event_api`, the runner and event API share the transport from
//! `event_stream`, and the runner and executor share the queue and state
//! manager from their sections' factories.

pub mod config;

pub use config::{
    Config, DEFAULT_MAX_EVENT_SIZE, DataConfig, DriverConfig, EventApiConfig, EventStreamConfig,
    ExecutionConfig, QueueBackend, QueueConfig, StateBackend, StateConfig, StreamBackend,
};

//! Event dispatcher service for the amber-relay platform.
//!
//! The runner receives events from the event stream and drives scheduling:
//! new runs for matching function triggers, continuations for suspended
//! runs, and cron-fired runs for scheduled functions. All state changes go
//! through the state manager; all work goes through the queue.

pub mod cron;
pub mod error;
pub mod initialize;
pub mod service;

pub use cron::{CronManager, parse_cron};
pub use error::RunnerError;
pub use initialize::initialize;
pub use service::RunnerService;

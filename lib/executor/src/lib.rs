//! Queue executor and step drivers for the amber-relay platform.
//!
//! The executor is the consuming half of the scheduling engine: it drains
//! the work queue the runner fills, selects a driver for each step by
//! runtime kind, and writes every outcome back through the state manager so
//! the pending counter balances exactly once per scheduled edge.

pub mod driver;
pub mod error;
pub mod service;

pub use driver::{Driver, DriverError, MockDriver};
pub use error::ExecutorError;
pub use service::{ExecutorService, MAX_ATTEMPTS};

//! Core domain types and service lifecycle for the amber-relay platform.
//!
//! This crate provides the foundational pieces shared by every other
//! workspace member: strongly-typed run IDs, the external [`Event`] type,
//! the [`Service`] lifecycle, and cross-task error aggregation.

pub mod error;
pub mod event;
pub mod id;
pub mod service;

pub use error::MultiError;
pub use event::{EVENT_RECEIVED, Event, SCHEDULED_TIMER};
pub use id::RunId;
pub use service::{BoxError, Service};

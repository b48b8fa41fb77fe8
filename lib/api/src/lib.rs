//! HTTP event-ingest API for the amber-relay platform.
//!
//! The only write surface of the system: callers POST events here, and the
//! API forwards them onto the event stream where every runner picks them up.

pub mod service;

pub use service::EventApiService;

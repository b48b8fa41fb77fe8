//! Run state management for the amber-relay platform.
//!
//! This crate is the correctness boundary of the orchestrator. It provides:
//!
//! - **Identifiers**: run identity and idempotency keys
//! - **Run state**: per-run metadata, step outputs, and errors
//! - **Pauses**: persisted suspension points with leases
//! - **Driver responses**: retry and finality semantics
//! - **State manager**: the contract every backend must honor, plus the
//!   in-memory reference implementation

pub mod identifier;
pub mod manager;
pub mod memory;
pub mod pause;
pub mod response;

pub use identifier::Identifier;
pub use manager::{PauseIterator, RunMetadata, RunState, StateError, StateManager};
pub use memory::MemoryStateManager;
pub use pause::{PAUSE_LEASE_DURATION, Pause};
pub use response::{ActionVersion, DriverResponse};

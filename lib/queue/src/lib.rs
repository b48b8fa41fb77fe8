//! Work queue contract and in-memory queue for the amber-relay platform.
//!
//! The queue binds the scheduling core together: the runner enqueues edge
//! items when runs start or resume, the executor enqueues child edges and
//! pause timeouts, and the executor's consumer loop drains them all.

pub mod item;
pub mod memory;
pub mod queue;

pub use item::{Item, Kind, Payload, PayloadEdge, PayloadPauseTimeout};
pub use memory::MemoryQueue;
pub use queue::{Consumer, ItemHandler, Producer, Queue, QueueError};

//! Function definition loading for the amber-relay platform.
//!
//! The runner resolves incoming events to functions through the
//! [`ExecutionLoader`] contract; the in-memory loader backs development and
//! tests.

pub mod fs;
pub mod loader;
pub mod memory;

pub use fs::{FsLoadError, load_functions};
pub use loader::{DataError, ExecutionLoader};
pub use memory::MemoryExecutionLoader;

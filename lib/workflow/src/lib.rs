//! Workflow and function definitions for the amber-relay platform.
//!
//! This crate provides:
//!
//! - **Functions**: the declarative form users author (triggers + steps)
//! - **Workflows**: the compiled, immutable step graph snapshotted into runs
//! - **Edges**: synchronous or asynchronous (event + TTL) connections
//! - **Validation**: petgraph-backed DAG checks

pub mod definition;
pub mod error;
pub mod function;

pub use definition::{
    AsyncEdgeMetadata, Edge, RuntimeConfig, Step, TRIGGER_NAME, Workflow, edge_expression_data,
};
pub use error::WorkflowError;
pub use function::{After, CronTrigger, EventTrigger, Function, StepDef, Trigger};

//! Compiled workflow graphs.
//!
//! A [`Workflow`] is the immutable, executable form of a function: a set of
//! steps plus the directed edges between them. Workflows are snapshotted into
//! run state at initialization so a run is unaffected by later edits to its
//! function.

use crate::error::WorkflowError;
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// The conventional name of the root node of every workflow graph.
///
/// The source edge's `incoming` is this sentinel; the executor interprets it
/// as "begin the graph".
pub const TRIGGER_NAME: &str = "$trigger";

/// A single executable step within a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Step ID, unique within the workflow.
    pub id: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// The runtime that executes this step.
    pub runtime: RuntimeConfig,
}

/// Runtime descriptor for a step, keyed by driver kind.
///
/// The orchestration core never looks inside a runtime's configuration; the
/// executor selects a driver by kind and hands it the step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "driver", rename_all = "snake_case")]
pub enum RuntimeConfig {
    /// Step runs via an HTTP request to a user endpoint.
    Http {
        /// Endpoint URL.
        url: String,
    },
    /// Step runs inside a container.
    Docker {
        /// Container image reference.
        image: String,
    },
    /// Step runs against a canned-response driver, for development and tests.
    Mock,
}

impl RuntimeConfig {
    /// Returns the driver kind used to select an executor driver.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Http { .. } => "http",
            Self::Docker { .. } => "docker",
            Self::Mock => "mock",
        }
    }
}

/// Async metadata attached to an edge.
///
/// The presence of this metadata makes the edge asynchronous: after the
/// outgoing step completes, the run suspends until the named event arrives or
/// the TTL elapses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsyncEdgeMetadata {
    /// The event that resumes this edge.
    pub event: String,
    /// How long the run waits for the event, e.g. `"200ms"`, `"30s"`, `"1h"`.
    pub ttl: String,
    /// When true the edge runs only if the TTL elapses *without* the event
    /// arriving; event arrival cancels the edge instead of resuming it.
    #[serde(default)]
    pub on_timeout: bool,
}

impl AsyncEdgeMetadata {
    /// Parses the TTL string into a duration.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidDuration`] when the TTL is not a
    /// number followed by one of `ms`, `s`, `m`, `h`.
    pub fn ttl(&self) -> Result<Duration, WorkflowError> {
        parse_duration(&self.ttl).ok_or_else(|| WorkflowError::InvalidDuration {
            value: self.ttl.clone(),
        })
    }
}

fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let (value, unit) = s.split_at(s.find(|c: char| c.is_ascii_alphabetic())?);
    let value: u64 = value.parse().ok()?;
    match unit {
        "ms" => Some(Duration::from_millis(value)),
        "s" => Some(Duration::from_secs(value)),
        "m" => Some(Duration::from_secs(value * 60)),
        "h" => Some(Duration::from_secs(value * 3600)),
        _ => None,
    }
}

/// A directed connection between two steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// The predecessor step ID, or [`TRIGGER_NAME`] for root edges.
    #[serde(default)]
    pub outgoing: String,
    /// The step this edge leads into.
    pub incoming: String,
    /// Guard expression; a falsy result skips the edge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    /// Async metadata; present iff the edge suspends the run.
    #[serde(default, rename = "async", skip_serializing_if = "Option::is_none")]
    pub asynchronous: Option<AsyncEdgeMetadata>,
}

impl Edge {
    /// The sentinel edge that begins a workflow graph.
    #[must_use]
    pub fn source() -> Self {
        Self {
            outgoing: String::new(),
            incoming: TRIGGER_NAME.to_string(),
            expression: None,
            asynchronous: None,
        }
    }

    /// A plain synchronous edge between two steps.
    #[must_use]
    pub fn between(outgoing: impl Into<String>, incoming: impl Into<String>) -> Self {
        Self {
            outgoing: outgoing.into(),
            incoming: incoming.into(),
            expression: None,
            asynchronous: None,
        }
    }
}

/// An immutable workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Workflow UUID; the stable half of every run identifier.
    pub uuid: Uuid,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// The steps of the graph.
    pub steps: Vec<Step>,
    /// Directed edges between steps (and from [`TRIGGER_NAME`]).
    pub edges: Vec<Edge>,
}

impl Workflow {
    /// Looks up a step by ID.
    #[must_use]
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Returns the edges leaving the given step (or [`TRIGGER_NAME`]).
    pub fn edges_from<'a>(&'a self, outgoing: &'a str) -> impl Iterator<Item = &'a Edge> {
        self.edges.iter().filter(move |e| e.outgoing == outgoing)
    }

    /// Validates the graph: edges must reference known steps and the graph
    /// must be acyclic.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::UnknownStep`] for a dangling edge endpoint
    /// and [`WorkflowError::CycleDetected`] for a cyclic graph.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        let mut graph = DiGraph::<&str, ()>::new();
        let mut indices = HashMap::new();

        indices.insert(TRIGGER_NAME, graph.add_node(TRIGGER_NAME));
        for step in &self.steps {
            indices.insert(step.id.as_str(), graph.add_node(step.id.as_str()));
        }

        for edge in &self.edges {
            let from = edge.outgoing.as_str();
            let to = edge.incoming.as_str();
            let from_idx = *indices.get(from).ok_or_else(|| WorkflowError::UnknownStep {
                step: from.to_string(),
            })?;
            let to_idx = *indices.get(to).ok_or_else(|| WorkflowError::UnknownStep {
                step: to.to_string(),
            })?;
            graph.add_edge(from_idx, to_idx, ());
        }

        if is_cyclic_directed(&graph) {
            return Err(WorkflowError::CycleDetected {
                workflow: self.uuid,
            });
        }

        Ok(())
    }
}

/// Builds the expression data exposed to edge guards: per-step outputs under
/// `steps`, plus the originating `event`. The caller adds `async` for pause
/// expressions.
#[must_use]
pub fn edge_expression_data(
    event: &Map<String, Value>,
    actions: &HashMap<String, Map<String, Value>>,
) -> Map<String, Value> {
    let mut steps = Map::new();
    for (step_id, output) in actions {
        steps.insert(step_id.clone(), Value::Object(output.clone()));
    }

    let mut data = Map::new();
    data.insert("event".to_string(), Value::Object(event.clone()));
    data.insert("steps".to_string(), Value::Object(steps));
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_step(id: &str) -> Step {
        Step {
            id: id.to_string(),
            name: id.to_string(),
            runtime: RuntimeConfig::Mock,
        }
    }

    fn chain_workflow() -> Workflow {
        Workflow {
            uuid: Uuid::new_v4(),
            name: "chain".to_string(),
            steps: vec![mock_step("1"), mock_step("2")],
            edges: vec![
                Edge::between(TRIGGER_NAME, "1"),
                Edge::between("1", "2"),
            ],
        }
    }

    #[test]
    fn edges_from_filters_by_outgoing() {
        let flow = chain_workflow();
        let from_trigger: Vec<_> = flow.edges_from(TRIGGER_NAME).collect();
        assert_eq!(from_trigger.len(), 1);
        assert_eq!(from_trigger[0].incoming, "1");
    }

    #[test]
    fn validate_accepts_acyclic_graph() {
        assert!(chain_workflow().validate().is_ok());
    }

    #[test]
    fn validate_rejects_cycle() {
        let mut flow = chain_workflow();
        flow.edges.push(Edge::between("2", "1"));
        assert!(matches!(
            flow.validate(),
            Err(WorkflowError::CycleDetected { .. })
        ));
    }

    #[test]
    fn validate_rejects_unknown_step() {
        let mut flow = chain_workflow();
        flow.edges.push(Edge::between("1", "missing"));
        assert!(matches!(
            flow.validate(),
            Err(WorkflowError::UnknownStep { step }) if step == "missing"
        ));
    }

    #[test]
    fn ttl_parsing_accepts_common_units() {
        let meta = |ttl: &str| AsyncEdgeMetadata {
            event: "e".to_string(),
            ttl: ttl.to_string(),
            on_timeout: false,
        };
        assert_eq!(meta("200ms").ttl().unwrap(), Duration::from_millis(200));
        assert_eq!(meta("30s").ttl().unwrap(), Duration::from_secs(30));
        assert_eq!(meta("5m").ttl().unwrap(), Duration::from_secs(300));
        assert_eq!(meta("2h").ttl().unwrap(), Duration::from_secs(7200));
        assert!(meta("fast").ttl().is_err());
        assert!(meta("10d").ttl().is_err());
    }

    #[test]
    fn edge_serde_omits_empty_metadata() {
        let edge = Edge::between("1", "2");
        let json = serde_json::to_value(&edge).expect("serialize");
        assert!(json.get("async").is_none());
        assert!(json.get("expression").is_none());
    }

    #[test]
    fn expression_data_nests_outputs_under_steps() {
        let mut actions = HashMap::new();
        let mut output = Map::new();
        output.insert("id".to_string(), Value::from(1));
        actions.insert("1".to_string(), output);

        let data = edge_expression_data(&Map::new(), &actions);
        assert_eq!(data["steps"]["1"]["id"], Value::from(1));
        assert!(data.contains_key("event"));
    }
}

//! User-declared functions.
//!
//! A [`Function`] is the declarative form users author: triggers plus a map
//! of steps with `after` dependencies. [`Function::workflow`] compiles it
//! into the executable [`Workflow`] graph.

use crate::definition::{
    AsyncEdgeMetadata, Edge, RuntimeConfig, Step, TRIGGER_NAME, Workflow,
};
use crate::error::WorkflowError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A trigger that starts a function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// Fire when a named event arrives, optionally guarded by an expression.
    Event(EventTrigger),
    /// Fire on a cron schedule.
    Cron(CronTrigger),
}

impl Trigger {
    /// Returns the event trigger, if this is one.
    #[must_use]
    pub fn as_event(&self) -> Option<&EventTrigger> {
        match self {
            Self::Event(t) => Some(t),
            Self::Cron(_) => None,
        }
    }

    /// Returns the cron trigger, if this is one.
    #[must_use]
    pub fn as_cron(&self) -> Option<&CronTrigger> {
        match self {
            Self::Cron(t) => Some(t),
            Self::Event(_) => None,
        }
    }
}

/// An event-name trigger with an optional guard expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTrigger {
    /// The event name to match.
    pub event: String,
    /// Guard evaluated against `{event}`; falsy skips the trigger.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

/// A cron-schedule trigger, five-field minute granularity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CronTrigger {
    /// Cron expression: minute hour day-of-month month day-of-week.
    pub cron: String,
}

/// A dependency of a step on a predecessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct After {
    /// Predecessor step ID, or [`TRIGGER_NAME`] for the graph root.
    pub step: String,
    /// Async metadata; makes the resulting edge a suspension point.
    #[serde(default, rename = "async", skip_serializing_if = "Option::is_none")]
    pub asynchronous: Option<AsyncEdgeMetadata>,
    /// Guard expression for the resulting edge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

impl After {
    /// Dependency on a plain predecessor step.
    #[must_use]
    pub fn step(id: impl Into<String>) -> Self {
        Self {
            step: id.into(),
            asynchronous: None,
            expression: None,
        }
    }
}

/// A step declaration within a function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDef {
    /// Step ID, unique within the function.
    pub id: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// The runtime that executes this step.
    pub runtime: RuntimeConfig,
    /// Predecessors; empty means the step hangs off the trigger.
    #[serde(default)]
    pub after: Vec<After>,
}

/// A user-declared function: triggers plus a step graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    /// Function slug, unique across the deployment.
    pub id: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Externally-assigned workflow UUID; zero when managed locally.
    #[serde(default)]
    pub uuid: Option<Uuid>,
    /// Triggers that start the function.
    pub triggers: Vec<Trigger>,
    /// Steps keyed by step ID.
    pub steps: BTreeMap<String, StepDef>,
}

impl Function {
    /// Validates the declaration: a non-empty slug, at least one trigger,
    /// and a compilable, acyclic step graph.
    ///
    /// # Errors
    ///
    /// Returns a [`WorkflowError`] describing the first problem found.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.id.is_empty() {
            return Err(WorkflowError::InvalidFunction {
                function: self.id.clone(),
                reason: "function id is empty".to_string(),
            });
        }
        if self.triggers.is_empty() {
            return Err(WorkflowError::InvalidFunction {
                function: self.id.clone(),
                reason: "function has no triggers".to_string(),
            });
        }
        self.workflow().map(|_| ())
    }

    /// The deterministic UUID used when no external UUID was assigned.
    ///
    /// Derived from the function slug so every process compiles the same
    /// function to the same workflow UUID, keying the same state rows.
    #[must_use]
    pub fn deterministic_uuid(&self) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, self.id.as_bytes())
    }

    /// Compiles the declaration into an executable workflow graph.
    ///
    /// Steps without `after` dependencies become children of the trigger
    /// sentinel.
    ///
    /// # Errors
    ///
    /// Returns a [`WorkflowError`] when an `after` references an unknown
    /// step or the resulting graph is cyclic.
    pub fn workflow(&self) -> Result<Workflow, WorkflowError> {
        let uuid = self.uuid.unwrap_or_else(|| self.deterministic_uuid());

        let mut steps = Vec::with_capacity(self.steps.len());
        let mut edges = Vec::new();

        for (step_id, def) in &self.steps {
            steps.push(Step {
                id: step_id.clone(),
                name: def.name.clone(),
                runtime: def.runtime.clone(),
            });

            if def.after.is_empty() {
                edges.push(Edge::between(TRIGGER_NAME, step_id.clone()));
                continue;
            }

            for after in &def.after {
                edges.push(Edge {
                    outgoing: after.step.clone(),
                    incoming: step_id.clone(),
                    expression: after.expression.clone(),
                    asynchronous: after.asynchronous.clone(),
                });
            }
        }

        let flow = Workflow {
            uuid,
            name: self.name.clone(),
            steps,
            edges,
        };
        flow.validate()?;
        Ok(flow)
    }
}

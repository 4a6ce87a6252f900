//! Lifecycle Events
//!
//! Ordered publish-subscribe for workflow and step lifecycle events.
//! Delivery is synchronous on the emitting task: handlers for one execution
//! observe events in a total order consistent with step declaration order,
//! except among concurrent children of a parallel group. Handlers must be
//! fast and non-blocking; anything heavier belongs in an action.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Emitted when an execution starts.
pub const WORKFLOW_START: &str = "workflow:start";
/// Emitted when an execution finishes successfully.
pub const WORKFLOW_COMPLETE: &str = "workflow:complete";
/// Emitted when an execution fails.
pub const WORKFLOW_ERROR: &str = "workflow:error";
/// Emitted when an execution is cancelled.
pub const WORKFLOW_CANCELLED: &str = "workflow:cancelled";
/// Emitted when a step begins.
pub const STEP_START: &str = "step:start";
/// Emitted when a step completes successfully.
pub const STEP_COMPLETE: &str = "step:complete";
/// Emitted when a step's condition evaluates false.
pub const STEP_SKIPPED: &str = "step:skipped";
/// Emitted when a step fails (before its error policy applies).
pub const STEP_ERROR: &str = "step:error";

/// A single lifecycle event.
#[derive(Serialize, Debug, Clone)]
pub struct WorkflowEvent {
    /// Event name, one of the `workflow:*` / `step:*` constants
    pub name: String,

    /// Workflow definition name
    pub workflow_id: String,

    /// Execution the event belongs to
    pub execution_id: String,

    /// Step id for `step:*` events
    pub step_id: Option<String>,

    /// Error message for failure events
    pub error: Option<String>,

    /// When the event was emitted
    pub timestamp: DateTime<Utc>,
}

impl WorkflowEvent {
    /// Creates a workflow-level event.
    pub fn workflow(name: &str, workflow_id: &str, execution_id: &str) -> Self {
        Self {
            name: name.to_string(),
            workflow_id: workflow_id.to_string(),
            execution_id: execution_id.to_string(),
            step_id: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Creates a step-level event.
    pub fn step(name: &str, workflow_id: &str, execution_id: &str, step_id: &str) -> Self {
        Self {
            step_id: Some(step_id.to_string()),
            ..Self::workflow(name, workflow_id, execution_id)
        }
    }

    /// Attaches an error message.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Handler invoked synchronously for each matching event.
pub type EventHandler = Arc<dyn Fn(&WorkflowEvent) + Send + Sync>;

/// Ordered synchronous event dispatcher.
///
/// Handlers are grouped by event name and invoked in subscription order.
/// Subscription normally happens at startup; emission happens throughout
/// every execution.
#[derive(Default)]
pub struct EventBus {
    handlers: Mutex<HashMap<String, Vec<EventHandler>>>,
}

impl EventBus {
    /// Creates a bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a handler to one event name.
    pub fn subscribe<F>(&self, event_name: impl Into<String>, handler: F)
    where
        F: Fn(&WorkflowEvent) + Send + Sync + 'static,
    {
        self.handlers
            .lock()
            .expect("event bus lock poisoned")
            .entry(event_name.into())
            .or_default()
            .push(Arc::new(handler));
    }

    /// Emits an event to every handler subscribed to its name.
    ///
    /// The handler map lock is released before any handler runs, so handlers
    /// may emit further events or call back into the engine.
    pub fn emit(&self, event: &WorkflowEvent) {
        let subscribed: Vec<EventHandler> = self
            .handlers
            .lock()
            .expect("event bus lock poisoned")
            .get(&event.name)
            .cloned()
            .unwrap_or_default();

        for handler in subscribed {
            handler(event);
        }
    }

    /// Number of handlers subscribed to an event name.
    pub fn handler_count(&self, event_name: &str) -> usize {
        self.handlers
            .lock()
            .expect("event bus lock poisoned")
            .get(event_name)
            .map_or(0, Vec::len)
    }
}

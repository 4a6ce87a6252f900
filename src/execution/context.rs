//! Execution Context
//!
//! Per-run mutable state: the trigger payload, resolved variables, ordered
//! step results, and accumulated non-fatal errors. A context is created when
//! an execution starts, mutated only by its owning run, and handed back to
//! the caller when the run finishes.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Mutable state for one workflow execution.
#[derive(Serialize, Debug, Clone)]
pub struct ExecutionContext {
    /// Name of the workflow definition being run
    pub workflow_id: String,

    /// Unique id for this run, generated at start
    pub execution_id: String,

    /// Raw trigger payload the run was started with
    pub trigger: Value,

    /// Workflow variables after template resolution
    pub variables: Map<String, Value>,

    /// Results of completed steps, keyed by step id in completion order.
    /// Append-only; written only by the owning run.
    pub step_results: IndexMap<String, Value>,

    /// When the execution started
    pub start_time: DateTime<Utc>,

    /// Id of the step currently executing
    pub current_step: Option<String>,

    /// Non-fatal failures accumulated by `onError: continue` steps, plus the
    /// final error of a failed run
    pub errors: Vec<String>,
}

impl ExecutionContext {
    /// Creates a fresh context for one run of the named workflow.
    pub fn new(workflow_id: impl Into<String>, trigger: Value) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            execution_id: Uuid::new_v4().to_string(),
            trigger,
            variables: Map::new(),
            step_results: IndexMap::new(),
            start_time: Utc::now(),
            current_step: None,
            errors: Vec::new(),
        }
    }

    /// Records a completed step's result.
    pub fn record_result(&mut self, step_id: impl Into<String>, result: Value) {
        self.step_results.insert(step_id.into(), result);
    }

    /// Records a non-fatal error.
    pub fn record_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Gets a completed step's result by id.
    pub fn step_result(&self, step_id: &str) -> Option<&Value> {
        self.step_results.get(step_id)
    }

    /// Milliseconds elapsed since the execution started.
    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.start_time).num_milliseconds()
    }

    /// Builds the template scope for resolving step params and conditions.
    ///
    /// Variables are exposed both spread at the top level (`${employee_name}`)
    /// and under a `variables` key (`${variables.employee_name}`); step
    /// results under `stepResults` and the trigger payload under `trigger`.
    pub fn step_scope(&self) -> Value {
        let mut scope = self.variables.clone();

        let results: Map<String, Value> = self
            .step_results
            .iter()
            .map(|(id, result)| (id.clone(), result.clone()))
            .collect();

        scope.insert("variables".to_string(), Value::Object(self.variables.clone()));
        scope.insert("stepResults".to_string(), Value::Object(results));
        scope.insert("trigger".to_string(), self.trigger.clone());

        Value::Object(scope)
    }

    /// Builds the template scope for resolving workflow variables, which may
    /// only reference the trigger payload.
    pub fn variable_scope(&self) -> Value {
        let mut scope = Map::new();
        scope.insert("trigger".to_string(), self.trigger.clone());
        Value::Object(scope)
    }
}

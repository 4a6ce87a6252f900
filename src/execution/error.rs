//! Engine Error Taxonomy
//!
//! Distinguishes failures that prevent execution from starting (validation),
//! failures of individual steps (missing actions, action errors, exhausted
//! retries), and cooperative cancellation. Unresolvable template placeholders
//! are deliberately not represented here; they are left verbatim and never
//! fail a run.

use thiserror::Error;

use crate::execution::action::ActionError;
use crate::execution::context::ExecutionContext;
use crate::workflow::ValidationError;

/// Errors produced while executing a workflow.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The definition failed validation; execution never started.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A step referenced an action name with no registration.
    #[error("Action not found: '{name}'")]
    ActionNotFound {
        /// The requested action name
        name: String,
    },

    /// An action failed; wraps the underlying cause with step and execution
    /// ids for diagnostics.
    #[error("Step '{step_id}' failed in execution {execution_id}: {source}")]
    StepExecution {
        step_id: String,
        execution_id: String,
        #[source]
        source: ActionError,
    },

    /// All configured retry attempts failed; carries the final attempt's
    /// error, not the first one.
    #[error("Step '{step_id}' failed after {attempts} attempts: {source}")]
    RetryExhausted {
        step_id: String,
        attempts: u32,
        #[source]
        source: Box<EngineError>,
    },

    /// The run was cancelled between steps.
    #[error("Execution {execution_id} was cancelled")]
    Cancelled { execution_id: String },
}

impl EngineError {
    /// Returns true for errors raised by cooperative cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EngineError::Cancelled { .. })
    }
}

/// A failed workflow run: the error plus the partial execution context, so
/// callers can inspect completed step results and accumulated errors without
/// re-running.
#[derive(Error, Debug)]
#[error("Workflow '{}' failed: {error}", context.workflow_id)]
pub struct ExecutionFailure {
    /// Context as of the failure point
    pub context: ExecutionContext,
    /// The unrecovered error
    #[source]
    pub error: EngineError,
}

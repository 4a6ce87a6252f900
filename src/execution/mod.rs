//! Workflow Execution Module
//!
//! Provides the core execution engine for running workflow definitions,
//! including the action registry, per-run execution contexts, the step
//! interpreter, lifecycle events, retry policies, and cancellation.
//!
//! # Architecture
//!
//! - [`engine`]: Main execution engine orchestrating workflow runs
//! - [`step`]: Individual step execution logic
//! - [`action`]: Action trait, registry, and built-in actions
//! - [`context`]: Per-run mutable execution state
//! - [`events`]: Ordered lifecycle event pub-sub
//! - [`retry`]: Backoff delay computation
//! - [`error`]: Engine error taxonomy

pub mod action;
pub mod context;
pub mod engine;
pub mod error;
pub mod events;
pub mod retry;
mod step;

pub use action::{register_builtin_actions, Action, ActionError, ActionRegistry, FnAction};
pub use context::ExecutionContext;
pub use engine::Engine;
pub use error::{EngineError, ExecutionFailure};
pub use events::{
    EventBus, WorkflowEvent, STEP_COMPLETE, STEP_ERROR, STEP_SKIPPED, STEP_START,
    WORKFLOW_CANCELLED, WORKFLOW_COMPLETE, WORKFLOW_ERROR, WORKFLOW_START,
};
pub use retry::RetryPolicy;

//! FlowRunner - Declarative Workflow Execution Engine
//!
//! Executes workflows declared as YAML definitions: named steps invoking
//! registered actions, with template-based data flow between steps, parallel
//! and sequential step groups, conditional execution, configurable retry
//! with backoff, lifecycle events, notifications, and analytics forwarding.
//!
//! # Architecture
//!
//! The library is organized into two main modules:
//!
//! - [`workflow`]: Data structures, parsing, validation, templating, and
//!   condition evaluation for workflow definitions
//! - [`execution`]: The engine, action registry, step interpreter, retry
//!   policy, lifecycle events, and per-run execution contexts
//!
//! # Example
//!
//! ```rust,no_run
//! use flowrunner::execution::Engine;
//! use flowrunner::load_definition;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Load a workflow definition from YAML
//!     let definition = load_definition("onboarding.yaml")?;
//!
//!     // Create the engine and run the workflow against a trigger payload
//!     let engine = Engine::new();
//!     let context = engine
//!         .execute(&definition, json!({"employee": {"name": "Ada"}}))
//!         .await?;
//!
//!     println!("Completed {} steps", context.step_results.len());
//!     Ok(())
//! }
//! ```

pub mod execution;
pub mod workflow;

// Re-export commonly used types
pub use execution::engine::Engine;
pub use workflow::model::{Step, WorkflowDefinition};
pub use workflow::parser::{load_definition, load_trigger};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "FlowRunner";

//! Workflow Definition Module
//!
//! Provides data structures and utilities for defining, loading, validating,
//! and templating declarative workflows.
//!
//! # Structure
//!
//! - [`model`]: Core data structures (WorkflowDefinition, Step, RetryConfig)
//! - [`parser`]: YAML loading for definitions and JSON trigger payloads
//! - [`validator`]: Pre-execution validation rules
//! - [`template`]: `${path}` placeholder resolution
//! - [`condition`]: Restricted boolean-expression evaluation for step conditions

pub mod condition;
pub mod model;
pub mod parser;
pub mod template;
pub mod validator;

pub use model::{
    ActionRef, Analytics, Backoff, ChildStep, Metadata, NotificationTarget, Notifications,
    OnError, RetryConfig, Step, Trigger, WorkflowDefinition,
};
pub use parser::{load_definition, load_trigger};
pub use validator::{validate_definition, ValidationError};

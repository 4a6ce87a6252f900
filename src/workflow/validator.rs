//! Workflow Validation
//!
//! Pre-execution validation of workflow definitions:
//! - Metadata requirements (non-empty name)
//! - Step list requirements (non-empty, unique ids including nested groups)
//! - Step shape (exactly one of action/parallel/sequential)
//! - Retry policy consistency
//!
//! Validation runs before an execution starts; a definition that fails here
//! never executes a single step.

use std::collections::HashSet;

use log::{debug, info};
use thiserror::Error;

use super::model::{ChildStep, OnError, Step, WorkflowDefinition};

/// Validation failures, raised before any step executes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Workflow must have a name")]
    MissingName,

    #[error("Workflow must have at least one step")]
    EmptyWorkflow,

    #[error("A step has an empty or whitespace-only ID")]
    EmptyStepId,

    #[error("Duplicate step ID: '{0}'")]
    DuplicateStepId(String),

    #[error("Step '{0}' must declare exactly one of action, parallel, or sequential")]
    AmbiguousStepBody(String),

    #[error("Step '{0}' declares onError: retry but has no retry configuration")]
    MissingRetryConfig(String),

    #[error("Step '{0}' has retry.attempts of 0; at least one attempt is required")]
    InvalidRetryAttempts(String),
}

/// Validates a complete workflow definition.
///
/// Checks, in order:
/// 1. `metadata.name` is non-empty
/// 2. The step list is non-empty
/// 3. Every step (including nested group children) has a non-empty, unique id
/// 4. Every step declares exactly one body
/// 5. `onError: retry` steps carry a retry block with `attempts >= 1`
pub fn validate_definition(definition: &WorkflowDefinition) -> Result<(), ValidationError> {
    info!(
        "Validating workflow '{}' with {} steps",
        definition.metadata.name,
        definition.steps.len()
    );

    if definition.metadata.name.trim().is_empty() {
        return Err(ValidationError::MissingName);
    }

    if definition.steps.is_empty() {
        return Err(ValidationError::EmptyWorkflow);
    }

    let mut seen_ids: HashSet<String> = HashSet::new();
    for step in &definition.steps {
        validate_step(step, &mut seen_ids)?;
    }

    debug!(
        "Workflow '{}' validated: {} unique step ids",
        definition.metadata.name,
        seen_ids.len()
    );
    Ok(())
}

/// Validates one step and recurses into group children.
fn validate_step(step: &Step, seen_ids: &mut HashSet<String>) -> Result<(), ValidationError> {
    if step.id.trim().is_empty() {
        return Err(ValidationError::EmptyStepId);
    }

    if !seen_ids.insert(step.id.clone()) {
        return Err(ValidationError::DuplicateStepId(step.id.clone()));
    }

    if !step.has_single_body() {
        return Err(ValidationError::AmbiguousStepBody(step.id.clone()));
    }

    if step.on_error == OnError::Retry {
        let retry = step
            .retry
            .ok_or_else(|| ValidationError::MissingRetryConfig(step.id.clone()))?;
        if retry.attempts == 0 {
            return Err(ValidationError::InvalidRetryAttempts(step.id.clone()));
        }
    }

    let children = step
        .parallel
        .iter()
        .chain(step.sequential.iter())
        .flatten();

    for child in children {
        if let ChildStep::Step(child_step) = child {
            validate_step(child_step, seen_ids)?;
        }
    }

    Ok(())
}

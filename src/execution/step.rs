//! Step Interpretation
//!
//! Executes a single workflow step through its state machine:
//! `Pending -> {Skipped | Running} -> {Completed | Failed}`, with
//! `Failed -> Retrying -> {Completed | Failed}` when the step's error policy
//! is `retry`. Handles all three step bodies (action, parallel group,
//! sequential group), condition gating, and `onError` policy.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::workflow::{condition, template, ChildStep, OnError, Step};

use super::action::ActionRegistry;
use super::context::ExecutionContext;
use super::error::EngineError;
use super::events::{
    EventBus, WorkflowEvent, STEP_COMPLETE, STEP_ERROR, STEP_SKIPPED, STEP_START,
};
use super::retry::RetryPolicy;

/// Context shared between the run's task and its parallel children.
///
/// The lock is held only for synchronous reads/writes, never across an await.
pub(crate) type SharedContext = Arc<Mutex<ExecutionContext>>;

/// Executes steps for one workflow run.
///
/// Cheap to clone; parallel groups clone it into each child task.
#[derive(Clone)]
pub(crate) struct StepRunner {
    pub registry: Arc<ActionRegistry>,
    pub events: Arc<EventBus>,
    pub workflow_id: String,
    pub execution_id: String,
}

impl StepRunner {
    /// Runs a single step to completion.
    ///
    /// Returns `Ok(Some(result))` for a completed step, `Ok(None)` for a
    /// skipped step or a failure absorbed by `onError: continue`, and `Err`
    /// for an unrecovered failure.
    pub async fn run_step(
        &self,
        step: &Step,
        ctx: &SharedContext,
    ) -> Result<Option<Value>, EngineError> {
        {
            let mut guard = ctx.lock().expect("execution context lock poisoned");
            guard.current_step = Some(step.id.clone());
        }
        self.emit_step(STEP_START, &step.id, None);

        if let Some(condition_template) = &step.condition {
            if !self.condition_holds(condition_template, ctx) {
                debug!("Step '{}' skipped (condition false)", step.id);
                self.emit_step(STEP_SKIPPED, &step.id, None);
                return Ok(None);
            }
        }

        match self.run_body(step, ctx).await {
            Ok(result) => {
                self.complete_step(step, ctx, result.clone());
                Ok(Some(result))
            }
            Err(error) => {
                self.emit_step(STEP_ERROR, &step.id, Some(error.to_string()));

                match step.on_error {
                    OnError::Abort => Err(error),
                    OnError::Continue => {
                        warn!("Step '{}' failed, continuing: {}", step.id, error);
                        ctx.lock()
                            .expect("execution context lock poisoned")
                            .record_error(error.to_string());
                        Ok(None)
                    }
                    OnError::Retry => self.retry_step(step, ctx, error).await,
                }
            }
        }
    }

    /// Resolves and evaluates a step condition.
    fn condition_holds(&self, condition_template: &str, ctx: &SharedContext) -> bool {
        let scope = ctx
            .lock()
            .expect("execution context lock poisoned")
            .step_scope();

        match template::resolve_template(condition_template, &scope) {
            // A whole-string placeholder can resolve straight to a boolean
            Value::Bool(flag) => flag,
            Value::String(expr) => condition::evaluate(&expr),
            other => condition::evaluate(&other.to_string()),
        }
    }

    /// Runs the retry loop after an initial failure.
    ///
    /// The initial failure counts as attempt 1; each retry sleeps its
    /// configured delay first. When every attempt has failed, the final
    /// attempt's error is surfaced inside `RetryExhausted`.
    async fn retry_step(
        &self,
        step: &Step,
        ctx: &SharedContext,
        first_error: EngineError,
    ) -> Result<Option<Value>, EngineError> {
        let Some(config) = step.retry else {
            // Unreachable for validated definitions
            return Err(first_error);
        };

        let policy = RetryPolicy::new(config);
        let mut last_error = first_error;

        for retry_index in 1..policy.attempts() {
            let delay = policy.delay_before(retry_index);
            warn!(
                "Step '{}' failed (attempt {}/{}), retrying in {:?}: {}",
                step.id,
                retry_index,
                policy.attempts(),
                delay,
                last_error
            );
            sleep(delay).await;

            match self.run_body(step, ctx).await {
                Ok(result) => {
                    self.complete_step(step, ctx, result.clone());
                    return Ok(Some(result));
                }
                Err(error) => {
                    self.emit_step(STEP_ERROR, &step.id, Some(error.to_string()));
                    last_error = error;
                }
            }
        }

        Err(EngineError::RetryExhausted {
            step_id: step.id.clone(),
            attempts: policy.attempts(),
            source: Box::new(last_error),
        })
    }

    /// Executes the step body (exactly one of action/parallel/sequential).
    async fn run_body(&self, step: &Step, ctx: &SharedContext) -> Result<Value, EngineError> {
        if let Some(action_name) = &step.action {
            self.invoke_action(action_name, &step.params, ctx, &step.id)
                .await
        } else if let Some(children) = &step.parallel {
            self.run_parallel(children, ctx, &step.id).await
        } else if let Some(children) = &step.sequential {
            self.run_sequential(children, ctx, &step.id).await
        } else {
            // Validated definitions always carry a body
            Ok(Value::Null)
        }
    }

    /// Resolves params and invokes a registered action.
    async fn invoke_action(
        &self,
        action_name: &str,
        params: &serde_json::Map<String, Value>,
        ctx: &SharedContext,
        step_id: &str,
    ) -> Result<Value, EngineError> {
        let (scope, snapshot) = {
            let guard = ctx.lock().expect("execution context lock poisoned");
            (guard.step_scope(), guard.clone())
        };

        let resolved = template::resolve(&Value::Object(params.clone()), &scope);

        let action = self
            .registry
            .lookup(action_name)
            .ok_or_else(|| EngineError::ActionNotFound {
                name: action_name.to_string(),
            })?;

        debug!("Invoking action '{}' for step '{}'", action_name, step_id);

        action
            .execute(resolved, &snapshot)
            .await
            .map_err(|source| EngineError::StepExecution {
                step_id: step_id.to_string(),
                execution_id: self.execution_id.clone(),
                source,
            })
    }

    /// Runs group children concurrently and joins on all of them.
    ///
    /// Each child executes as its own task and reports through a channel
    /// (index-tagged so the group result keeps declaration order). The first
    /// reported failure fails the group with that child's error; in-flight
    /// siblings are not cancelled, their outcomes are simply never observed.
    async fn run_parallel(
        &self,
        children: &[ChildStep],
        ctx: &SharedContext,
        owner_id: &str,
    ) -> Result<Value, EngineError> {
        let (tx, mut rx) = mpsc::unbounded_channel();

        for (index, child) in children.iter().enumerate() {
            let tx = tx.clone();
            let runner = self.clone();
            let ctx = Arc::clone(ctx);
            let child = child.clone();
            let owner = owner_id.to_string();

            tokio::spawn(async move {
                let result = runner.run_child(&child, &ctx, &owner).await;
                // Receiver may be gone if a sibling already failed
                let _ = tx.send((index, result));
            });
        }
        drop(tx);

        let mut results: Vec<Value> = vec![Value::Null; children.len()];
        while let Some((index, result)) = rx.recv().await {
            match result {
                Ok(value) => results[index] = value.unwrap_or(Value::Null),
                Err(error) => return Err(error),
            }
        }

        Ok(Value::Array(results))
    }

    /// Runs group children strictly in declaration order.
    ///
    /// A failing child aborts the remaining children and propagates, unless
    /// that child is a full step whose own `onError: continue` absorbed it.
    async fn run_sequential(
        &self,
        children: &[ChildStep],
        ctx: &SharedContext,
        owner_id: &str,
    ) -> Result<Value, EngineError> {
        let mut results = Vec::with_capacity(children.len());

        for child in children {
            let value = self.run_child(child, ctx, owner_id).await?;
            results.push(value.unwrap_or(Value::Null));
        }

        Ok(Value::Array(results))
    }

    /// Runs one group child: a full step recurses through the interpreter,
    /// an inline action reference invokes its action directly (contributing
    /// to the group result but never to `step_results`).
    ///
    /// Boxed to break the async recursion cycle step -> group -> step.
    fn run_child<'a>(
        &'a self,
        child: &'a ChildStep,
        ctx: &'a SharedContext,
        owner_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Value>, EngineError>> + Send + 'a>> {
        Box::pin(async move {
            match child {
                ChildStep::Step(step) => self.run_step(step, ctx).await,
                ChildStep::Ref(action_ref) => self
                    .invoke_action(&action_ref.action, &action_ref.params, ctx, owner_id)
                    .await
                    .map(Some),
            }
        })
    }

    /// Records a completed step's result and emits `step:complete`.
    fn complete_step(&self, step: &Step, ctx: &SharedContext, result: Value) {
        ctx.lock()
            .expect("execution context lock poisoned")
            .record_result(step.id.clone(), result);
        self.emit_step(STEP_COMPLETE, &step.id, None);
    }

    fn emit_step(&self, name: &str, step_id: &str, error: Option<String>) {
        let mut event = WorkflowEvent::step(name, &self.workflow_id, &self.execution_id, step_id);
        if let Some(message) = error {
            event = event.with_error(message);
        }
        self.events.emit(&event);
    }
}

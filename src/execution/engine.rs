//! Workflow Execution Engine
//!
//! The core engine that orchestrates workflow execution including:
//! - Definition validation before any step runs
//! - Per-run execution contexts tracked in a concurrency-safe run table
//! - Sequential top-level stepping with parallel fan-out inside groups
//! - Lifecycle event emission (workflow:* / step:*)
//! - Success/error notification callouts and analytics forwarding
//! - Cooperative cancellation of in-flight runs
//!
//! The engine is an explicit value owned by the caller; there is no global
//! instance. Multiple executions of the same or different definitions run
//! concurrently with fully isolated contexts. The action registry and the
//! run table are the only shared state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, error, info, warn};
use serde_json::{json, Map, Value};

use crate::workflow::{
    template, validate_definition, Analytics, NotificationTarget, WorkflowDefinition,
};

use super::action::{register_builtin_actions, Action, ActionRegistry};
use super::context::ExecutionContext;
use super::error::{EngineError, ExecutionFailure};
use super::events::{
    EventBus, WorkflowEvent, WORKFLOW_CANCELLED, WORKFLOW_COMPLETE, WORKFLOW_ERROR,
    WORKFLOW_START,
};
use super::step::{SharedContext, StepRunner};

/// One entry in the run table.
struct RunHandle {
    context: SharedContext,
    cancelled: Arc<AtomicBool>,
}

/// Workflow execution engine.
///
/// Owns the action registry, the event bus, and the table of currently
/// running executions. Construct one per process (or per tenant), register
/// integration actions and event subscribers at startup, then call
/// [`execute`](Engine::execute) from as many tasks as needed.
///
/// # Example
///
/// ```rust,no_run
/// use flowrunner::execution::Engine;
/// use flowrunner::workflow::load_definition;
/// use serde_json::json;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let definition = load_definition("onboarding.yaml")?;
///     let engine = Engine::new();
///
///     let context = engine
///         .execute(&definition, json!({"employee": {"name": "Ada"}}))
///         .await?;
///     println!("Completed {} steps", context.step_results.len());
///     Ok(())
/// }
/// ```
pub struct Engine {
    registry: Arc<ActionRegistry>,
    events: Arc<EventBus>,
    running: Mutex<HashMap<String, RunHandle>>,
}

impl Engine {
    /// Creates an engine with the built-in synthetic actions registered.
    pub fn new() -> Self {
        let registry = Arc::new(ActionRegistry::new());
        register_builtin_actions(&registry);

        Self {
            registry,
            events: Arc::new(EventBus::new()),
            running: Mutex::new(HashMap::new()),
        }
    }

    /// Registers an action under a logical name.
    ///
    /// Integration modules call this during startup, before any execution
    /// begins.
    pub fn register_action(&self, name: impl Into<String>, action: Arc<dyn Action>) {
        self.registry.register(name, action);
    }

    /// Subscribes a handler to a lifecycle event name.
    ///
    /// Handlers run synchronously on the emitting execution's task, in
    /// subscription order.
    pub fn subscribe<F>(&self, event_name: impl Into<String>, handler: F)
    where
        F: Fn(&WorkflowEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(event_name, handler);
    }

    /// Executes a workflow definition against a trigger payload.
    ///
    /// On success returns the completed [`ExecutionContext`]. On failure
    /// returns an [`ExecutionFailure`] carrying both the error and the
    /// partial context (steps completed before the failure point plus the
    /// accumulated `errors`), so callers can diagnose without re-running.
    pub async fn execute(
        &self,
        definition: &WorkflowDefinition,
        trigger: Value,
    ) -> Result<ExecutionContext, ExecutionFailure> {
        let workflow_id = definition.metadata.name.clone();
        let mut context = ExecutionContext::new(&workflow_id, trigger);

        if let Err(validation) = validate_definition(definition) {
            error!("Workflow '{}' failed validation: {}", workflow_id, validation);
            context.record_error(validation.to_string());
            return Err(ExecutionFailure {
                context,
                error: validation.into(),
            });
        }

        let execution_id = context.execution_id.clone();
        info!(
            "Starting execution {} of workflow '{}'",
            execution_id, workflow_id
        );

        let cancelled = Arc::new(AtomicBool::new(false));
        let shared: SharedContext = Arc::new(Mutex::new(context));

        self.running
            .lock()
            .expect("run table lock poisoned")
            .insert(
                execution_id.clone(),
                RunHandle {
                    context: Arc::clone(&shared),
                    cancelled: Arc::clone(&cancelled),
                },
            );

        self.events
            .emit(&WorkflowEvent::workflow(WORKFLOW_START, &workflow_id, &execution_id));

        self.resolve_variables(definition, &shared);

        let runner = StepRunner {
            registry: Arc::clone(&self.registry),
            events: Arc::clone(&self.events),
            workflow_id: workflow_id.clone(),
            execution_id: execution_id.clone(),
        };

        let mut outcome: Result<(), EngineError> = Ok(());
        for step in &definition.steps {
            if cancelled.load(Ordering::SeqCst) {
                info!("Execution {} cancelled before step '{}'", execution_id, step.id);
                outcome = Err(EngineError::Cancelled {
                    execution_id: execution_id.clone(),
                });
                break;
            }

            if let Err(step_error) = runner.run_step(step, &shared).await {
                outcome = Err(step_error);
                break;
            }
        }

        // The run is no longer cancellable once it leaves the table
        self.running
            .lock()
            .expect("run table lock poisoned")
            .remove(&execution_id);

        let mut context = shared
            .lock()
            .expect("execution context lock poisoned")
            .clone();
        context.current_step = None;

        let result = match outcome {
            Ok(()) => {
                info!(
                    "Execution {} completed: {} steps, {} non-fatal errors",
                    execution_id,
                    context.step_results.len(),
                    context.errors.len()
                );
                self.events.emit(&WorkflowEvent::workflow(
                    WORKFLOW_COMPLETE,
                    &workflow_id,
                    &execution_id,
                ));
                if let Some(notifications) = &definition.notifications {
                    self.send_notifications(&notifications.on_success, &context).await;
                }
                Ok(context)
            }
            Err(engine_error) if engine_error.is_cancelled() => {
                // workflow:cancelled was already emitted by cancel(); a
                // cancelled run is not a failed run, so no error callouts
                Err(ExecutionFailure {
                    context,
                    error: engine_error,
                })
            }
            Err(engine_error) => {
                error!("Execution {} failed: {}", execution_id, engine_error);
                context.record_error(engine_error.to_string());
                self.events.emit(
                    &WorkflowEvent::workflow(WORKFLOW_ERROR, &workflow_id, &execution_id)
                        .with_error(engine_error.to_string()),
                );
                if let Some(notifications) = &definition.notifications {
                    self.send_notifications(&notifications.on_error, &context).await;
                }
                Err(ExecutionFailure {
                    context,
                    error: engine_error,
                })
            }
        };

        if let Some(analytics) = &definition.analytics {
            let context = match &result {
                Ok(context) => context,
                Err(failure) => &failure.context,
            };
            self.track_analytics(analytics, context).await;
        }

        result
    }

    /// Cancels a running execution.
    ///
    /// Removes the run from the run table, emits `workflow:cancelled`, and
    /// sets the run's cooperative flag; the owning task stops before its
    /// next top-level step. An action already in flight is not interrupted
    /// (actions are opaque units of work to the engine). Returns false when
    /// no run with the id exists.
    pub fn cancel(&self, execution_id: &str) -> bool {
        let handle = self
            .running
            .lock()
            .expect("run table lock poisoned")
            .remove(execution_id);

        let Some(handle) = handle else {
            debug!("Cancel requested for unknown execution {}", execution_id);
            return false;
        };

        handle.cancelled.store(true, Ordering::SeqCst);

        let workflow_id = handle
            .context
            .lock()
            .expect("execution context lock poisoned")
            .workflow_id
            .clone();

        info!("Execution {} cancelled", execution_id);
        self.events.emit(&WorkflowEvent::workflow(
            WORKFLOW_CANCELLED,
            &workflow_id,
            execution_id,
        ));
        true
    }

    /// Snapshots of every currently running execution.
    pub fn list_running(&self) -> Vec<ExecutionContext> {
        self.running
            .lock()
            .expect("run table lock poisoned")
            .values()
            .map(|handle| {
                handle
                    .context
                    .lock()
                    .expect("execution context lock poisoned")
                    .clone()
            })
            .collect()
    }

    /// Resolves workflow variables against the trigger payload.
    fn resolve_variables(&self, definition: &WorkflowDefinition, shared: &SharedContext) {
        let mut guard = shared.lock().expect("execution context lock poisoned");
        let scope = guard.variable_scope();

        for (name, value) in &definition.variables {
            let resolved = template::resolve(value, &scope);
            guard.variables.insert(name.clone(), resolved);
        }
    }

    /// Delivers notification targets through `{type}.send` actions.
    ///
    /// Failures here are logged and swallowed; a broken notification channel
    /// must not change the outcome of the run.
    async fn send_notifications(
        &self,
        targets: &[NotificationTarget],
        context: &ExecutionContext,
    ) {
        for target in targets {
            let action_name = format!("{}.send", target.kind);
            let Some(action) = self.registry.lookup(&action_name) else {
                warn!(
                    "No '{}' action registered - skipping notification",
                    action_name
                );
                continue;
            };

            let params = match serde_json::to_value(target) {
                Ok(params) => params,
                Err(serialize_error) => {
                    warn!("Failed to serialize notification target: {}", serialize_error);
                    continue;
                }
            };

            if let Err(send_error) = action.execute(params, context).await {
                warn!(
                    "Failed to send {} notification: {}",
                    target.kind, send_error
                );
            }
        }
    }

    /// Computes configured metrics and forwards them to `analytics.track`.
    async fn track_analytics(&self, config: &Analytics, context: &ExecutionContext) {
        let duration_ms = context.elapsed_ms();
        let steps_completed = context.step_results.len();
        let error_count = context.errors.len();

        let mut metrics = Map::new();
        for metric in &config.track {
            let value = match metric.as_str() {
                "workflow_duration" => json!(duration_ms),
                "steps_completed" => json!(steps_completed),
                "error_rate" => json!(if error_count > 0 { 1 } else { 0 }),
                other => {
                    warn!("Unknown analytics metric '{}' - skipping", other);
                    continue;
                }
            };
            metrics.insert(metric.clone(), value);
        }

        let payload = json!({
            "destination": config.report_to,
            "data": {
                "workflowId": context.workflow_id,
                "executionId": context.execution_id,
                "duration": duration_ms,
                "stepsCompleted": steps_completed,
                "errors": error_count,
                "metrics": metrics,
            }
        });

        let Some(action) = self.registry.lookup("analytics.track") else {
            debug!("No 'analytics.track' action registered - metrics dropped");
            return;
        };

        if let Err(track_error) = action.execute(payload, context).await {
            warn!("Failed to forward analytics: {}", track_error);
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::action::{ActionError, FnAction};
    use crate::execution::events::{STEP_COMPLETE, STEP_START};
    use crate::workflow::{ActionRef, Backoff, ChildStep, OnError, RetryConfig, Step};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Test action that sleeps before succeeding.
    struct SleepyAction {
        delay: Duration,
    }

    #[async_trait]
    impl Action for SleepyAction {
        async fn execute(&self, _: Value, _: &ExecutionContext) -> Result<Value, ActionError> {
            tokio::time::sleep(self.delay).await;
            Ok(json!({"slept": true}))
        }
    }

    fn onboarding_definition() -> WorkflowDefinition {
        WorkflowDefinition::new("onboarding")
            .with_step(Step::action("create", "create").with_param(
                "data",
                json!({"name": "${trigger.employee.name}"}),
            ))
            .with_step(Step::action("notify", "notify"))
    }

    #[tokio::test]
    async fn test_end_to_end_onboarding() {
        let engine = Engine::new();
        let context = engine
            .execute(
                &onboarding_definition(),
                json!({"employee": {"name": "Ada"}}),
            )
            .await
            .unwrap();

        let created = context.step_result("create").unwrap();
        assert!(!created["id"].as_str().unwrap().is_empty());
        assert_eq!(created["name"], json!("Ada"));
        assert_eq!(context.step_result("notify").unwrap()["sent"], json!(true));
        assert!(context.errors.is_empty());
        assert!(context.current_step.is_none());
    }

    #[tokio::test]
    async fn test_step_results_in_declared_order() {
        let engine = Engine::new();
        let definition = WorkflowDefinition::new("ordered")
            .with_step(Step::action("one", "notify"))
            .with_step(Step::action("two", "notify"))
            .with_step(Step::action("three", "notify"));

        let context = engine.execute(&definition, json!({})).await.unwrap();
        let ids: Vec<&String> = context.step_results.keys().collect();
        assert_eq!(ids, ["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_variables_resolved_from_trigger() {
        let engine = Engine::new();
        let definition = WorkflowDefinition::new("vars")
            .with_variable("employee_name", json!("${trigger.employee.name}"))
            .with_step(
                Step::action("create", "create")
                    .with_param("data", json!({"name": "${employee_name}"})),
            );

        let context = engine
            .execute(&definition, json!({"employee": {"name": "Grace"}}))
            .await
            .unwrap();

        assert_eq!(context.variables["employee_name"], json!("Grace"));
        assert_eq!(context.step_result("create").unwrap()["name"], json!("Grace"));
    }

    #[tokio::test]
    async fn test_validation_failure_runs_nothing() {
        let engine = Engine::new();
        let started = Arc::new(Mutex::new(0));
        let count = Arc::clone(&started);
        engine.subscribe(WORKFLOW_START, move |_| {
            *count.lock().unwrap() += 1;
        });

        let definition = WorkflowDefinition::new("invalid");
        let failure = engine.execute(&definition, json!({})).await.unwrap_err();

        assert!(matches!(failure.error, EngineError::Validation(_)));
        assert!(failure.context.step_results.is_empty());
        assert_eq!(*started.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_abort_stops_remaining_steps() {
        let engine = Engine::new();
        let definition = WorkflowDefinition::new("abort")
            .with_step(Step::action("first", "notify"))
            .with_step(Step::action("broken", "no.such.action"))
            .with_step(Step::action("never", "notify"));

        let failure = engine.execute(&definition, json!({})).await.unwrap_err();

        assert!(matches!(failure.error, EngineError::ActionNotFound { .. }));
        assert!(failure.context.step_result("first").is_some());
        assert!(failure.context.step_result("never").is_none());
        assert_eq!(failure.context.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_continue_keeps_workflow_alive() {
        let engine = Engine::new();
        engine.register_action(
            "boom",
            Arc::new(FnAction::new(|_, _| Err(ActionError::new("bad day")))),
        );

        let definition = WorkflowDefinition::new("resilient")
            .with_step(
                Step::action("soft", "boom").with_on_error(OnError::Continue),
            )
            .with_step(Step::action("after", "notify"));

        let context = engine.execute(&definition, json!({})).await.unwrap();

        assert_eq!(context.errors.len(), 1);
        assert!(context.errors[0].contains("bad day"));
        assert!(context.step_result("soft").is_none());
        assert!(context.step_result("after").is_some());
    }

    #[tokio::test]
    async fn test_parallel_failure_recorded_at_workflow_level() {
        let engine = Engine::new();
        engine.register_action(
            "fails_fast",
            Arc::new(FnAction::new(|_, _| Err(ActionError::new("B exploded")))),
        );
        engine.register_action("slow_ok", Arc::new(SleepyAction {
            delay: Duration::from_millis(100),
        }));

        let definition = WorkflowDefinition::new("fanout").with_step(Step::parallel(
            "group",
            vec![
                ChildStep::Ref(ActionRef::new("slow_ok")),
                ChildStep::Ref(ActionRef::new("fails_fast")),
            ],
        ));

        let failure = engine.execute(&definition, json!({})).await.unwrap_err();
        assert!(failure.error.to_string().contains("B exploded"));
        assert!(failure
            .context
            .errors
            .iter()
            .any(|recorded| recorded.contains("B exploded")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhausted_surfaces() {
        let engine = Engine::new();
        engine.register_action(
            "always_fails",
            Arc::new(FnAction::new(|_, _| Err(ActionError::new("still down")))),
        );

        let definition = WorkflowDefinition::new("retry").with_step(
            Step::action("flaky", "always_fails")
                .with_retry(RetryConfig::new(3, 100, Backoff::Exponential)),
        );

        let failure = engine.execute(&definition, json!({})).await.unwrap_err();
        match failure.error {
            EngineError::RetryExhausted { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected RetryExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_lifecycle_event_order() {
        let engine = Engine::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for name in [WORKFLOW_START, STEP_START, STEP_COMPLETE, WORKFLOW_COMPLETE] {
            let seen = Arc::clone(&seen);
            engine.subscribe(name, move |event| {
                seen.lock().unwrap().push(event.name.clone());
            });
        }

        engine
            .execute(&onboarding_definition(), json!({"employee": {"name": "Ada"}}))
            .await
            .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            [
                WORKFLOW_START,
                STEP_START,
                STEP_COMPLETE,
                STEP_START,
                STEP_COMPLETE,
                WORKFLOW_COMPLETE,
            ]
        );
    }

    #[tokio::test]
    async fn test_error_notifications_fired() {
        let engine = Engine::new();
        let sent = Arc::new(Mutex::new(Vec::new()));

        let captured = Arc::clone(&sent);
        engine.register_action(
            "email.send",
            Arc::new(FnAction::new(move |params, _| {
                captured.lock().unwrap().push(params);
                Ok(json!({"sent": true}))
            })),
        );

        let definition: WorkflowDefinition = serde_yaml::from_str(
            r#"
metadata:
  name: notifying
steps:
  - id: broken
    action: no.such.action
notifications:
  onError:
    - type: email
      to: ops@example.com
      subject: workflow failed
"#,
        )
        .unwrap();

        let _ = engine.execute(&definition, json!({})).await;

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["to"], json!("ops@example.com"));
        assert_eq!(sent[0]["subject"], json!("workflow failed"));
    }

    #[tokio::test]
    async fn test_success_notifications_fired() {
        let engine = Engine::new();
        let count = Arc::new(Mutex::new(0));

        let calls = Arc::clone(&count);
        engine.register_action(
            "email.send",
            Arc::new(FnAction::new(move |_, _| {
                *calls.lock().unwrap() += 1;
                Ok(json!({"sent": true}))
            })),
        );

        let definition: WorkflowDefinition = serde_yaml::from_str(
            r#"
metadata:
  name: celebrate
steps:
  - id: only
    action: notify
notifications:
  onSuccess:
    - type: email
      to: team@example.com
  onError:
    - type: email
      to: ops@example.com
"#,
        )
        .unwrap();

        engine.execute(&definition, json!({})).await.unwrap();
        // Only the success target fires
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_analytics_forwarded() {
        let engine = Engine::new();
        let tracked = Arc::new(Mutex::new(Vec::new()));

        let captured = Arc::clone(&tracked);
        engine.register_action(
            "analytics.track",
            Arc::new(FnAction::new(move |params, _| {
                captured.lock().unwrap().push(params);
                Ok(Value::Null)
            })),
        );

        let definition = onboarding_definition().with_analytics(Analytics {
            track: vec![
                "workflow_duration".to_string(),
                "steps_completed".to_string(),
                "error_rate".to_string(),
            ],
            report_to: "dashboard".to_string(),
        });

        engine
            .execute(&definition, json!({"employee": {"name": "Ada"}}))
            .await
            .unwrap();

        let tracked = tracked.lock().unwrap();
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0]["destination"], json!("dashboard"));

        let metrics = &tracked[0]["data"]["metrics"];
        assert_eq!(metrics["steps_completed"], json!(2));
        assert_eq!(metrics["error_rate"], json!(0));
        assert!(metrics["workflow_duration"].as_i64().unwrap() >= 0);
    }

    #[tokio::test]
    async fn test_cancel_and_list_running() {
        let engine = Arc::new(Engine::new());
        engine.register_action("block", Arc::new(SleepyAction {
            delay: Duration::from_millis(200),
        }));

        let cancelled_events = Arc::new(Mutex::new(0));
        let count = Arc::clone(&cancelled_events);
        engine.subscribe(WORKFLOW_CANCELLED, move |_| {
            *count.lock().unwrap() += 1;
        });

        let definition = WorkflowDefinition::new("long")
            .with_step(Step::action("blocker", "block"))
            .with_step(Step::action("never", "notify"));

        let task = {
            let engine = Arc::clone(&engine);
            let definition = definition.clone();
            tokio::spawn(async move { engine.execute(&definition, json!({})).await })
        };

        // Let the blocking step start
        tokio::time::sleep(Duration::from_millis(50)).await;

        let running = engine.list_running();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].workflow_id, "long");

        let execution_id = running[0].execution_id.clone();
        assert!(engine.cancel(&execution_id));
        assert!(!engine.cancel(&execution_id));
        assert!(engine.list_running().is_empty());

        let failure = task.await.unwrap().unwrap_err();
        assert!(failure.error.is_cancelled());
        // The in-flight action finished; the following step never started
        assert!(failure.context.step_result("blocker").is_some());
        assert!(failure.context.step_result("never").is_none());
        assert_eq!(*cancelled_events.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_start_handler_can_cancel_its_own_run() {
        let engine = Arc::new(Engine::new());

        // Cancelling from inside a lifecycle handler re-enters the event bus
        // (cancel emits workflow:cancelled) and must not deadlock
        let canceller = Arc::clone(&engine);
        engine.subscribe(WORKFLOW_START, move |event| {
            assert!(canceller.cancel(&event.execution_id));
        });

        let failure = engine
            .execute(&onboarding_definition(), json!({}))
            .await
            .unwrap_err();

        assert!(failure.error.is_cancelled());
        assert!(failure.context.step_results.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_unknown_execution() {
        let engine = Engine::new();
        assert!(!engine.cancel("not-an-execution"));
    }

    #[tokio::test]
    async fn test_concurrent_executions_are_isolated() {
        let engine = Arc::new(Engine::new());

        let mut tasks = Vec::new();
        for index in 0..4 {
            let engine = Arc::clone(&engine);
            tasks.push(tokio::spawn(async move {
                let definition = onboarding_definition();
                engine
                    .execute(&definition, json!({"employee": {"name": format!("user-{index}")}}))
                    .await
            }));
        }

        let mut execution_ids = Vec::new();
        for (index, task) in tasks.into_iter().enumerate() {
            let context = task.await.unwrap().unwrap();
            assert_eq!(
                context.step_result("create").unwrap()["name"],
                json!(format!("user-{index}"))
            );
            execution_ids.push(context.execution_id);
        }

        execution_ids.sort();
        execution_ids.dedup();
        assert_eq!(execution_ids.len(), 4);
        assert!(engine.list_running().is_empty());
    }
}

//! Action Registry
//!
//! Maps logical action names (e.g. "email.send") to executable capabilities.
//! The registry is populated during startup and read-mostly afterwards;
//! lookups are safe from any number of concurrent executions.
//!
//! A small set of synthetic built-in actions is pre-registered so workflows
//! can be exercised without any external integration: they log what they
//! would do and return plausible result markers. Production actions for
//! email, chat, and persistence are registered by the embedding application
//! before executions begin.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use super::context::ExecutionContext;

/// Failure of a single action invocation.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct ActionError {
    message: String,
}

impl ActionError {
    /// Creates an action error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// An executable capability invoked by name from workflow steps.
///
/// Actions are opaque to the engine: it passes resolved params and a snapshot
/// of the execution context in, and stores whatever comes back under the
/// step's id. Actions own their own time-bounding; the engine enforces no
/// timeout.
#[async_trait]
pub trait Action: Send + Sync {
    /// Executes the action with template-resolved parameters.
    async fn execute(&self, params: Value, context: &ExecutionContext)
        -> Result<Value, ActionError>;
}

/// Adapter registering a plain closure as an [`Action`].
///
/// # Example
///
/// ```
/// use flowrunner::execution::{ActionError, FnAction};
/// use serde_json::json;
///
/// let action = FnAction::new(|params, _ctx| {
///     let name = params["name"].as_str().unwrap_or("unknown");
///     Ok(json!({"greeting": format!("hello {name}")}))
/// });
/// # let _ = action;
/// ```
pub struct FnAction<F> {
    func: F,
}

impl<F> FnAction<F>
where
    F: Fn(Value, &ExecutionContext) -> Result<Value, ActionError> + Send + Sync,
{
    /// Wraps a closure as an action.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> Action for FnAction<F>
where
    F: Fn(Value, &ExecutionContext) -> Result<Value, ActionError> + Send + Sync,
{
    async fn execute(
        &self,
        params: Value,
        context: &ExecutionContext,
    ) -> Result<Value, ActionError> {
        (self.func)(params, context)
    }
}

/// Thread-safe name-to-action mapping.
///
/// Registration happens once at startup; after that the registry only serves
/// lookups, so a read-write lock around a plain map is all the concurrency
/// control this needs.
#[derive(Default)]
pub struct ActionRegistry {
    actions: RwLock<HashMap<String, Arc<dyn Action>>>,
}

impl ActionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an action under a logical name, replacing any previous
    /// registration.
    pub fn register(&self, name: impl Into<String>, action: Arc<dyn Action>) {
        let name = name.into();
        debug!("Registering action '{}'", name);
        self.actions
            .write()
            .expect("action registry lock poisoned")
            .insert(name, action);
    }

    /// Looks up an action by name.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Action>> {
        self.actions
            .read()
            .expect("action registry lock poisoned")
            .get(name)
            .cloned()
    }

    /// Returns true if an action is registered under the name.
    pub fn contains(&self, name: &str) -> bool {
        self.actions
            .read()
            .expect("action registry lock poisoned")
            .contains_key(name)
    }

    /// Number of registered actions.
    pub fn len(&self) -> usize {
        self.actions
            .read()
            .expect("action registry lock poisoned")
            .len()
    }

    /// Returns true if no actions are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Synthetic record creation: returns a generated id merged with the
/// step's `data` parameter.
struct CreateAction;

#[async_trait]
impl Action for CreateAction {
    async fn execute(&self, params: Value, _: &ExecutionContext) -> Result<Value, ActionError> {
        info!("Creating record: {}", params);

        let mut record = serde_json::Map::new();
        record.insert("id".to_string(), json!(Uuid::new_v4().to_string()));
        if let Some(data) = params.get("data").and_then(Value::as_object) {
            for (key, value) in data {
                record.insert(key.clone(), value.clone());
            }
        }
        Ok(Value::Object(record))
    }
}

/// Synthetic notification: acknowledges with a sent marker and timestamp.
struct NotifyAction;

#[async_trait]
impl Action for NotifyAction {
    async fn execute(&self, params: Value, _: &ExecutionContext) -> Result<Value, ActionError> {
        info!("Sending notification: {}", params);
        Ok(json!({
            "sent": true,
            "timestamp": Utc::now().to_rfc3339(),
        }))
    }
}

/// Email stub: logs the send and returns a message id.
struct EmailSendAction;

#[async_trait]
impl Action for EmailSendAction {
    async fn execute(&self, params: Value, _: &ExecutionContext) -> Result<Value, ActionError> {
        info!("Sending email: {}", params);
        Ok(json!({
            "sent": true,
            "messageId": Uuid::new_v4().to_string(),
        }))
    }
}

/// Chat message stub: logs the send and returns a timestamp marker.
struct SlackMessageAction;

#[async_trait]
impl Action for SlackMessageAction {
    async fn execute(&self, params: Value, _: &ExecutionContext) -> Result<Value, ActionError> {
        info!("Sending Slack message: {}", params);
        Ok(json!({
            "sent": true,
            "ts": Utc::now().timestamp_millis(),
        }))
    }
}

/// Registers the built-in synthetic actions.
pub fn register_builtin_actions(registry: &ActionRegistry) {
    registry.register("create", Arc::new(CreateAction));
    registry.register("notify", Arc::new(NotifyAction));
    registry.register("email.send", Arc::new(EmailSendAction));
    registry.register("slack.message", Arc::new(SlackMessageAction));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_context() -> ExecutionContext {
        ExecutionContext::new("test", Value::Null)
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = ActionRegistry::new();
        assert!(registry.is_empty());

        registry.register("custom", Arc::new(NotifyAction));
        assert!(registry.contains("custom"));
        assert!(registry.lookup("custom").is_some());
        assert!(registry.lookup("missing").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_replaces() {
        let registry = ActionRegistry::new();
        registry.register("x", Arc::new(NotifyAction));
        registry.register("x", Arc::new(CreateAction));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_builtins_registered() {
        let registry = ActionRegistry::new();
        register_builtin_actions(&registry);

        for name in ["create", "notify", "email.send", "slack.message"] {
            assert!(registry.contains(name), "missing builtin '{}'", name);
        }
    }

    #[tokio::test]
    async fn test_create_action_merges_data() {
        let result = CreateAction
            .execute(json!({"data": {"name": "Ada", "team": "platform"}}), &test_context())
            .await
            .unwrap();

        assert!(!result["id"].as_str().unwrap().is_empty());
        assert_eq!(result["name"], json!("Ada"));
        assert_eq!(result["team"], json!("platform"));
    }

    #[tokio::test]
    async fn test_create_action_without_data() {
        let result = CreateAction
            .execute(json!({}), &test_context())
            .await
            .unwrap();

        assert!(result.get("id").is_some());
        assert_eq!(result.as_object().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_notify_action_marks_sent() {
        let result = NotifyAction
            .execute(json!({"to": "team@example.com"}), &test_context())
            .await
            .unwrap();

        assert_eq!(result["sent"], json!(true));
        assert!(result.get("timestamp").is_some());
    }

    #[tokio::test]
    async fn test_fn_action_adapter() {
        let action = FnAction::new(|params, _ctx| {
            Ok(json!({"echo": params}))
        });

        let result = action.execute(json!(41), &test_context()).await.unwrap();
        assert_eq!(result["echo"], json!(41));
    }

    #[tokio::test]
    async fn test_fn_action_failure() {
        let action = FnAction::new(|_, _| Err(ActionError::new("nope")));
        let err = action
            .execute(Value::Null, &test_context())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "nope");
    }

    #[test]
    fn test_concurrent_lookup() {
        let registry = Arc::new(ActionRegistry::new());
        register_builtin_actions(&registry);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        assert!(registry.lookup("create").is_some());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}

//! Workflow Data Model
//!
//! Core data structures representing a declarative workflow definition:
//! metadata, triggers, variables, steps (single actions or parallel/sequential
//! groups), notification targets, and analytics configuration.
//!
//! # Example YAML Format
//!
//! ```yaml
//! metadata:
//!   name: employee-onboarding
//!   version: "1.0"
//!   description: Provision accounts for a new employee
//!
//! variables:
//!   employee_name: ${trigger.employee.name}
//!
//! steps:
//!   - id: create_account
//!     name: Create user account
//!     action: create
//!     params:
//!       data:
//!         name: ${employee_name}
//!     onError: retry
//!     retry:
//!       attempts: 3
//!       delay: 500
//!       backoff: exponential
//!
//!   - id: announce
//!     name: Announce the new hire
//!     parallel:
//!       - action: email.send
//!         params:
//!           to: team@example.com
//!       - action: slack.message
//!         params:
//!           channel: "#general"
//!
//! notifications:
//!   onError:
//!     - type: email
//!       to: ops@example.com
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifying metadata for a workflow definition.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Metadata {
    /// Workflow name, used as the workflow id of every execution
    pub name: String,

    /// Definition version string
    #[serde(default)]
    pub version: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Optional grouping category
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Free-form tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Describes how a workflow is meant to be triggered.
///
/// Triggers are descriptive only. The engine never schedules or listens for
/// them; whatever invokes [`Engine::execute`](crate::execution::Engine::execute)
/// owns trigger wiring.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Trigger {
    /// Trigger kind: "webhook", "schedule", "manual", or "event"
    #[serde(rename = "type")]
    pub kind: String,

    /// Source system for webhook/event triggers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Event name for event triggers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,

    /// Cron-style schedule for schedule triggers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,

    /// Fields the trigger payload must carry
    #[serde(
        default,
        rename = "requiredFields",
        alias = "required_fields",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub required_fields: Vec<String>,
}

/// Failure policy for a single step.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OnError {
    /// Stop the whole workflow and surface the error (default)
    #[default]
    Abort,
    /// Record the error and proceed to the next step
    Continue,
    /// Re-attempt the step body per its retry configuration
    Retry,
}

/// Delay growth strategy between retry attempts.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// Constant delay before every retry
    #[default]
    Linear,
    /// Delay doubles with each retry
    Exponential,
}

/// Retry configuration, required when a step declares `onError: retry`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts including the first one (must be >= 1)
    pub attempts: u32,

    /// Base delay between attempts, in milliseconds
    pub delay: u64,

    /// Delay growth strategy
    #[serde(default)]
    pub backoff: Backoff,
}

impl RetryConfig {
    /// Creates a retry configuration.
    pub fn new(attempts: u32, delay_ms: u64, backoff: Backoff) -> Self {
        Self {
            attempts,
            delay: delay_ms,
            backoff,
        }
    }
}

/// An inline action reference used inside `parallel`/`sequential` lists.
///
/// Unlike a full [`Step`], an action reference has no id and therefore no
/// entry of its own in `step_results`; its result only appears in the
/// enclosing group's result array.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ActionRef {
    /// Registered action name (e.g. "email.send")
    pub action: String,

    /// Action parameters, template-resolved at execution time
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
}

impl ActionRef {
    /// Creates an inline action reference.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            params: Map::new(),
        }
    }

    /// Adds a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}

/// A child of a `parallel` or `sequential` group: either a full step (with
/// its own id, condition, and error policy) or a bare action reference.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum ChildStep {
    /// Full step with id and policy
    Step(Step),
    /// Inline `{action, params}` reference
    Ref(ActionRef),
}

/// A single unit of work in a workflow.
///
/// Exactly one of `action`, `parallel`, or `sequential` must be set; the
/// validator rejects definitions that violate this.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Step {
    /// Unique identifier within the definition
    pub id: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Registered action to invoke
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    /// Children executed concurrently
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<Vec<ChildStep>>,

    /// Children executed strictly in order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequential: Option<Vec<ChildStep>>,

    /// Template string evaluated as a boolean; false skips the step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    /// Action parameters, template-resolved at execution time
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,

    /// Failure policy for this step
    #[serde(default, rename = "onError", alias = "on_error")]
    pub on_error: OnError,

    /// Retry configuration, required when `on_error` is `retry`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
}

impl Step {
    fn base(id: impl Into<String>) -> Self {
        Self {
            id: id.into().trim().to_string(),
            name: String::new(),
            action: None,
            parallel: None,
            sequential: None,
            condition: None,
            params: Map::new(),
            on_error: OnError::Abort,
            retry: None,
        }
    }

    /// Creates an action step.
    ///
    /// # Example
    ///
    /// ```
    /// use flowrunner::workflow::{OnError, Step};
    /// use serde_json::json;
    ///
    /// let step = Step::action("notify_team", "slack.message")
    ///     .with_param("channel", json!("#general"))
    ///     .with_on_error(OnError::Continue);
    /// assert_eq!(step.id, "notify_team");
    /// ```
    pub fn action(id: impl Into<String>, action: impl Into<String>) -> Self {
        let mut step = Self::base(id);
        step.action = Some(action.into().trim().to_string());
        step
    }

    /// Creates a parallel group step.
    pub fn parallel(id: impl Into<String>, children: Vec<ChildStep>) -> Self {
        let mut step = Self::base(id);
        step.parallel = Some(children);
        step
    }

    /// Creates a sequential group step.
    pub fn sequential(id: impl Into<String>, children: Vec<ChildStep>) -> Self {
        let mut step = Self::base(id);
        step.sequential = Some(children);
        step
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the condition template.
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Adds a single parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Replaces all parameters.
    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    /// Sets the failure policy.
    pub fn with_on_error(mut self, on_error: OnError) -> Self {
        self.on_error = on_error;
        self
    }

    /// Sets `onError: retry` with the given configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.on_error = OnError::Retry;
        self.retry = Some(retry);
        self
    }

    /// Returns true if exactly one of action/parallel/sequential is set.
    pub fn has_single_body(&self) -> bool {
        let bodies = self.action.is_some() as u8
            + self.parallel.is_some() as u8
            + self.sequential.is_some() as u8;
        bodies == 1
    }
}

/// Notification targets fired at workflow completion.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Notifications {
    /// Sent after a successful run
    #[serde(
        default,
        rename = "onSuccess",
        alias = "on_success",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub on_success: Vec<NotificationTarget>,

    /// Sent after an unrecovered failure
    #[serde(
        default,
        rename = "onError",
        alias = "on_error",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub on_error: Vec<NotificationTarget>,
}

/// A single notification destination.
///
/// Delivered by invoking the registered action `"{type}.send"` with the
/// target itself as parameters.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NotificationTarget {
    /// Delivery channel kind: "email", "slack", or "webhook"
    #[serde(rename = "type")]
    pub kind: String,

    /// Recipient address(es) for email targets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Value>,

    /// Channel name for chat targets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    /// Endpoint for webhook targets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Message subject
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Message body template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Analytics forwarding configuration.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Analytics {
    /// Metric names to collect ("workflow_duration", "steps_completed",
    /// "error_rate")
    pub track: Vec<String>,

    /// Destination passed to the `analytics.track` action
    #[serde(rename = "report_to", alias = "reportTo")]
    pub report_to: String,
}

/// A complete declarative workflow definition.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WorkflowDefinition {
    /// Identifying metadata; `metadata.name` must be non-empty
    pub metadata: Metadata,

    /// Descriptive trigger declarations (not executed by this engine)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<Trigger>,

    /// Workflow variables, template-resolved against the trigger payload
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub variables: Map<String, Value>,

    /// Ordered top-level steps; must be non-empty
    pub steps: Vec<Step>,

    /// Success/error notification targets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notifications: Option<Notifications>,

    /// Analytics forwarding configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics: Option<Analytics>,
}

impl WorkflowDefinition {
    /// Creates an empty definition with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            metadata: Metadata {
                name: name.into(),
                ..Metadata::default()
            },
            triggers: Vec::new(),
            variables: Map::new(),
            steps: Vec::new(),
            notifications: None,
            analytics: None,
        }
    }

    /// Appends a top-level step.
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Declares a workflow variable (value or template string).
    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    /// Sets the notification configuration.
    pub fn with_notifications(mut self, notifications: Notifications) -> Self {
        self.notifications = Some(notifications);
        self
    }

    /// Sets the analytics configuration.
    pub fn with_analytics(mut self, analytics: Analytics) -> Self {
        self.analytics = Some(analytics);
        self
    }

    /// Gets a top-level step by id.
    pub fn get_step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Returns the number of top-level steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if the definition has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

//! Declarative action definitions.
//!
//! An `ActionDefinition` carries the static metadata of one kind of action:
//! which reference model fulfils it, which actions may spawn it, and which
//! actions it spawns once closed. Definitions are loaded from config and
//! registered with `SiteActionItems`; they are never persisted themselves.

use crate::types::{ActionStatus, Priority};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// NextTarget
// ---------------------------------------------------------------------------

/// The action spawned by a next-action entry. Written as `self` or as the
/// registered name of another action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NextTarget {
    Current,
    Named(String),
}

impl NextTarget {
    /// Resolve against the action that owns the entry.
    pub fn resolve<'a>(&'a self, current: &'a str) -> &'a str {
        match self {
            NextTarget::Current => current,
            NextTarget::Named(name) => name,
        }
    }
}

impl From<String> for NextTarget {
    fn from(s: String) -> Self {
        if s == "self" {
            NextTarget::Current
        } else {
            NextTarget::Named(s)
        }
    }
}

impl From<NextTarget> for String {
    fn from(t: NextTarget) -> Self {
        match t {
            NextTarget::Current => "self".to_string(),
            NextTarget::Named(name) => name,
        }
    }
}

impl fmt::Display for NextTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NextTarget::Current => f.write_str("self"),
            NextTarget::Named(name) => f.write_str(name),
        }
    }
}

// ---------------------------------------------------------------------------
// Condition
// ---------------------------------------------------------------------------

/// A test against the fields of the reference object that closed the action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Condition {
    Equals {
        field: String,
        value: serde_json::Value,
    },
    NotEquals {
        field: String,
        value: serde_json::Value,
    },
    Present {
        field: String,
    },
}

impl Condition {
    /// `fields` is `Value::Null` when there is no reference object; only
    /// `not_equals` holds in that case.
    pub fn matches(&self, fields: &serde_json::Value) -> bool {
        match self {
            Condition::Equals { field, value } => fields.get(field) == Some(value),
            Condition::NotEquals { field, value } => fields.get(field) != Some(value),
            Condition::Present { field } => {
                fields.get(field).map(|v| !v.is_null()).unwrap_or(false)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// NextAction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextAction {
    pub action: NextTarget,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Condition>,
}

impl NextAction {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            action: NextTarget::Named(name.into()),
            when: None,
        }
    }

    pub fn current() -> Self {
        Self {
            action: NextTarget::Current,
            when: None,
        }
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.when = Some(condition);
        self
    }

    pub fn applies_to(&self, fields: &serde_json::Value) -> bool {
        self.when.as_ref().map(|c| c.matches(fields)).unwrap_or(true)
    }
}

// ---------------------------------------------------------------------------
// ActionDefinition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Model label of the business record that closes this action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_model: Option<String>,
    /// Set when every item of this action must hang off a related item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_reference_model: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parent_action_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next_actions: Vec<NextAction>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub singleton: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default = "default_true")]
    pub create_by_user: bool,
    #[serde(default = "default_true")]
    pub create_by_action: bool,
    #[serde(default = "default_true")]
    pub show_on_dashboard: bool,
    #[serde(default)]
    pub delete_with_reference_object: bool,
    #[serde(default = "default_true")]
    pub reopen_on_change: bool,
    /// Item statuses that trigger an email notification.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notify_on: Vec<ActionStatus>,
}

fn default_true() -> bool {
    true
}

impl ActionDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            reference_model: None,
            related_reference_model: None,
            parent_action_names: Vec::new(),
            next_actions: Vec::new(),
            priority: Priority::default(),
            singleton: false,
            instructions: None,
            create_by_user: true,
            create_by_action: true,
            show_on_dashboard: true,
            delete_with_reference_object: false,
            reopen_on_change: true,
            notify_on: Vec::new(),
        }
    }

    pub fn with_reference_model(mut self, model: impl Into<String>) -> Self {
        self.reference_model = Some(model.into());
        self
    }

    pub fn with_related_reference_model(mut self, model: impl Into<String>) -> Self {
        self.related_reference_model = Some(model.into());
        self
    }

    pub fn with_parents<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parent_action_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_next(mut self, next: NextAction) -> Self {
        self.next_actions.push(next);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn singleton(mut self) -> Self {
        self.singleton = true;
        self
    }

    /// Human readable name, falling back to the action name with
    /// underscores and hyphens replaced by spaces.
    pub fn display_name(&self) -> String {
        self.display_name
            .clone()
            .unwrap_or_else(|| self.name.replace(['_', '-'], " "))
    }

    pub fn accepts_parent(&self, parent_action: &str) -> bool {
        self.parent_action_names.iter().any(|p| p == parent_action)
    }

    /// Names of the actions to spawn once an item closes, filtered by each
    /// entry's condition against the reference fields.
    pub fn next_action_names(&self, fields: &serde_json::Value) -> Vec<String> {
        self.next_actions
            .iter()
            .filter(|n| n.applies_to(fields))
            .map(|n| n.action.resolve(&self.name).to_string())
            .collect()
    }

    pub fn notifies_on(&self, status: ActionStatus) -> bool {
        self.notify_on.contains(&status)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

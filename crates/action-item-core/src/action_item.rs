use crate::definition::ActionDefinition;
use crate::error::{ActionError, Result};
use crate::types::{ActionStatus, Priority};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier prefix for action items.
pub const IDENTIFIER_PREFIX: &str = "AC";

/// Generate a new action identifier: `AC` followed by ten uppercase hex
/// characters. Uniqueness is enforced by the store on insert.
pub fn new_action_identifier() -> String {
    let hex = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("{IDENTIFIER_PREFIX}{}", &hex[..10])
}

// ---------------------------------------------------------------------------
// ActionItem
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionItem {
    pub action_identifier: String,
    pub subject_identifier: String,
    pub action_type: String,
    pub status: ActionStatus,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_action_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_action_identifier: Option<String>,
    #[serde(default)]
    pub linked_to_reference: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_reference_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default)]
    pub auto_created: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_created_comment: Option<String>,
    #[serde(default)]
    pub emailed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emailed_at: Option<DateTime<Utc>>,
    pub report_datetime: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
}

impl ActionItem {
    pub fn new(definition: &ActionDefinition, subject_identifier: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            action_identifier: new_action_identifier(),
            subject_identifier: subject_identifier.into(),
            action_type: definition.name.clone(),
            status: ActionStatus::New,
            priority: definition.priority,
            parent_action_identifier: None,
            related_action_identifier: None,
            linked_to_reference: false,
            reference_model: definition.reference_model.clone(),
            related_reference_model: definition.related_reference_model.clone(),
            instructions: definition.instructions.clone(),
            auto_created: false,
            auto_created_comment: None,
            emailed: false,
            emailed_at: None,
            report_datetime: now,
            created_at: now,
            updated_at: now,
            closed_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status.is_pending()
    }

    /// Move to `target`, enforcing the status state machine. Moving to the
    /// current status is a no-op so that re-saves stay idempotent.
    pub fn transition(&mut self, target: ActionStatus) -> Result<()> {
        if self.status == target {
            return Ok(());
        }
        if !self.status.can_transition_to(target) {
            return Err(ActionError::InvalidTransition {
                from: self.status.to_string(),
                to: target.to_string(),
                reason: format!("action item {} cannot move to {target}", self.action_identifier),
            });
        }
        let now = Utc::now();
        self.status = target;
        self.updated_at = now;
        self.closed_at = match target {
            ActionStatus::Closed => Some(now),
            _ => None,
        };
        Ok(())
    }

    pub fn link_reference(&mut self) {
        self.linked_to_reference = true;
        self.updated_at = Utc::now();
    }

    /// Undo the effect of a reference object: back to NEW and unlinked.
    pub fn reset(&mut self) {
        self.status = ActionStatus::New;
        self.linked_to_reference = false;
        self.closed_at = None;
        self.updated_at = Utc::now();
    }

    pub fn mark_emailed(&mut self) {
        let now = Utc::now();
        self.emailed = true;
        self.emailed_at = Some(now);
        self.updated_at = now;
    }
}

// ---------------------------------------------------------------------------
// ItemFilter
// ---------------------------------------------------------------------------

/// Dashboard-style query over action items. Unset fields match anything.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub subject_identifier: Option<String>,
    pub action_type: Option<String>,
    pub status: Option<ActionStatus>,
    pub parent_action_identifier: Option<String>,
    pub related_action_identifier: Option<String>,
    pub pending_only: bool,
}

impl ItemFilter {
    pub fn subject(subject_identifier: impl Into<String>) -> Self {
        Self {
            subject_identifier: Some(subject_identifier.into()),
            ..Self::default()
        }
    }

    pub fn action_type(mut self, name: impl Into<String>) -> Self {
        self.action_type = Some(name.into());
        self
    }

    pub fn parent(mut self, action_identifier: Option<String>) -> Self {
        self.parent_action_identifier = action_identifier;
        self
    }

    pub fn pending(mut self) -> Self {
        self.pending_only = true;
        self
    }

    pub fn matches(&self, item: &ActionItem) -> bool {
        fn eq(want: &Option<String>, have: &str) -> bool {
            want.as_deref().map(|w| w == have).unwrap_or(true)
        }
        eq(&self.subject_identifier, &item.subject_identifier)
            && eq(&self.action_type, &item.action_type)
            && self.status.map(|s| s == item.status).unwrap_or(true)
            && (!self.pending_only || item.is_pending())
            && self
                .parent_action_identifier
                .as_ref()
                .map(|p| item.parent_action_identifier.as_ref() == Some(p))
                .unwrap_or(true)
            && self
                .related_action_identifier
                .as_ref()
                .map(|r| item.related_action_identifier.as_ref() == Some(r))
                .unwrap_or(true)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

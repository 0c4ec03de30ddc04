//! Explicit workflow events.
//!
//! Saving or deleting a reference object does not trigger side effects
//! directly. It returns `WorkflowEvent`s, which the caller feeds to
//! `EventLoop::run`. Processing an event may produce further events (an item
//! closing spawns `ItemCreated` for its next actions); the loop drains them
//! in FIFO order.

use crate::reference::Reference;
use crate::types::ActionStatus;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    ReferenceCreated {
        reference_model: String,
        identifier: Uuid,
    },
    ReferenceChanged {
        reference_model: String,
        identifier: Uuid,
    },
    /// Carries the removed record since it can no longer be loaded.
    ReferenceDeleted { reference: Reference },
    ItemCreated {
        action_identifier: String,
        action_type: String,
        subject_identifier: String,
    },
    ItemStatusChanged {
        action_identifier: String,
        action_type: String,
        from: ActionStatus,
        to: ActionStatus,
    },
    ItemDeleted {
        action_identifier: String,
        action_type: String,
        subject_identifier: String,
    },
}

impl WorkflowEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowEvent::ReferenceCreated { .. } => "reference_created",
            WorkflowEvent::ReferenceChanged { .. } => "reference_changed",
            WorkflowEvent::ReferenceDeleted { .. } => "reference_deleted",
            WorkflowEvent::ItemCreated { .. } => "item_created",
            WorkflowEvent::ItemStatusChanged { .. } => "item_status_changed",
            WorkflowEvent::ItemDeleted { .. } => "item_deleted",
        }
    }

    /// The item status a notifier should react to, if this is an item event
    /// that leaves the item in place.
    pub fn notify_status(&self) -> Option<(&str, ActionStatus)> {
        match self {
            WorkflowEvent::ItemCreated {
                action_identifier, ..
            } => Some((action_identifier.as_str(), ActionStatus::New)),
            WorkflowEvent::ItemStatusChanged {
                action_identifier,
                to,
                ..
            } => Some((action_identifier.as_str(), *to)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// EventReport
// ---------------------------------------------------------------------------

/// What an `EventLoop::run` did, in processing order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventReport {
    pub processed: Vec<WorkflowEvent>,
    pub notifications_sent: usize,
    pub notification_failures: usize,
}

impl EventReport {
    pub fn created(&self) -> Vec<&str> {
        self.processed
            .iter()
            .filter_map(|e| match e {
                WorkflowEvent::ItemCreated {
                    action_identifier, ..
                } => Some(action_identifier.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn transitions(&self) -> Vec<(&str, ActionStatus, ActionStatus)> {
        self.processed
            .iter()
            .filter_map(|e| match e {
                WorkflowEvent::ItemStatusChanged {
                    action_identifier,
                    from,
                    to,
                    ..
                } => Some((action_identifier.as_str(), *from, *to)),
                _ => None,
            })
            .collect()
    }

    pub fn deleted(&self) -> Vec<&str> {
        self.processed
            .iter()
            .filter_map(|e| match e {
                WorkflowEvent::ItemDeleted {
                    action_identifier, ..
                } => Some(action_identifier.as_str()),
                _ => None,
            })
            .collect()
    }
}

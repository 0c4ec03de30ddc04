use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ActionStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    New,
    Open,
    Closed,
    Cancelled,
}

impl ActionStatus {
    pub fn all() -> &'static [ActionStatus] {
        &[
            ActionStatus::New,
            ActionStatus::Open,
            ActionStatus::Closed,
            ActionStatus::Cancelled,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionStatus::New => "new",
            ActionStatus::Open => "open",
            ActionStatus::Closed => "closed",
            ActionStatus::Cancelled => "cancelled",
        }
    }

    /// New and open items are still waiting on their reference object.
    pub fn is_pending(self) -> bool {
        matches!(self, ActionStatus::New | ActionStatus::Open)
    }

    pub fn can_transition_to(self, target: ActionStatus) -> bool {
        use ActionStatus::*;
        matches!(
            (self, target),
            (New, Open) | (New, Closed) | (Open, Closed) | (Closed, Open) | (New, Cancelled)
                | (Open, Cancelled)
        )
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionStatus {
    type Err = crate::error::ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(ActionStatus::New),
            "open" => Ok(ActionStatus::Open),
            "closed" => Ok(ActionStatus::Closed),
            "cancelled" | "canceled" => Ok(ActionStatus::Cancelled),
            _ => Err(crate::error::ActionError::InvalidStatus(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = crate::error::ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            _ => Err(crate::error::ActionError::InvalidPriority(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

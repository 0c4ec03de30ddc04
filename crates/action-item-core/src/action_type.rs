use crate::definition::ActionDefinition;
use crate::types::Priority;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted mirror of an `ActionDefinition`'s class-level metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionType {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub reference_model: Option<String>,
    #[serde(default)]
    pub related_reference_model: Option<String>,
    pub priority: Priority,
    #[serde(default)]
    pub instructions: Option<String>,
    pub create_by_user: bool,
    pub create_by_action: bool,
    pub show_on_dashboard: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ActionType {
    pub fn from_definition(definition: &ActionDefinition) -> Self {
        let now = Utc::now();
        Self {
            name: definition.name.clone(),
            display_name: definition.display_name(),
            reference_model: definition.reference_model.clone(),
            related_reference_model: definition.related_reference_model.clone(),
            priority: definition.priority,
            instructions: definition.instructions.clone(),
            create_by_user: definition.create_by_user,
            create_by_action: definition.create_by_action,
            show_on_dashboard: definition.show_on_dashboard,
            created_at: now,
            updated_at: now,
        }
    }

    /// Copy the definition's metadata onto an existing row. Returns true if
    /// anything changed.
    pub fn refresh(&mut self, definition: &ActionDefinition) -> bool {
        let fresh = Self::from_definition(definition);
        let changed = self.display_name != fresh.display_name
            || self.reference_model != fresh.reference_model
            || self.related_reference_model != fresh.related_reference_model
            || self.priority != fresh.priority
            || self.instructions != fresh.instructions
            || self.create_by_user != fresh.create_by_user
            || self.create_by_action != fresh.create_by_action
            || self.show_on_dashboard != fresh.show_on_dashboard;
        if changed {
            *self = Self {
                created_at: self.created_at,
                ..fresh
            };
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_detects_changes_and_keeps_created_at() {
        let def = ActionDefinition::new("death_report");
        let mut row = ActionType::from_definition(&def);
        let created = row.created_at;
        assert!(!row.refresh(&def));

        let def = def.with_priority(Priority::High);
        assert!(row.refresh(&def));
        assert_eq!(row.priority, Priority::High);
        assert_eq!(row.created_at, created);
    }
}

//! The site registry: an explicit catalog of action definitions.
//!
//! A `SiteActionItems` is built once at startup (usually from config) and
//! passed by reference to everything that needs to resolve an action by
//! name or by reference model.

use crate::db::{ActionDb, Upsert};
use crate::definition::{ActionDefinition, NextTarget};
use crate::error::{ActionError, Result};
use crate::paths;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct SiteActionItems {
    registry: BTreeMap<String, ActionDefinition>,
}

/// Counts from `populate_action_types`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct PopulateSummary {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl SiteActionItems {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every definition, then validate the whole catalog.
    pub fn from_definitions<I>(definitions: I) -> Result<Self>
    where
        I: IntoIterator<Item = ActionDefinition>,
    {
        let mut site = Self::new();
        for definition in definitions {
            site.register(definition)?;
        }
        site.validate()?;
        Ok(site)
    }

    /// Add one definition. Rejects duplicates and malformed names; cross
    /// references between definitions are checked by `validate`.
    pub fn register(&mut self, definition: ActionDefinition) -> Result<()> {
        paths::validate_name(&definition.name)?;
        if let Some(model) = &definition.reference_model {
            paths::validate_model_label(model)?;
        }
        if self.registry.contains_key(&definition.name) {
            return Err(ActionError::AlreadyRegistered(definition.name));
        }
        tracing::debug!(action = %definition.name, "registered action");
        self.registry.insert(definition.name.clone(), definition);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&ActionDefinition> {
        self.registry
            .get(name)
            .ok_or_else(|| ActionError::ActionNotRegistered(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry.contains_key(name)
    }

    /// The action whose reference model is `model`.
    pub fn get_by_reference_model(&self, model: &str) -> Result<&ActionDefinition> {
        self.registry
            .values()
            .find(|d| d.reference_model.as_deref() == Some(model))
            .ok_or_else(|| ActionError::ActionNotRegistered(format!("reference model {model}")))
    }

    pub fn definitions(&self) -> impl Iterator<Item = &ActionDefinition> {
        self.registry.values()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Check the catalog is closed and consistent:
    /// - every parent and next-action name is registered;
    /// - every next action may be created by an action and lists its
    ///   spawner among its permitted parents;
    /// - no two actions share a reference model.
    pub fn validate(&self) -> Result<()> {
        let mut models: BTreeMap<&str, &str> = BTreeMap::new();

        for def in self.registry.values() {
            for parent in &def.parent_action_names {
                if !self.contains(parent) {
                    return Err(invalid(def, format!("unknown parent action '{parent}'")));
                }
            }

            for next in &def.next_actions {
                let target_name = next.action.resolve(&def.name);
                let target = self
                    .registry
                    .get(target_name)
                    .ok_or_else(|| invalid(def, format!("unknown next action '{target_name}'")))?;
                let label = match &next.action {
                    NextTarget::Current => "self".to_string(),
                    NextTarget::Named(n) => n.clone(),
                };
                if !target.create_by_action {
                    return Err(invalid(
                        def,
                        format!("next action '{label}' cannot be created by an action"),
                    ));
                }
                if !target.accepts_parent(&def.name) {
                    return Err(invalid(
                        def,
                        format!(
                            "next action '{label}' does not list '{}' in parent_action_names",
                            def.name
                        ),
                    ));
                }
            }

            if let Some(model) = def.reference_model.as_deref() {
                if let Some(other) = models.insert(model, &def.name) {
                    return Err(invalid(
                        def,
                        format!("reference model '{model}' is already used by '{other}'"),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Upsert an action type row for every registered definition.
    pub fn populate_action_types(&self, db: &ActionDb) -> Result<PopulateSummary> {
        let mut summary = PopulateSummary::default();
        for def in self.registry.values() {
            match db.upsert_action_type(def)?.1 {
                Upsert::Created => summary.created += 1,
                Upsert::Updated => summary.updated += 1,
                Upsert::Unchanged => summary.unchanged += 1,
            }
        }
        tracing::info!(
            created = summary.created,
            updated = summary.updated,
            "populated action types"
        );
        Ok(summary)
    }
}

fn invalid(def: &ActionDefinition, reason: String) -> ActionError {
    ActionError::InvalidRegistration {
        name: def.name.clone(),
        reason,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

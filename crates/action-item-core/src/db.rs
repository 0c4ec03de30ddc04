//! Persistent storage for action types, action items, reference objects and
//! registered subjects using redb.
//!
//! # Table design
//!
//! Every table maps a string key to a JSON-encoded value:
//! ```text
//! action_types  name                      -> ActionType
//! action_items  action_identifier         -> ActionItem
//! references    "<model>:<uuid>"          -> Reference
//! subjects      subject_identifier        -> RegisteredSubject
//! ```
//!
//! Each mutation runs in its own write transaction. Uniqueness of
//! `action_identifier` and the singleton rule are checked inside the same
//! transaction that inserts the item.

use std::fmt::Display;
use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::action_item::{ActionItem, ItemFilter};
use crate::action_type::ActionType;
use crate::definition::ActionDefinition;
use crate::error::{ActionError, Result};
use crate::reference::{Reference, RegisteredSubject};
use crate::types::ActionStatus;

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

/// Key: string identifier. Value: JSON-encoded record.
type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

const ACTION_TYPES: JsonTable = TableDefinition::new("action_types");
const ACTION_ITEMS: JsonTable = TableDefinition::new("action_items");
const REFERENCES: JsonTable = TableDefinition::new("references");
const SUBJECTS: JsonTable = TableDefinition::new("subjects");

fn db_err<E: Display>(e: E) -> ActionError {
    ActionError::Db(e.to_string())
}

fn reference_key(model: &str, identifier: Uuid) -> String {
    format!("{model}:{identifier}")
}

/// Result of an action type upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Created,
    Updated,
    Unchanged,
}

// ---------------------------------------------------------------------------
// ActionDb
// ---------------------------------------------------------------------------

pub struct ActionDb {
    db: Database,
}

impl ActionDb {
    /// Open or create the redb database at `path`, creating every table.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(db_err)?;
        let wt = db.begin_write().map_err(db_err)?;
        for table in [ACTION_TYPES, ACTION_ITEMS, REFERENCES, SUBJECTS] {
            wt.open_table(table).map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(Self { db })
    }

    // -----------------------------------------------------------------------
    // Generic helpers
    // -----------------------------------------------------------------------

    fn get_json<T: DeserializeOwned>(
        &self,
        table: JsonTable,
        key: &str,
    ) -> Result<Option<T>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let t = rt.open_table(table).map_err(db_err)?;
        match t.get(key).map_err(db_err)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(
        &self,
        table: JsonTable,
        key: &str,
        value: &T,
    ) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut t = wt.open_table(table).map_err(db_err)?;
            t.insert(key, bytes.as_slice()).map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(())
    }

    fn remove_key(&self, table: JsonTable, key: &str) -> Result<bool> {
        let wt = self.db.begin_write().map_err(db_err)?;
        let removed = {
            let mut t = wt.open_table(table).map_err(db_err)?;
            let old = t.remove(key).map_err(db_err)?;
            old.is_some()
        };
        wt.commit().map_err(db_err)?;
        Ok(removed)
    }

    fn scan<T: DeserializeOwned>(&self, table: JsonTable) -> Result<Vec<T>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let t = rt.open_table(table).map_err(db_err)?;
        let mut result = Vec::new();
        for entry in t.iter().map_err(db_err)? {
            let (_, v) = entry.map_err(db_err)?;
            result.push(serde_json::from_slice(v.value())?);
        }
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Action types
    // -----------------------------------------------------------------------

    /// Create or refresh the action type row for `definition`.
    pub fn upsert_action_type(&self, definition: &ActionDefinition) -> Result<(ActionType, Upsert)> {
        match self.get_action_type(&definition.name)? {
            Some(mut existing) => {
                if existing.refresh(definition) {
                    self.put_json(ACTION_TYPES, &existing.name, &existing)?;
                    Ok((existing, Upsert::Updated))
                } else {
                    Ok((existing, Upsert::Unchanged))
                }
            }
            None => {
                let row = ActionType::from_definition(definition);
                self.put_json(ACTION_TYPES, &row.name, &row)?;
                Ok((row, Upsert::Created))
            }
        }
    }

    pub fn get_action_type(&self, name: &str) -> Result<Option<ActionType>> {
        self.get_json(ACTION_TYPES, name)
    }

    pub fn list_action_types(&self) -> Result<Vec<ActionType>> {
        self.scan(ACTION_TYPES)
    }

    // -----------------------------------------------------------------------
    // Action items
    // -----------------------------------------------------------------------

    /// Insert a new action item.
    ///
    /// Fails with `ActionItemExists` if the identifier is taken and with
    /// `SingletonViolation` if `singleton` is set and the subject already has
    /// a non-cancelled item of the same action type.
    pub fn insert_item(&self, item: &ActionItem, singleton: bool) -> Result<()> {
        let bytes = serde_json::to_vec(item)?;
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut t = wt.open_table(ACTION_ITEMS).map_err(db_err)?;
            if t.get(item.action_identifier.as_str())
                .map_err(db_err)?
                .is_some()
            {
                return Err(ActionError::ActionItemExists(item.action_identifier.clone()));
            }
            if singleton {
                let mut taken = false;
                for entry in t.iter().map_err(db_err)? {
                    let (_, v) = entry.map_err(db_err)?;
                    let other: ActionItem = serde_json::from_slice(v.value())?;
                    if other.subject_identifier == item.subject_identifier
                        && other.action_type == item.action_type
                        && other.status != ActionStatus::Cancelled
                    {
                        taken = true;
                        break;
                    }
                }
                if taken {
                    return Err(ActionError::SingletonViolation {
                        action: item.action_type.clone(),
                        subject_identifier: item.subject_identifier.clone(),
                    });
                }
            }
            t.insert(item.action_identifier.as_str(), bytes.as_slice())
                .map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(())
    }

    /// Overwrite an existing action item.
    pub fn update_item(&self, item: &ActionItem) -> Result<()> {
        if self.get_item(&item.action_identifier)?.is_none() {
            return Err(ActionError::ActionItemNotFound(item.action_identifier.clone()));
        }
        self.put_json(ACTION_ITEMS, &item.action_identifier, item)
    }

    pub fn get_item(&self, action_identifier: &str) -> Result<Option<ActionItem>> {
        self.get_json(ACTION_ITEMS, action_identifier)
    }

    pub fn find_item(&self, action_identifier: &str) -> Result<ActionItem> {
        self.get_item(action_identifier)?
            .ok_or_else(|| ActionError::ActionItemNotFound(action_identifier.to_string()))
    }

    /// Items matching `filter`, oldest first.
    pub fn list_items(&self, filter: &ItemFilter) -> Result<Vec<ActionItem>> {
        let mut items: Vec<ActionItem> = self
            .scan::<ActionItem>(ACTION_ITEMS)?
            .into_iter()
            .filter(|i| filter.matches(i))
            .collect();
        items.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.action_identifier.cmp(&b.action_identifier))
        });
        Ok(items)
    }

    /// Items that name `action_identifier` as their parent.
    pub fn children_of(&self, action_identifier: &str) -> Result<Vec<ActionItem>> {
        let filter = ItemFilter {
            parent_action_identifier: Some(action_identifier.to_string()),
            ..ItemFilter::default()
        };
        self.list_items(&filter)
    }

    /// Remove an item row without any protection checks. Callers go through
    /// `Workflow::delete_item`, which enforces them.
    pub(crate) fn remove_item(&self, action_identifier: &str) -> Result<bool> {
        self.remove_key(ACTION_ITEMS, action_identifier)
    }

    // -----------------------------------------------------------------------
    // References
    // -----------------------------------------------------------------------

    /// Store a reference object, returning the previously stored version.
    pub fn save_reference(&self, reference: &Reference) -> Result<Option<Reference>> {
        let key = reference_key(&reference.reference_model, reference.identifier);
        let previous = self.get_json(REFERENCES, &key)?;
        self.put_json(REFERENCES, &key, reference)?;
        Ok(previous)
    }

    pub fn get_reference(&self, model: &str, identifier: Uuid) -> Result<Option<Reference>> {
        self.get_json(REFERENCES, &reference_key(model, identifier))
    }

    pub fn remove_reference(&self, model: &str, identifier: Uuid) -> Result<bool> {
        self.remove_key(REFERENCES, &reference_key(model, identifier))
    }

    pub fn list_references(&self) -> Result<Vec<Reference>> {
        let mut refs: Vec<Reference> = self.scan(REFERENCES)?;
        refs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(refs)
    }

    /// The reference object linked to `action_identifier`, if any.
    pub fn reference_for_item(&self, action_identifier: &str) -> Result<Option<Reference>> {
        Ok(self
            .list_references()?
            .into_iter()
            .find(|r| r.action_identifier.as_deref() == Some(action_identifier)))
    }

    // -----------------------------------------------------------------------
    // Registered subjects
    // -----------------------------------------------------------------------

    pub fn add_subject(&self, subject: &RegisteredSubject) -> Result<()> {
        if self.get_subject(&subject.subject_identifier)?.is_some() {
            return Err(ActionError::SubjectExists(subject.subject_identifier.clone()));
        }
        self.put_json(SUBJECTS, &subject.subject_identifier, subject)
    }

    pub fn get_subject(&self, subject_identifier: &str) -> Result<Option<RegisteredSubject>> {
        self.get_json(SUBJECTS, subject_identifier)
    }

    pub fn require_subject(&self, subject_identifier: &str) -> Result<RegisteredSubject> {
        self.get_subject(subject_identifier)?
            .ok_or_else(|| ActionError::SubjectNotFound(subject_identifier.to_string()))
    }

    pub fn list_subjects(&self) -> Result<Vec<RegisteredSubject>> {
        let mut subjects: Vec<RegisteredSubject> = self.scan(SUBJECTS)?;
        subjects.sort_by(|a, b| a.subject_identifier.cmp(&b.subject_identifier));
        Ok(subjects)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

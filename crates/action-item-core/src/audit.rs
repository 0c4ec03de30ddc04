//! Integrity audit over the store.
//!
//! Finds links that no longer resolve (parents, related items, reference
//! objects) and items whose state disagrees with their reference object.
//! `repair` fixes the cases that have an unambiguous fix.

use crate::db::ActionDb;
use crate::error::Result;
use crate::registry::SiteActionItems;
use crate::types::ActionStatus;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    DanglingParent {
        action_identifier: String,
        parent_action_identifier: String,
    },
    DanglingRelated {
        action_identifier: String,
        related_action_identifier: String,
    },
    /// A reference object whose action identifier matches no item.
    ReferenceWithoutItem {
        reference_model: String,
        identifier: Uuid,
        action_identifier: String,
    },
    /// An item flagged as linked whose reference object is gone.
    LinkedWithoutReference { action_identifier: String },
    /// Closed by hand although its action expects a reference object.
    ClosedWithoutReference { action_identifier: String },
    UnknownActionType {
        action_identifier: String,
        action_type: String,
    },
}

impl Finding {
    pub fn is_repairable(&self) -> bool {
        !matches!(
            self,
            Finding::ClosedWithoutReference { .. } | Finding::UnknownActionType { .. }
        )
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::DanglingParent {
                action_identifier,
                parent_action_identifier,
            } => write!(
                f,
                "{action_identifier}: parent {parent_action_identifier} does not exist"
            ),
            Finding::DanglingRelated {
                action_identifier,
                related_action_identifier,
            } => write!(
                f,
                "{action_identifier}: related item {related_action_identifier} does not exist"
            ),
            Finding::ReferenceWithoutItem {
                reference_model,
                identifier,
                action_identifier,
            } => write!(
                f,
                "{reference_model}:{identifier}: action item {action_identifier} does not exist"
            ),
            Finding::LinkedWithoutReference { action_identifier } => {
                write!(f, "{action_identifier}: linked reference object is missing")
            }
            Finding::ClosedWithoutReference { action_identifier } => {
                write!(f, "{action_identifier}: closed without a reference object")
            }
            Finding::UnknownActionType {
                action_identifier,
                action_type,
            } => write!(f, "{action_identifier}: action '{action_type}' is not registered"),
        }
    }
}

/// Scan the store. `site` enables the checks that need definitions.
pub fn audit(db: &ActionDb, site: Option<&SiteActionItems>) -> Result<Vec<Finding>> {
    let items = db.list_items(&Default::default())?;
    let references = db.list_references()?;

    let item_ids: BTreeSet<&str> = items.iter().map(|i| i.action_identifier.as_str()).collect();
    let referenced: BTreeSet<&str> = references
        .iter()
        .filter_map(|r| r.action_identifier.as_deref())
        .collect();

    let mut findings = Vec::new();
    for item in &items {
        let id = &item.action_identifier;
        if let Some(parent) = &item.parent_action_identifier {
            if !item_ids.contains(parent.as_str()) {
                findings.push(Finding::DanglingParent {
                    action_identifier: id.clone(),
                    parent_action_identifier: parent.clone(),
                });
            }
        }
        if let Some(related) = &item.related_action_identifier {
            if !item_ids.contains(related.as_str()) {
                findings.push(Finding::DanglingRelated {
                    action_identifier: id.clone(),
                    related_action_identifier: related.clone(),
                });
            }
        }

        let has_reference = referenced.contains(id.as_str());
        if item.linked_to_reference && !has_reference {
            findings.push(Finding::LinkedWithoutReference {
                action_identifier: id.clone(),
            });
        }

        if let Some(site) = site {
            match site.get(&item.action_type) {
                Ok(def) => {
                    if item.status == ActionStatus::Closed
                        && def.reference_model.is_some()
                        && !has_reference
                        && !item.linked_to_reference
                    {
                        findings.push(Finding::ClosedWithoutReference {
                            action_identifier: id.clone(),
                        });
                    }
                }
                Err(_) => findings.push(Finding::UnknownActionType {
                    action_identifier: id.clone(),
                    action_type: item.action_type.clone(),
                }),
            }
        }
    }

    for reference in &references {
        if let Some(id) = &reference.action_identifier {
            if !item_ids.contains(id.as_str()) {
                findings.push(Finding::ReferenceWithoutItem {
                    reference_model: reference.reference_model.clone(),
                    identifier: reference.identifier,
                    action_identifier: id.clone(),
                });
            }
        }
    }

    Ok(findings)
}

/// Apply the fix for each repairable finding; returns the ones fixed.
pub fn repair(db: &ActionDb, findings: &[Finding]) -> Result<Vec<Finding>> {
    let mut fixed = Vec::new();
    for finding in findings {
        let applied = match finding {
            Finding::DanglingParent {
                action_identifier, ..
            } => update_item(db, action_identifier, |item| {
                item.parent_action_identifier = None;
            })?,
            Finding::DanglingRelated {
                action_identifier, ..
            } => update_item(db, action_identifier, |item| {
                item.related_action_identifier = None;
            })?,
            Finding::LinkedWithoutReference { action_identifier } => {
                update_item(db, action_identifier, |item| item.reset())?
            }
            Finding::ReferenceWithoutItem {
                reference_model,
                identifier,
                ..
            } => match db.get_reference(reference_model, *identifier)? {
                Some(mut reference) => {
                    reference.action_identifier = None;
                    db.save_reference(&reference)?;
                    true
                }
                None => false,
            },
            Finding::ClosedWithoutReference { .. } | Finding::UnknownActionType { .. } => false,
        };
        if applied {
            tracing::info!(finding = %finding, "repaired");
            fixed.push(finding.clone());
        }
    }
    Ok(fixed)
}

fn update_item(
    db: &ActionDb,
    action_identifier: &str,
    apply: impl FnOnce(&mut crate::action_item::ActionItem),
) -> Result<bool> {
    let Some(mut item) = db.get_item(action_identifier)? else {
        return Ok(false);
    };
    apply(&mut item);
    db.update_item(&item)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action_item::ActionItem;
    use crate::definition::ActionDefinition;
    use crate::reference::Reference;
    use tempfile::TempDir;

    fn open_tmp() -> (TempDir, ActionDb) {
        let dir = TempDir::new().unwrap();
        let db = ActionDb::open(&dir.path().join("test.redb")).unwrap();
        (dir, db)
    }

    #[test]
    fn clean_store_has_no_findings() {
        let (_dir, db) = open_tmp();
        db.insert_item(&ActionItem::new(&ActionDefinition::new("a"), "S-1"), false)
            .unwrap();
        assert!(audit(&db, None).unwrap().is_empty());
    }

    #[test]
    fn detects_and_repairs_dangling_links() {
        let (_dir, db) = open_tmp();
        let mut item = ActionItem::new(&ActionDefinition::new("ae_followup"), "S-1");
        item.parent_action_identifier = Some("AC0000000000".into());
        item.related_action_identifier = Some("AC0000000000".into());
        item.status = ActionStatus::Closed;
        item.linked_to_reference = true;
        db.insert_item(&item, false).unwrap();

        let findings = audit(&db, None).unwrap();
        assert_eq!(findings.len(), 3);
        assert!(findings.iter().all(Finding::is_repairable));

        let fixed = repair(&db, &findings).unwrap();
        assert_eq!(fixed.len(), 3);
        let stored = db.find_item(&item.action_identifier).unwrap();
        assert!(stored.parent_action_identifier.is_none());
        assert!(stored.related_action_identifier.is_none());
        assert_eq!(stored.status, ActionStatus::New);
        assert!(audit(&db, None).unwrap().is_empty());
    }

    #[test]
    fn detects_reference_pointing_at_missing_item() {
        let (_dir, db) = open_tmp();
        let r = Reference::new("adverse_event.ae_initial", "S-1")
            .with_action_identifier("AC0000000000");
        db.save_reference(&r).unwrap();

        let findings = audit(&db, None).unwrap();
        assert!(matches!(findings[0], Finding::ReferenceWithoutItem { .. }));
        repair(&db, &findings).unwrap();
        let stored = db.get_reference(&r.reference_model, r.identifier).unwrap().unwrap();
        assert!(stored.action_identifier.is_none());
    }

    #[test]
    fn registry_checks_need_a_site() {
        let (_dir, db) = open_tmp();
        let def = ActionDefinition::new("ae_initial").with_reference_model("adverse_event.ae_initial");
        let mut closed = ActionItem::new(&def, "S-1");
        closed.status = ActionStatus::Closed;
        db.insert_item(&closed, false).unwrap();
        db.insert_item(&ActionItem::new(&ActionDefinition::new("retired"), "S-1"), false)
            .unwrap();

        let site = SiteActionItems::from_definitions(vec![def]).unwrap();
        let findings = audit(&db, Some(&site)).unwrap();
        assert_eq!(findings.len(), 2);
        assert!(findings.iter().all(|f| !f.is_repairable()));
        assert!(repair(&db, &findings).unwrap().is_empty());
        assert!(audit(&db, None).unwrap().is_empty());
    }
}

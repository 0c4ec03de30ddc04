//! The workflow facade and its event loop.
//!
//! `Workflow` methods perform a single mutation and return the events it
//! produced. `EventLoop::run` applies the consequences: a saved reference
//! closes its item and cascades, an edited one reopens it, a deleted one
//! resets or removes it, and item events are offered to the notifier.

use std::collections::VecDeque;

use chrono::Utc;
use uuid::Uuid;

use crate::action::{Action, ActionContext, ActionOptions};
use crate::action_item::{ActionItem, ItemFilter};
use crate::db::ActionDb;
use crate::error::{ActionError, Result};
use crate::events::{EventReport, WorkflowEvent};
use crate::notification::ActionItemNotifier;
use crate::reference::Reference;
use crate::registry::SiteActionItems;
use crate::types::ActionStatus;

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
pub struct Workflow<'a> {
    ctx: ActionContext<'a>,
}

impl<'a> Workflow<'a> {
    pub fn new(db: &'a ActionDb, site: &'a SiteActionItems) -> Self {
        Self {
            ctx: ActionContext::new(db, site),
        }
    }

    pub fn context(&self) -> ActionContext<'a> {
        self.ctx
    }

    // -----------------------------------------------------------------------
    // Reference objects
    // -----------------------------------------------------------------------

    /// Persist a reference object and attach it to its action item,
    /// creating the item if the subject has none. The item is not closed
    /// here; that happens when the returned events are run.
    ///
    /// The reference and item are committed before the events run. If the
    /// event loop fails, the item stays NEW with the reference linked to it;
    /// saving the reference again closes it and cascades.
    pub fn save_reference(
        &self,
        mut reference: Reference,
    ) -> Result<(Reference, Vec<WorkflowEvent>)> {
        let definition = self
            .ctx
            .site
            .get_by_reference_model(&reference.reference_model)?;
        let previous = self
            .ctx
            .db
            .get_reference(&reference.reference_model, reference.identifier)?;

        if let Some(prev) = &previous {
            if prev.action_identifier.is_some() {
                reference.action_identifier = prev.action_identifier.clone();
            }
            reference.created_at = prev.created_at;
        }

        let opts = ActionOptions::for_subject(reference.subject_identifier.clone())
            .parent(reference.parent_action_identifier.clone())
            .related(reference.related_action_identifier.clone())
            .reference(reference.clone())
            .readonly();
        let action = Action::new(self.ctx, definition, opts)?;
        let item = action.item().clone();

        if let Some(linked) = self.ctx.db.reference_for_item(&item.action_identifier)? {
            if linked.reference_model != reference.reference_model
                || linked.identifier != reference.identifier
            {
                return Err(ActionError::AlreadyLinked {
                    action_identifier: item.action_identifier,
                    reference: format!("{}:{}", linked.reference_model, linked.identifier),
                });
            }
        }

        reference.action_identifier = Some(item.action_identifier.clone());
        reference.parent_action_identifier = item.parent_action_identifier.clone();
        reference.related_action_identifier = item.related_action_identifier.clone();
        reference.updated_at = Utc::now();
        self.ctx.db.save_reference(&reference)?;

        tracing::info!(
            reference_model = %reference.reference_model,
            identifier = %reference.identifier,
            action_identifier = %item.action_identifier,
            "saved reference"
        );

        let mut events = action.into_events();
        events.push(match previous {
            None => WorkflowEvent::ReferenceCreated {
                reference_model: reference.reference_model.clone(),
                identifier: reference.identifier,
            },
            Some(_) => WorkflowEvent::ReferenceChanged {
                reference_model: reference.reference_model.clone(),
                identifier: reference.identifier,
            },
        });
        Ok((reference, events))
    }

    pub fn delete_reference(&self, model: &str, identifier: Uuid) -> Result<Vec<WorkflowEvent>> {
        let reference = self.require_reference(model, identifier)?;
        self.ctx.db.remove_reference(model, identifier)?;
        tracing::info!(reference_model = %model, identifier = %identifier, "deleted reference");
        Ok(vec![WorkflowEvent::ReferenceDeleted { reference }])
    }

    fn require_reference(&self, model: &str, identifier: Uuid) -> Result<Reference> {
        self.ctx
            .db
            .get_reference(model, identifier)?
            .ok_or_else(|| ActionError::ReferenceNotFound {
                model: model.to_string(),
                identifier: identifier.to_string(),
            })
    }

    // -----------------------------------------------------------------------
    // Action items
    // -----------------------------------------------------------------------

    /// Create an item by hand. Always inserts; singletons fail if the
    /// subject already has one.
    pub fn create_item(
        &self,
        action: &str,
        subject_identifier: &str,
        parent_action_identifier: Option<String>,
        related_action_identifier: Option<String>,
    ) -> Result<(ActionItem, Vec<WorkflowEvent>)> {
        let definition = self.ctx.site.get(action)?;
        if !definition.create_by_user {
            return Err(ActionError::NotCreatableByUser(action.to_string()));
        }
        let opts = ActionOptions::for_subject(subject_identifier)
            .parent(parent_action_identifier)
            .related(related_action_identifier);
        let action = Action::create(self.ctx, definition, opts)?;
        let item = action.item().clone();
        Ok((item, action.into_events()))
    }

    /// Close an item and spawn its next actions, using the linked reference
    /// object's fields when there is one.
    pub fn close_item(&self, action_identifier: &str) -> Result<(ActionItem, Vec<WorkflowEvent>)> {
        let mut action = self.load(action_identifier)?;
        action.close_and_create_next()?;
        let item = action.item().clone();
        Ok((item, action.into_events()))
    }

    pub fn reopen_item(&self, action_identifier: &str) -> Result<(ActionItem, Vec<WorkflowEvent>)> {
        let mut action = self.load(action_identifier)?;
        action.reopen()?;
        let item = action.item().clone();
        Ok((item, action.into_events()))
    }

    pub fn cancel_item(&self, action_identifier: &str) -> Result<(ActionItem, Vec<WorkflowEvent>)> {
        let mut action = self.load(action_identifier)?;
        action.cancel()?;
        let item = action.item().clone();
        Ok((item, action.into_events()))
    }

    fn load(&self, action_identifier: &str) -> Result<Action<'a>> {
        let item = self.ctx.db.find_item(action_identifier)?;
        let definition = self.ctx.site.get(&item.action_type)?;
        let mut opts = ActionOptions::for_subject(item.subject_identifier.clone())
            .action_item(item)
            .readonly();
        if let Some(reference) = self.ctx.db.reference_for_item(action_identifier)? {
            opts = opts.reference(reference);
        }
        Action::new(self.ctx, definition, opts)
    }

    /// Delete an item. Only NEW items with no children and no linked
    /// reference object may be deleted.
    pub fn delete_item(&self, action_identifier: &str) -> Result<Vec<WorkflowEvent>> {
        let item = self.ctx.db.find_item(action_identifier)?;
        let refuse = |reason: String| ActionError::ActionItemDelete {
            action_identifier: action_identifier.to_string(),
            reason,
        };
        if item.status != ActionStatus::New {
            return Err(refuse(format!("status is {}", item.status)));
        }
        if !self.ctx.db.children_of(action_identifier)?.is_empty() {
            return Err(refuse("item has child action items".to_string()));
        }
        if let Some(r) = self.ctx.db.reference_for_item(action_identifier)? {
            return Err(refuse(format!(
                "item is linked to reference {}:{}",
                r.reference_model, r.identifier
            )));
        }
        Ok(vec![remove(self.ctx.db, item)?])
    }

    /// Delete the subject's NEW item for `action`.
    pub fn delete_action_item(
        &self,
        action: &str,
        subject_identifier: &str,
    ) -> Result<Vec<WorkflowEvent>> {
        self.ctx.site.get(action)?;
        let filter = ItemFilter {
            status: Some(ActionStatus::New),
            ..ItemFilter::subject(subject_identifier).action_type(action)
        };
        let items = self.ctx.db.list_items(&filter)?;
        if items.is_empty() {
            return Err(ActionError::ActionItemDelete {
                action_identifier: action.to_string(),
                reason: format!("no NEW action item for subject {subject_identifier}"),
            });
        }
        let mut events = Vec::new();
        for item in items {
            events.extend(self.delete_item(&item.action_identifier)?);
        }
        Ok(events)
    }
}

fn remove(db: &ActionDb, item: ActionItem) -> Result<WorkflowEvent> {
    db.remove_item(&item.action_identifier)?;
    tracing::info!(action_identifier = %item.action_identifier, "deleted action item");
    Ok(WorkflowEvent::ItemDeleted {
        action_identifier: item.action_identifier,
        action_type: item.action_type,
        subject_identifier: item.subject_identifier,
    })
}

// ---------------------------------------------------------------------------
// EventLoop
// ---------------------------------------------------------------------------

pub struct EventLoop<'a> {
    ctx: ActionContext<'a>,
    notifier: Option<&'a ActionItemNotifier>,
}

impl<'a> EventLoop<'a> {
    pub fn new(db: &'a ActionDb, site: &'a SiteActionItems) -> Self {
        Self {
            ctx: ActionContext::new(db, site),
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Option<&'a ActionItemNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Process `events` and everything they cause, first in first out.
    pub fn run(&self, events: Vec<WorkflowEvent>) -> Result<EventReport> {
        let mut queue: VecDeque<WorkflowEvent> = events.into();
        let mut report = EventReport::default();

        while let Some(event) = queue.pop_front() {
            tracing::debug!(kind = event.kind(), "processing event");
            let follow_up = match &event {
                WorkflowEvent::ReferenceCreated {
                    reference_model,
                    identifier,
                } => self.on_reference_created(reference_model, *identifier)?,
                WorkflowEvent::ReferenceChanged {
                    reference_model,
                    identifier,
                } => self.on_reference_changed(reference_model, *identifier)?,
                WorkflowEvent::ReferenceDeleted { reference } => {
                    self.on_reference_deleted(reference)?
                }
                _ => {
                    self.notify(&event, &mut report);
                    Vec::new()
                }
            };
            report.processed.push(event);
            queue.extend(follow_up);
        }
        Ok(report)
    }

    fn notify(&self, event: &WorkflowEvent, report: &mut EventReport) {
        let Some(notifier) = self.notifier else {
            return;
        };
        match notifier.notify(self.ctx.db, self.ctx.site, event) {
            Ok(true) => report.notifications_sent += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(kind = event.kind(), error = %e, "notification failed");
                report.notification_failures += 1;
            }
        }
    }

    fn load_reference(&self, model: &str, identifier: Uuid) -> Result<Reference> {
        self.ctx
            .db
            .get_reference(model, identifier)?
            .ok_or_else(|| ActionError::ReferenceNotFound {
                model: model.to_string(),
                identifier: identifier.to_string(),
            })
    }

    fn on_reference_created(&self, model: &str, identifier: Uuid) -> Result<Vec<WorkflowEvent>> {
        let reference = self.load_reference(model, identifier)?;
        let definition = self.ctx.site.get_by_reference_model(model)?;
        let opts = ActionOptions::for_subject(reference.subject_identifier.clone())
            .reference(reference);
        Ok(Action::new(self.ctx, definition, opts)?.into_events())
    }

    /// A closed item reopens when its action asks for it, otherwise its
    /// cascade is re-run against the edited fields. NEW and OPEN items close
    /// and cascade.
    fn on_reference_changed(&self, model: &str, identifier: Uuid) -> Result<Vec<WorkflowEvent>> {
        let reference = self.load_reference(model, identifier)?;
        let definition = self.ctx.site.get_by_reference_model(model)?;
        let opts = ActionOptions::for_subject(reference.subject_identifier.clone())
            .reference(reference)
            .readonly();
        let mut action = Action::new(self.ctx, definition, opts)?;

        match action.item().status {
            ActionStatus::Closed if definition.reopen_on_change => action.reopen()?,
            ActionStatus::Closed => {
                action.create_next_action_items()?;
            }
            ActionStatus::New | ActionStatus::Open => {
                action.close_and_create_next()?;
            }
            ActionStatus::Cancelled => {
                tracing::warn!(
                    action_identifier = %action.action_identifier(),
                    "reference changed on cancelled item"
                );
            }
        }
        Ok(action.into_events())
    }

    /// Remove the item's unstarted children, then delete the item or put it
    /// back to NEW depending on `delete_with_reference_object`. An item whose
    /// children have moved on is always put back to NEW.
    fn on_reference_deleted(&self, reference: &Reference) -> Result<Vec<WorkflowEvent>> {
        let Some(action_identifier) = reference.action_identifier.as_deref() else {
            return Ok(Vec::new());
        };
        let Some(mut item) = self.ctx.db.get_item(action_identifier)? else {
            tracing::warn!(%action_identifier, "deleted reference points at a missing item");
            return Ok(Vec::new());
        };

        let mut events = Vec::new();
        for child in self.ctx.db.children_of(action_identifier)? {
            if child.status == ActionStatus::New {
                events.push(remove(self.ctx.db, child)?);
            }
        }

        let delete_item = self
            .ctx
            .site
            .get(&item.action_type)
            .map(|d| d.delete_with_reference_object)
            .unwrap_or(false);

        if delete_item {
            if self.ctx.db.children_of(action_identifier)?.is_empty() {
                events.push(remove(self.ctx.db, item)?);
                return Ok(events);
            }
            tracing::warn!(
                %action_identifier,
                "action item has started children, resetting instead of deleting"
            );
        }

        let from = item.status;
        item.reset();
        self.ctx.db.update_item(&item)?;
        if from != ActionStatus::New {
            events.push(WorkflowEvent::ItemStatusChanged {
                action_identifier: item.action_identifier.clone(),
                action_type: item.action_type.clone(),
                from,
                to: ActionStatus::New,
            });
        }
        Ok(events)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{default_actions, NotificationConfig};
    use crate::notification::OutboxMailer;
    use crate::reference::RegisteredSubject;
    use serde_json::json;
    use tempfile::TempDir;

    const SUBJECT: &str = "S-001";

    fn setup() -> (TempDir, ActionDb, SiteActionItems) {
        let dir = TempDir::new().unwrap();
        let db = ActionDb::open(&dir.path().join("test.redb")).unwrap();
        db.add_subject(&RegisteredSubject::new(SUBJECT)).unwrap();
        let site = SiteActionItems::from_definitions(default_actions()).unwrap();
        (dir, db, site)
    }

    fn save_and_run(
        db: &ActionDb,
        site: &SiteActionItems,
        reference: Reference,
    ) -> (Reference, EventReport) {
        let wf = Workflow::new(db, site);
        let (saved, events) = wf.save_reference(reference).unwrap();
        let report = EventLoop::new(db, site).run(events).unwrap();
        (saved, report)
    }

    fn types_of(items: &[ActionItem]) -> Vec<&str> {
        let mut names: Vec<_> = items.iter().map(|i| i.action_type.as_str()).collect();
        names.sort();
        names
    }

    #[test]
    fn saving_a_reference_closes_and_cascades() {
        let (_dir, db, site) = setup();
        let (saved, report) = save_and_run(
            &db,
            &site,
            Reference::new("adverse_event.ae_initial", SUBJECT).with_fields(json!({"sae": true})),
        );

        let id = saved.action_identifier.clone().unwrap();
        let item = db.find_item(&id).unwrap();
        assert_eq!(item.status, ActionStatus::Closed);
        assert!(item.linked_to_reference);
        assert_eq!(types_of(&db.children_of(&id).unwrap()), vec!["ae_followup", "ae_tmg"]);
        assert_eq!(report.created().len(), 3);
        assert_eq!(
            report.transitions(),
            vec![(id.as_str(), ActionStatus::New, ActionStatus::Closed)]
        );
    }

    #[test]
    fn resaving_the_same_reference_creates_no_duplicates() {
        let (_dir, db, site) = setup();
        let (saved, _) = save_and_run(
            &db,
            &site,
            Reference::new("adverse_event.death_report", SUBJECT),
        );
        let id = saved.action_identifier.clone().unwrap();
        assert_eq!(
            types_of(&db.children_of(&id).unwrap()),
            vec!["death_report_tmg", "offstudy"]
        );

        // reopen_on_change: edit reopens, closing re-cascades idempotently.
        let (_, report) = save_and_run(&db, &site, saved.clone());
        assert_eq!(db.find_item(&id).unwrap().status, ActionStatus::Open);
        assert!(report.created().is_empty());

        let wf = Workflow::new(&db, &site);
        let (item, events) = wf.close_item(&id).unwrap();
        assert_eq!(item.status, ActionStatus::Closed);
        let report = EventLoop::new(&db, &site).run(events).unwrap();
        assert!(report.created().is_empty());
        assert_eq!(db.children_of(&id).unwrap().len(), 2);
        assert_eq!(db.list_items(&ItemFilter::subject(SUBJECT)).unwrap().len(), 3);
    }

    #[test]
    fn saving_an_open_item_again_closes_it_and_spawns_enabled_actions() {
        let (_dir, db, site) = setup();
        let (saved, _) = save_and_run(
            &db,
            &site,
            Reference::new("adverse_event.ae_initial", SUBJECT).with_fields(json!({"sae": false})),
        );
        let id = saved.action_identifier.clone().unwrap();
        assert_eq!(types_of(&db.children_of(&id).unwrap()), vec!["ae_followup"]);

        let (saved, _) = save_and_run(&db, &site, saved.with_fields(json!({"sae": true})));
        assert_eq!(db.find_item(&id).unwrap().status, ActionStatus::Open);

        let (_, report) = save_and_run(&db, &site, saved);
        assert_eq!(db.find_item(&id).unwrap().status, ActionStatus::Closed);
        assert_eq!(report.created().len(), 1);
        assert_eq!(types_of(&db.children_of(&id).unwrap()), vec!["ae_followup", "ae_tmg"]);
    }

    #[test]
    fn unprocessed_save_is_completed_by_saving_again() {
        let (_dir, db, site) = setup();
        let wf = Workflow::new(&db, &site);
        let (saved, _dropped) = wf
            .save_reference(Reference::new("adverse_event.ae_initial", SUBJECT))
            .unwrap();
        let id = saved.action_identifier.clone().unwrap();
        assert_eq!(db.find_item(&id).unwrap().status, ActionStatus::New);

        save_and_run(&db, &site, saved);
        let item = db.find_item(&id).unwrap();
        assert_eq!(item.status, ActionStatus::Closed);
        assert!(item.linked_to_reference);
        assert_eq!(types_of(&db.children_of(&id).unwrap()), vec!["ae_followup"]);
    }

    #[test]
    fn reference_for_another_subjects_item_is_rejected() {
        let (_dir, db, site) = setup();
        db.add_subject(&RegisteredSubject::new("S-002")).unwrap();
        let (initial, _) = save_and_run(
            &db,
            &site,
            Reference::new("adverse_event.ae_initial", SUBJECT),
        );
        let initial_id = initial.action_identifier.unwrap();
        let followup = db.children_of(&initial_id).unwrap().remove(0);

        let wf = Workflow::new(&db, &site);
        let foreign = Reference::new("adverse_event.ae_followup", "S-002")
            .with_action_identifier(followup.action_identifier.clone());
        assert!(matches!(
            wf.save_reference(foreign),
            Err(ActionError::SubjectMismatch { .. })
        ));
        assert_eq!(
            db.find_item(&followup.action_identifier).unwrap().status,
            ActionStatus::New
        );
        assert!(db.list_references().unwrap().iter().all(|r| r.subject_identifier == SUBJECT));
    }

    #[test]
    fn edit_without_reopen_recascades_on_new_fields() {
        let (_dir, db, _) = setup();
        let mut defs = default_actions();
        for d in &mut defs {
            d.reopen_on_change = false;
        }
        let site = SiteActionItems::from_definitions(defs).unwrap();

        let (saved, _) = save_and_run(
            &db,
            &site,
            Reference::new("adverse_event.ae_initial", SUBJECT).with_fields(json!({"sae": false})),
        );
        let id = saved.action_identifier.clone().unwrap();
        assert_eq!(types_of(&db.children_of(&id).unwrap()), vec!["ae_followup"]);

        let edited = saved.with_fields(json!({"sae": true}));
        let (_, report) = save_and_run(&db, &site, edited);
        assert_eq!(db.find_item(&id).unwrap().status, ActionStatus::Closed);
        assert_eq!(report.created().len(), 1);
        assert_eq!(types_of(&db.children_of(&id).unwrap()), vec!["ae_followup", "ae_tmg"]);
    }

    #[test]
    fn followup_reference_attaches_to_spawned_item() {
        let (_dir, db, site) = setup();
        let (initial, _) = save_and_run(
            &db,
            &site,
            Reference::new("adverse_event.ae_initial", SUBJECT),
        );
        let initial_id = initial.action_identifier.unwrap();
        let followup = db.children_of(&initial_id).unwrap().remove(0);

        let (saved, report) = save_and_run(
            &db,
            &site,
            Reference::new("adverse_event.ae_followup", SUBJECT)
                .with_related(initial_id.clone())
                .with_parent(initial_id.clone())
                .with_fields(json!({"outcome": "resolved"})),
        );
        assert_eq!(
            saved.action_identifier.as_deref(),
            Some(followup.action_identifier.as_str())
        );
        assert!(report.created().is_empty());
        assert_eq!(
            db.find_item(&followup.action_identifier).unwrap().status,
            ActionStatus::Closed
        );
    }

    #[test]
    fn second_reference_for_linked_item_is_rejected() {
        let (_dir, db, site) = setup();
        let (first, _) = save_and_run(
            &db,
            &site,
            Reference::new("adverse_event.death_report", SUBJECT),
        );
        let wf = Workflow::new(&db, &site);
        let second = Reference::new("adverse_event.death_report", SUBJECT)
            .with_action_identifier(first.action_identifier.unwrap());
        assert!(matches!(
            wf.save_reference(second),
            Err(ActionError::AlreadyLinked { .. })
        ));
    }

    #[test]
    fn singleton_delete_requires_new_status() {
        let (_dir, db, site) = setup();
        let wf = Workflow::new(&db, &site);

        let (item, _) = wf.create_item("offstudy", SUBJECT, None, None).unwrap();
        wf.close_item(&item.action_identifier).unwrap();
        assert!(matches!(
            wf.delete_action_item("offstudy", SUBJECT),
            Err(ActionError::ActionItemDelete { .. })
        ));
        assert!(matches!(
            wf.delete_item(&item.action_identifier),
            Err(ActionError::ActionItemDelete { .. })
        ));

        wf.reopen_item(&item.action_identifier).unwrap();
        wf.cancel_item(&item.action_identifier).unwrap();
        let (fresh, _) = wf.create_item("offstudy", SUBJECT, None, None).unwrap();
        let events = wf.delete_action_item("offstudy", SUBJECT).unwrap();
        assert_eq!(events.len(), 1);
        assert!(db.get_item(&fresh.action_identifier).unwrap().is_none());
    }

    #[test]
    fn item_with_children_cannot_be_deleted() {
        let (_dir, db, site) = setup();
        let wf = Workflow::new(&db, &site);
        let (item, _) = wf.create_item("death_report", SUBJECT, None, None).unwrap();
        wf.close_item(&item.action_identifier).unwrap();
        wf.reopen_item(&item.action_identifier).unwrap();
        let err = wf.delete_item(&item.action_identifier).unwrap_err();
        assert!(err.to_string().contains("status is open"), "{err}");
    }

    #[test]
    fn system_only_action_cannot_be_created_by_hand() {
        let (_dir, db, site) = setup();
        let wf = Workflow::new(&db, &site);
        assert!(matches!(
            wf.create_item("ae_tmg", SUBJECT, None, None),
            Err(ActionError::NotCreatableByUser(_))
        ));
    }

    #[test]
    fn deleting_a_reference_resets_the_item() {
        let (_dir, db, site) = setup();
        let (saved, _) = save_and_run(
            &db,
            &site,
            Reference::new("adverse_event.ae_initial", SUBJECT),
        );
        let id = saved.action_identifier.clone().unwrap();

        let wf = Workflow::new(&db, &site);
        let events = wf
            .delete_reference(&saved.reference_model, saved.identifier)
            .unwrap();
        let report = EventLoop::new(&db, &site).run(events).unwrap();

        let item = db.find_item(&id).unwrap();
        assert_eq!(item.status, ActionStatus::New);
        assert!(!item.linked_to_reference);
        assert!(db.children_of(&id).unwrap().is_empty());
        assert_eq!(report.deleted().len(), 1);
        assert_eq!(
            report.transitions(),
            vec![(id.as_str(), ActionStatus::Closed, ActionStatus::New)]
        );
    }

    #[test]
    fn deleting_a_reference_can_delete_the_item() {
        let (_dir, db, _) = setup();
        let mut defs = default_actions();
        for d in &mut defs {
            d.delete_with_reference_object = true;
        }
        let site = SiteActionItems::from_definitions(defs).unwrap();
        let (saved, _) = save_and_run(
            &db,
            &site,
            Reference::new("adverse_event.death_report", SUBJECT),
        );
        let id = saved.action_identifier.clone().unwrap();

        let wf = Workflow::new(&db, &site);
        let events = wf
            .delete_reference(&saved.reference_model, saved.identifier)
            .unwrap();
        let report = EventLoop::new(&db, &site).run(events).unwrap();
        assert_eq!(report.deleted().len(), 3);
        assert!(db.get_item(&id).unwrap().is_none());
        assert!(db.list_items(&ItemFilter::subject(SUBJECT)).unwrap().is_empty());
    }

    #[test]
    fn deleting_a_reference_resets_item_with_started_children() {
        let (_dir, db, _) = setup();
        let mut defs = default_actions();
        for d in &mut defs {
            d.delete_with_reference_object = true;
        }
        let site = SiteActionItems::from_definitions(defs).unwrap();
        let (saved, _) = save_and_run(
            &db,
            &site,
            Reference::new("adverse_event.death_report", SUBJECT),
        );
        let id = saved.action_identifier.clone().unwrap();
        let wf = Workflow::new(&db, &site);
        let offstudy = db
            .children_of(&id)
            .unwrap()
            .into_iter()
            .find(|c| c.action_type == "offstudy")
            .unwrap();
        wf.close_item(&offstudy.action_identifier).unwrap();

        let events = wf
            .delete_reference(&saved.reference_model, saved.identifier)
            .unwrap();
        let report = EventLoop::new(&db, &site).run(events).unwrap();

        let item = db.find_item(&id).unwrap();
        assert_eq!(item.status, ActionStatus::New);
        assert!(!item.linked_to_reference);
        assert_eq!(report.deleted().len(), 1);
        assert_eq!(
            report.transitions(),
            vec![(id.as_str(), ActionStatus::Closed, ActionStatus::New)]
        );
        assert_eq!(
            db.children_of(&id).unwrap()[0].action_identifier,
            offstudy.action_identifier
        );
        assert!(crate::audit::audit(&db, Some(&site)).unwrap().iter().all(|f| {
            !matches!(f, crate::audit::Finding::LinkedWithoutReference { .. })
        }));
    }

    #[test]
    fn missing_reference_delete_fails() {
        let (_dir, db, site) = setup();
        let wf = Workflow::new(&db, &site);
        assert!(matches!(
            wf.delete_reference("adverse_event.ae_initial", Uuid::new_v4()),
            Err(ActionError::ReferenceNotFound { .. })
        ));
    }

    #[test]
    fn event_loop_writes_notifications_to_outbox() {
        let (dir, db, site) = setup();
        let config = NotificationConfig {
            enabled: true,
            recipients: vec!["safety@example.org".to_string()],
            ..NotificationConfig::default()
        };
        let outbox = dir.path().join("outbox");
        let notifier = ActionItemNotifier::new(config, Box::new(OutboxMailer::new(&outbox)));

        let wf = Workflow::new(&db, &site);
        let (item, events) = wf.create_item("ae_initial", SUBJECT, None, None).unwrap();
        let report = EventLoop::new(&db, &site)
            .with_notifier(Some(&notifier))
            .run(events)
            .unwrap();

        assert_eq!(report.notifications_sent, 1);
        assert_eq!(report.notification_failures, 0);
        assert!(db.find_item(&item.action_identifier).unwrap().emailed);
        assert_eq!(std::fs::read_dir(&outbox).unwrap().count(), 1);
    }
}

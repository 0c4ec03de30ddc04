//! The `Action`: one unit of workflow bound to an `ActionDefinition`, a
//! subject and a persisted `ActionItem`.
//!
//! Constructing an `Action` either attaches to an existing item or creates
//! one. When a reference object is supplied (and the action is not
//! read-only) construction closes the item and cascades into the
//! definition's next actions:
//!
//! ```text
//! NEW ──reference saved──▶ CLOSED ──spawn next actions──▶ NEW (children)
//!                            │  ▲
//!            reference edited│  │close
//!                            ▼  │
//!                            OPEN
//! ```

use crate::action_item::{ActionItem, ItemFilter};
use crate::db::ActionDb;
use crate::definition::ActionDefinition;
use crate::error::{ActionError, Result};
use crate::events::WorkflowEvent;
use crate::paths;
use crate::reference::Reference;
use crate::registry::SiteActionItems;
use crate::types::ActionStatus;

// ---------------------------------------------------------------------------
// ActionContext
// ---------------------------------------------------------------------------

/// The store and registry every action works against.
#[derive(Clone, Copy)]
pub struct ActionContext<'a> {
    pub db: &'a ActionDb,
    pub site: &'a SiteActionItems,
}

impl<'a> ActionContext<'a> {
    pub fn new(db: &'a ActionDb, site: &'a SiteActionItems) -> Self {
        Self { db, site }
    }
}

// ---------------------------------------------------------------------------
// ActionOptions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ActionOptions {
    pub subject_identifier: String,
    /// Attach to this item instead of looking one up.
    pub action_identifier: Option<String>,
    /// A prefetched item; must belong to the same action.
    pub action_item: Option<ActionItem>,
    pub parent_action_identifier: Option<String>,
    pub related_action_identifier: Option<String>,
    pub reference: Option<Reference>,
    /// Never close on construction, even with a reference object.
    pub readonly: bool,
    /// Set on items spawned by another action's cascade.
    pub auto_created_comment: Option<String>,
}

impl ActionOptions {
    pub fn for_subject(subject_identifier: impl Into<String>) -> Self {
        Self {
            subject_identifier: subject_identifier.into(),
            ..Self::default()
        }
    }

    pub fn action_identifier(mut self, action_identifier: impl Into<String>) -> Self {
        self.action_identifier = Some(action_identifier.into());
        self
    }

    pub fn action_item(mut self, item: ActionItem) -> Self {
        self.action_item = Some(item);
        self
    }

    pub fn parent(mut self, action_identifier: Option<String>) -> Self {
        self.parent_action_identifier = action_identifier;
        self
    }

    pub fn related(mut self, action_identifier: Option<String>) -> Self {
        self.related_action_identifier = action_identifier;
        self
    }

    pub fn reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

pub struct Action<'a> {
    ctx: ActionContext<'a>,
    definition: &'a ActionDefinition,
    item: ActionItem,
    reference: Option<Reference>,
    readonly: bool,
    created: bool,
    events: Vec<WorkflowEvent>,
}

impl<'a> Action<'a> {
    /// Attach to the matching action item, creating it if none exists, then
    /// close and cascade if a reference object was supplied.
    pub fn new(
        ctx: ActionContext<'a>,
        definition: &'a ActionDefinition,
        opts: ActionOptions,
    ) -> Result<Self> {
        Self::build(ctx, definition, opts, false)
    }

    /// Like `new`, but always inserts a fresh item. Singleton actions fail
    /// with `SingletonViolation` if the subject already has one.
    pub fn create(
        ctx: ActionContext<'a>,
        definition: &'a ActionDefinition,
        opts: ActionOptions,
    ) -> Result<Self> {
        Self::build(ctx, definition, opts, true)
    }

    fn build(
        ctx: ActionContext<'a>,
        definition: &'a ActionDefinition,
        mut opts: ActionOptions,
        force_create: bool,
    ) -> Result<Self> {
        paths::validate_subject_identifier(&opts.subject_identifier)?;
        ctx.db.require_subject(&opts.subject_identifier)?;
        ctx.db.upsert_action_type(definition)?;

        let mut events = Vec::new();
        let mut created = false;

        let explicit_identifier = opts.action_identifier.take().or_else(|| {
            opts.reference
                .as_ref()
                .and_then(|r| r.action_identifier.clone())
        });

        let item = match (opts.action_item.take(), explicit_identifier) {
            (Some(item), _) => {
                check_bound(definition, &opts.subject_identifier, &item)?;
                item
            }
            (None, Some(id)) => {
                let item = ctx.db.find_item(&id)?;
                check_bound(definition, &opts.subject_identifier, &item)?;
                item
            }
            (None, None) => {
                validate_linkage(ctx, definition, &opts)?;
                let existing = if force_create {
                    None
                } else {
                    find_existing(ctx.db, definition, &opts)?
                };
                match existing {
                    Some(item) => item,
                    None => {
                        let item = new_item(definition, &opts);
                        ctx.db.insert_item(&item, definition.singleton)?;
                        tracing::info!(
                            action = %definition.name,
                            action_identifier = %item.action_identifier,
                            subject = %item.subject_identifier,
                            "created action item"
                        );
                        events.push(WorkflowEvent::ItemCreated {
                            action_identifier: item.action_identifier.clone(),
                            action_type: item.action_type.clone(),
                            subject_identifier: item.subject_identifier.clone(),
                        });
                        created = true;
                        item
                    }
                }
            }
        };

        let mut action = Self {
            ctx,
            definition,
            item,
            reference: opts.reference,
            readonly: opts.readonly,
            created,
            events,
        };

        if action.reference.is_some() && !action.readonly {
            action.close_and_create_next()?;
        }
        Ok(action)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn definition(&self) -> &ActionDefinition {
        self.definition
    }

    pub fn item(&self) -> &ActionItem {
        &self.item
    }

    pub fn action_identifier(&self) -> &str {
        &self.item.action_identifier
    }

    pub fn reference(&self) -> Option<&Reference> {
        self.reference.as_ref()
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// True if construction inserted a new item.
    pub fn created(&self) -> bool {
        self.created
    }

    pub fn into_events(self) -> Vec<WorkflowEvent> {
        self.events
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    pub fn close_and_create_next(&mut self) -> Result<Vec<String>> {
        self.close()?;
        self.create_next_action_items()
    }

    /// Close the item and, if a reference object is attached, mark the item
    /// as linked to it. Closing a closed item is a no-op.
    pub fn close(&mut self) -> Result<()> {
        self.set_status(ActionStatus::Closed)?;
        if self.reference.is_some() && !self.item.linked_to_reference {
            self.item.link_reference();
            self.ctx.db.update_item(&self.item)?;
        }
        Ok(())
    }

    pub fn reopen(&mut self) -> Result<()> {
        self.set_status(ActionStatus::Open)
    }

    pub fn cancel(&mut self) -> Result<()> {
        self.set_status(ActionStatus::Cancelled)
    }

    fn set_status(&mut self, target: ActionStatus) -> Result<()> {
        let from = self.item.status;
        if from == target {
            return Ok(());
        }
        self.item.transition(target)?;
        self.ctx.db.update_item(&self.item)?;
        tracing::info!(
            action_identifier = %self.item.action_identifier,
            from = %from,
            to = %target,
            "action item status changed"
        );
        self.events.push(WorkflowEvent::ItemStatusChanged {
            action_identifier: self.item.action_identifier.clone(),
            action_type: self.item.action_type.clone(),
            from,
            to: target,
        });
        Ok(())
    }

    /// Names of the actions to spawn, given the attached reference object.
    pub fn next_actions(&self) -> Vec<String> {
        let fields = self
            .reference
            .as_ref()
            .map(|r| r.fields.clone())
            .unwrap_or(serde_json::Value::Null);
        self.definition.next_action_names(&fields)
    }

    /// Spawn one item per next action unless the subject already has an
    /// item of that action under this parent. Returns the identifiers of
    /// the items created.
    pub fn create_next_action_items(&mut self) -> Result<Vec<String>> {
        let mut spawned = Vec::new();
        let site = self.ctx.site;

        for name in self.next_actions() {
            let next_def = site.get(&name)?;

            let existing = self.ctx.db.list_items(
                &ItemFilter::subject(&self.item.subject_identifier)
                    .action_type(&name)
                    .parent(Some(self.item.action_identifier.clone())),
            )?;
            if !existing.is_empty() {
                tracing::debug!(
                    action = %name,
                    parent = %self.item.action_identifier,
                    "next action already exists"
                );
                continue;
            }

            if next_def.singleton && self.has_live_item(&name)? {
                tracing::debug!(action = %name, "singleton next action already exists");
                continue;
            }

            let related = self
                .item
                .related_action_identifier
                .clone()
                .unwrap_or_else(|| self.item.action_identifier.clone());

            let opts = ActionOptions {
                subject_identifier: self.item.subject_identifier.clone(),
                parent_action_identifier: Some(self.item.action_identifier.clone()),
                related_action_identifier: Some(related),
                auto_created_comment: Some(format!(
                    "created on close of {} ({})",
                    self.definition.name, self.item.action_identifier
                )),
                ..ActionOptions::default()
            };
            let child = Action::create(self.ctx, next_def, opts)?;
            spawned.push(child.action_identifier().to_string());
            self.events.extend(child.into_events());
        }
        Ok(spawned)
    }

    fn has_live_item(&self, action_type: &str) -> Result<bool> {
        Ok(self
            .ctx
            .db
            .list_items(&ItemFilter::subject(&self.item.subject_identifier).action_type(action_type))?
            .iter()
            .any(|i| i.status != ActionStatus::Cancelled))
    }
}

// ---------------------------------------------------------------------------
// Construction helpers
// ---------------------------------------------------------------------------

/// An item bound by identifier must be of this action and this subject.
fn check_bound(
    definition: &ActionDefinition,
    subject_identifier: &str,
    item: &ActionItem,
) -> Result<()> {
    if item.action_type != definition.name {
        return Err(ActionError::ActionMismatch {
            action_identifier: item.action_identifier.clone(),
            expected: definition.name.clone(),
            found: item.action_type.clone(),
        });
    }
    if item.subject_identifier != subject_identifier {
        return Err(ActionError::SubjectMismatch {
            action_identifier: item.action_identifier.clone(),
            expected: subject_identifier.to_string(),
            found: item.subject_identifier.clone(),
        });
    }
    Ok(())
}

/// Parent must exist and be a permitted parent action; related must exist
/// and is required when the definition names a related reference model.
fn validate_linkage(
    ctx: ActionContext<'_>,
    definition: &ActionDefinition,
    opts: &ActionOptions,
) -> Result<()> {
    if let Some(parent_id) = &opts.parent_action_identifier {
        let parent = ctx.db.find_item(parent_id)?;
        if !definition.accepts_parent(&parent.action_type) {
            return Err(ActionError::InvalidParent {
                action: definition.name.clone(),
                parent: parent.action_type,
                allowed: definition.parent_action_names.join(", "),
            });
        }
    }

    match (&opts.related_action_identifier, &definition.related_reference_model) {
        (Some(related_id), _) => {
            ctx.db.find_item(related_id)?;
        }
        (None, Some(model)) => {
            return Err(ActionError::MissingRelatedActionItem {
                action: definition.name.clone(),
                related_reference_model: model.clone(),
            });
        }
        (None, None) => {}
    }
    Ok(())
}

/// Get half of get-or-create. Singletons match any live item of the action
/// for the subject; other actions match pending items with the requested
/// linkage. Several matches mean a get-or-create raced: keep the earliest.
fn find_existing(
    db: &ActionDb,
    definition: &ActionDefinition,
    opts: &ActionOptions,
) -> Result<Option<ActionItem>> {
    let base = ItemFilter::subject(&opts.subject_identifier).action_type(&definition.name);
    let matches: Vec<ActionItem> = if definition.singleton {
        db.list_items(&base)?
            .into_iter()
            .filter(|i| i.status != ActionStatus::Cancelled)
            .collect()
    } else {
        let filter = ItemFilter {
            parent_action_identifier: opts.parent_action_identifier.clone(),
            related_action_identifier: opts.related_action_identifier.clone(),
            ..base.pending()
        };
        db.list_items(&filter)?
    };

    if matches.len() > 1 {
        tracing::warn!(
            action = %definition.name,
            subject = %opts.subject_identifier,
            count = matches.len(),
            "multiple action items found, using the earliest"
        );
    }
    Ok(matches.into_iter().next())
}

fn new_item(definition: &ActionDefinition, opts: &ActionOptions) -> ActionItem {
    let mut item = ActionItem::new(definition, opts.subject_identifier.clone());
    item.parent_action_identifier = opts.parent_action_identifier.clone();
    item.related_action_identifier = opts.related_action_identifier.clone();
    if let Some(comment) = &opts.auto_created_comment {
        item.auto_created = true;
        item.auto_created_comment = Some(comment.clone());
    }
    if let Some(reference) = &opts.reference {
        item.report_datetime = reference.report_datetime;
    }
    item
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{Condition, NextAction};
    use crate::reference::RegisteredSubject;
    use serde_json::json;
    use tempfile::TempDir;

    const SUBJECT: &str = "S-001";

    fn site() -> SiteActionItems {
        SiteActionItems::from_definitions(vec![
            ActionDefinition::new("ae_initial")
                .with_reference_model("adverse_event.ae_initial")
                .with_next(NextAction::named("ae_followup"))
                .with_next(NextAction::named("ae_tmg").when(Condition::Equals {
                    field: "sae".into(),
                    value: json!(true),
                })),
            ActionDefinition::new("ae_followup")
                .with_reference_model("adverse_event.ae_followup")
                .with_related_reference_model("adverse_event.ae_initial")
                .with_parents(["ae_initial", "ae_followup"])
                .with_next(NextAction::current().when(Condition::NotEquals {
                    field: "outcome".into(),
                    value: json!("resolved"),
                })),
            ActionDefinition::new("ae_tmg")
                .with_reference_model("adverse_event.ae_tmg")
                .with_parents(["ae_initial"]),
            ActionDefinition::new("offstudy")
                .with_reference_model("prn.offstudy")
                .singleton(),
        ])
        .unwrap()
    }

    fn setup() -> (TempDir, ActionDb, SiteActionItems) {
        let dir = TempDir::new().unwrap();
        let db = ActionDb::open(&dir.path().join("test.redb")).unwrap();
        db.add_subject(&RegisteredSubject::new(SUBJECT)).unwrap();
        (dir, db, site())
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let (_dir, db, site) = setup();
        let ctx = ActionContext::new(&db, &site);
        let def = site.get("ae_initial").unwrap();

        let first = Action::new(ctx, def, ActionOptions::for_subject(SUBJECT)).unwrap();
        let second = Action::new(ctx, def, ActionOptions::for_subject(SUBJECT)).unwrap();
        assert!(first.created());
        assert!(!second.created());
        assert_eq!(first.action_identifier(), second.action_identifier());
        assert_eq!(db.list_items(&ItemFilter::subject(SUBJECT)).unwrap().len(), 1);
    }

    #[test]
    fn construction_lazily_creates_action_type() {
        let (_dir, db, site) = setup();
        let ctx = ActionContext::new(&db, &site);
        assert!(db.get_action_type("offstudy").unwrap().is_none());
        Action::new(ctx, site.get("offstudy").unwrap(), ActionOptions::for_subject(SUBJECT))
            .unwrap();
        assert!(db.get_action_type("offstudy").unwrap().is_some());
    }

    #[test]
    fn unknown_subject_fails() {
        let (_dir, db, site) = setup();
        let ctx = ActionContext::new(&db, &site);
        let result = Action::new(
            ctx,
            site.get("ae_initial").unwrap(),
            ActionOptions::for_subject("S-404"),
        );
        assert!(matches!(result, Err(ActionError::SubjectNotFound(_))));
    }

    #[test]
    fn prefetched_item_of_other_action_is_rejected() {
        let (_dir, db, site) = setup();
        let ctx = ActionContext::new(&db, &site);
        let initial =
            Action::new(ctx, site.get("ae_initial").unwrap(), ActionOptions::for_subject(SUBJECT))
                .unwrap();
        let result = Action::new(
            ctx,
            site.get("offstudy").unwrap(),
            ActionOptions::for_subject(SUBJECT).action_item(initial.item().clone()),
        );
        assert!(matches!(result, Err(ActionError::ActionMismatch { .. })));
    }

    #[test]
    fn item_of_another_subject_is_rejected() {
        let (_dir, db, site) = setup();
        db.add_subject(&RegisteredSubject::new("S-002")).unwrap();
        let ctx = ActionContext::new(&db, &site);
        let def = site.get("ae_initial").unwrap();
        let theirs = Action::new(ctx, def, ActionOptions::for_subject(SUBJECT)).unwrap();
        let id = theirs.action_identifier().to_string();

        let by_id = Action::new(
            ctx,
            def,
            ActionOptions::for_subject("S-002").action_identifier(id.clone()),
        );
        assert!(matches!(by_id, Err(ActionError::SubjectMismatch { .. })));

        let prefetched = Action::new(
            ctx,
            def,
            ActionOptions::for_subject("S-002").action_item(theirs.item().clone()),
        );
        assert!(matches!(prefetched, Err(ActionError::SubjectMismatch { .. })));
        assert_eq!(db.find_item(&id).unwrap().status, ActionStatus::New);
    }

    #[test]
    fn several_pending_matches_attach_to_the_earliest() {
        let (_dir, db, site) = setup();
        let ctx = ActionContext::new(&db, &site);
        let def = site.get("ae_initial").unwrap();

        let newer = ActionItem::new(def, SUBJECT);
        let mut older = ActionItem::new(def, SUBJECT);
        older.created_at = newer.created_at - chrono::Duration::hours(1);
        db.insert_item(&newer, false).unwrap();
        db.insert_item(&older, false).unwrap();

        let action = Action::new(ctx, def, ActionOptions::for_subject(SUBJECT)).unwrap();
        assert!(!action.created());
        assert_eq!(action.action_identifier(), older.action_identifier);
    }

    #[test]
    fn parent_not_in_allowed_list_is_rejected() {
        let (_dir, db, site) = setup();
        let ctx = ActionContext::new(&db, &site);
        let offstudy =
            Action::new(ctx, site.get("offstudy").unwrap(), ActionOptions::for_subject(SUBJECT))
                .unwrap();
        let result = Action::new(
            ctx,
            site.get("ae_tmg").unwrap(),
            ActionOptions::for_subject(SUBJECT)
                .parent(Some(offstudy.action_identifier().to_string())),
        );
        assert!(matches!(result, Err(ActionError::InvalidParent { .. })));
    }

    #[test]
    fn missing_related_item_is_rejected() {
        let (_dir, db, site) = setup();
        let ctx = ActionContext::new(&db, &site);
        let result = Action::new(
            ctx,
            site.get("ae_followup").unwrap(),
            ActionOptions::for_subject(SUBJECT),
        );
        assert!(matches!(
            result,
            Err(ActionError::MissingRelatedActionItem { .. })
        ));
    }

    #[test]
    fn reference_closes_and_spawns_next_actions_once() {
        let (_dir, db, site) = setup();
        let ctx = ActionContext::new(&db, &site);
        let def = site.get("ae_initial").unwrap();
        let reference = Reference::new("adverse_event.ae_initial", SUBJECT)
            .with_fields(json!({"sae": true}));

        let action =
            Action::new(ctx, def, ActionOptions::for_subject(SUBJECT).reference(reference.clone()))
                .unwrap();
        let parent_id = action.action_identifier().to_string();
        assert_eq!(action.item().status, ActionStatus::Closed);
        assert!(action.item().linked_to_reference);

        let children = db.children_of(&parent_id).unwrap();
        let mut names: Vec<_> = children.iter().map(|c| c.action_type.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["ae_followup", "ae_tmg"]);
        assert!(children.iter().all(|c| c.status == ActionStatus::New));
        assert!(children.iter().all(|c| c.auto_created));
        assert!(children
            .iter()
            .all(|c| c.related_action_identifier.as_deref() == Some(parent_id.as_str())));

        // Re-saving the same reference must not duplicate children.
        let again = Action::new(
            ctx,
            def,
            ActionOptions::for_subject(SUBJECT)
                .reference(reference.with_action_identifier(parent_id.clone())),
        )
        .unwrap();
        assert_eq!(again.action_identifier(), parent_id);
        assert_eq!(db.children_of(&parent_id).unwrap().len(), 2);
    }

    #[test]
    fn readonly_action_does_not_close() {
        let (_dir, db, site) = setup();
        let ctx = ActionContext::new(&db, &site);
        let action = Action::new(
            ctx,
            site.get("ae_initial").unwrap(),
            ActionOptions::for_subject(SUBJECT)
                .reference(Reference::new("adverse_event.ae_initial", SUBJECT))
                .readonly(),
        )
        .unwrap();
        assert_eq!(action.item().status, ActionStatus::New);
        assert!(db.children_of(action.action_identifier()).unwrap().is_empty());
    }

    #[test]
    fn self_next_action_chains_with_shared_related_item() {
        let (_dir, db, site) = setup();
        let ctx = ActionContext::new(&db, &site);
        let initial = Action::new(
            ctx,
            site.get("ae_initial").unwrap(),
            ActionOptions::for_subject(SUBJECT)
                .reference(Reference::new("adverse_event.ae_initial", SUBJECT)),
        )
        .unwrap();
        let initial_id = initial.action_identifier().to_string();
        let followup = db.children_of(&initial_id).unwrap().remove(0);

        let ongoing = Reference::new("adverse_event.ae_followup", SUBJECT)
            .with_action_identifier(followup.action_identifier.clone())
            .with_fields(json!({"outcome": "ongoing"}));
        let closed = Action::new(
            ctx,
            site.get("ae_followup").unwrap(),
            ActionOptions::for_subject(SUBJECT).reference(ongoing),
        )
        .unwrap();

        let next = db.children_of(closed.action_identifier()).unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].action_type, "ae_followup");
        assert_eq!(next[0].related_action_identifier.as_deref(), Some(initial_id.as_str()));
    }

    #[test]
    fn resolved_outcome_stops_the_chain() {
        let (_dir, db, site) = setup();
        let ctx = ActionContext::new(&db, &site);
        let initial = Action::new(
            ctx,
            site.get("ae_initial").unwrap(),
            ActionOptions::for_subject(SUBJECT)
                .reference(Reference::new("adverse_event.ae_initial", SUBJECT)),
        )
        .unwrap();
        let followup = db.children_of(initial.action_identifier()).unwrap().remove(0);

        let resolved = Reference::new("adverse_event.ae_followup", SUBJECT)
            .with_action_identifier(followup.action_identifier.clone())
            .with_fields(json!({"outcome": "resolved"}));
        let closed = Action::new(
            ctx,
            site.get("ae_followup").unwrap(),
            ActionOptions::for_subject(SUBJECT).reference(resolved),
        )
        .unwrap();
        assert!(db.children_of(closed.action_identifier()).unwrap().is_empty());
    }

    #[test]
    fn singleton_create_twice_fails_but_get_or_create_attaches() {
        let (_dir, db, site) = setup();
        let ctx = ActionContext::new(&db, &site);
        let def = site.get("offstudy").unwrap();

        let first = Action::create(ctx, def, ActionOptions::for_subject(SUBJECT)).unwrap();
        assert!(matches!(
            Action::create(ctx, def, ActionOptions::for_subject(SUBJECT)),
            Err(ActionError::SingletonViolation { .. })
        ));
        let attached = Action::new(ctx, def, ActionOptions::for_subject(SUBJECT)).unwrap();
        assert_eq!(attached.action_identifier(), first.action_identifier());
    }

    #[test]
    fn reopen_then_close_recascades_without_duplicates() {
        let (_dir, db, site) = setup();
        let ctx = ActionContext::new(&db, &site);
        let reference = Reference::new("adverse_event.ae_initial", SUBJECT);
        let mut action = Action::new(
            ctx,
            site.get("ae_initial").unwrap(),
            ActionOptions::for_subject(SUBJECT).reference(reference),
        )
        .unwrap();

        action.reopen().unwrap();
        assert_eq!(action.item().status, ActionStatus::Open);
        let spawned = action.close_and_create_next().unwrap();
        assert!(spawned.is_empty());
        assert_eq!(action.item().status, ActionStatus::Closed);
        assert_eq!(db.children_of(action.action_identifier()).unwrap().len(), 1);

        let kinds: Vec<_> = action.into_events().iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                "item_created",
                "item_status_changed",
                "item_created",
                "item_status_changed",
                "item_status_changed",
            ]
        );
    }
}

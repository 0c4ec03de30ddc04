use super::{print_report, Project};
use crate::output::{print_json, print_table};
use action_item_core::{
    action_item::{ActionItem, ItemFilter},
    events::{EventReport, WorkflowEvent},
    types::ActionStatus,
};
use anyhow::Context;
use clap::Subcommand;
use std::path::Path;
use std::str::FromStr;

#[derive(Subcommand)]
pub enum ItemSubcommand {
    /// List action items
    List {
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        action: Option<String>,
        /// new, open, closed or cancelled
        #[arg(long)]
        status: Option<String>,
        /// Only NEW and OPEN items
        #[arg(long)]
        pending: bool,
    },
    /// Show an action item with its children and reference object
    Show { action_identifier: String },
    /// Create an action item by hand
    Create {
        action: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        related: Option<String>,
    },
    /// Close an action item and create its next actions
    Close { action_identifier: String },
    /// Reopen a closed action item
    Reopen { action_identifier: String },
    /// Cancel a pending action item
    Cancel { action_identifier: String },
    /// Delete a NEW action item, by identifier or by action and subject
    Delete {
        #[arg(required_unless_present = "action")]
        action_identifier: Option<String>,
        #[arg(long, requires = "subject", conflicts_with = "action_identifier")]
        action: Option<String>,
        #[arg(long)]
        subject: Option<String>,
    },
}

pub fn run(root: &Path, subcmd: ItemSubcommand, json: bool) -> anyhow::Result<()> {
    let project = Project::open(root)?;
    match subcmd {
        ItemSubcommand::List {
            subject,
            action,
            status,
            pending,
        } => list(&project, subject, action, status, pending, json),
        ItemSubcommand::Show { action_identifier } => show(&project, &action_identifier, json),
        ItemSubcommand::Create {
            action,
            subject,
            parent,
            related,
        } => create(&project, &action, &subject, parent, related, json),
        ItemSubcommand::Close { action_identifier } => {
            let (item, events) = project
                .workflow()
                .close_item(&action_identifier)
                .with_context(|| format!("failed to close {action_identifier}"))?;
            finish(&project, "Closed", item, events, json)
        }
        ItemSubcommand::Reopen { action_identifier } => {
            let (item, events) = project
                .workflow()
                .reopen_item(&action_identifier)
                .with_context(|| format!("failed to reopen {action_identifier}"))?;
            finish(&project, "Reopened", item, events, json)
        }
        ItemSubcommand::Cancel { action_identifier } => {
            let (item, events) = project
                .workflow()
                .cancel_item(&action_identifier)
                .with_context(|| format!("failed to cancel {action_identifier}"))?;
            finish(&project, "Cancelled", item, events, json)
        }
        ItemSubcommand::Delete {
            action_identifier,
            action,
            subject,
        } => delete(&project, action_identifier, action, subject, json),
    }
}

fn list(
    project: &Project,
    subject: Option<String>,
    action: Option<String>,
    status: Option<String>,
    pending: bool,
    json: bool,
) -> anyhow::Result<()> {
    let status = status.map(|s| ActionStatus::from_str(&s)).transpose()?;
    let filter = ItemFilter {
        subject_identifier: subject,
        action_type: action,
        status,
        pending_only: pending,
        ..ItemFilter::default()
    };
    let items = project
        .db
        .list_items(&filter)
        .context("failed to list action items")?;

    if json {
        return print_json(&items);
    }
    if items.is_empty() {
        println!("No action items.");
        return Ok(());
    }

    let rows = items
        .iter()
        .filter(|i| {
            project
                .site
                .get(&i.action_type)
                .map(|d| d.show_on_dashboard)
                .unwrap_or(true)
        })
        .map(|i| {
            vec![
                i.action_identifier.clone(),
                i.subject_identifier.clone(),
                i.action_type.clone(),
                i.status.to_string(),
                i.priority.to_string(),
                i.parent_action_identifier.clone().unwrap_or_default(),
            ]
        })
        .collect();
    print_table(
        &["IDENTIFIER", "SUBJECT", "ACTION", "STATUS", "PRIORITY", "PARENT"],
        rows,
    );
    Ok(())
}

fn show(project: &Project, action_identifier: &str, json: bool) -> anyhow::Result<()> {
    let item = project
        .db
        .find_item(action_identifier)
        .with_context(|| format!("action item '{action_identifier}' not found"))?;
    let children = project.db.children_of(action_identifier)?;
    let reference = project.db.reference_for_item(action_identifier)?;

    if json {
        return print_json(&serde_json::json!({
            "item": item,
            "children": children,
            "reference": reference,
        }));
    }

    let display_name = project
        .site
        .get(&item.action_type)
        .map(|d| d.display_name())
        .unwrap_or_else(|_| item.action_type.clone());
    println!("Action item: {} ({})", item.action_identifier, display_name);
    println!("Subject:     {}", item.subject_identifier);
    println!("Status:      {}", item.status);
    println!("Priority:    {}", item.priority);
    if let Some(parent) = &item.parent_action_identifier {
        println!("Parent:      {parent}");
    }
    if let Some(related) = &item.related_action_identifier {
        println!("Related:     {related}");
    }
    if let Some(comment) = &item.auto_created_comment {
        println!("Auto:        {comment}");
    }
    println!("Created:     {}", item.created_at.format("%Y-%m-%d %H:%M"));
    if let Some(closed) = item.closed_at {
        println!("Closed:      {}", closed.format("%Y-%m-%d %H:%M"));
    }
    if let Some(r) = reference {
        println!("Reference:   {}:{}", r.reference_model, r.identifier);
    }
    if !children.is_empty() {
        println!("\nNext actions ({}):", children.len());
        for child in &children {
            println!(
                "  [{}] {} {}",
                child.action_identifier, child.action_type, child.status
            );
        }
    }
    Ok(())
}

fn create(
    project: &Project,
    action: &str,
    subject: &str,
    parent: Option<String>,
    related: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let (item, events) = project
        .workflow()
        .create_item(action, subject, parent, related)
        .with_context(|| format!("failed to create '{action}' for {subject}"))?;
    finish(project, "Created", item, events, json)
}

fn delete(
    project: &Project,
    action_identifier: Option<String>,
    action: Option<String>,
    subject: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let workflow = project.workflow();
    let events = match (action_identifier, action, subject) {
        (Some(id), _, _) => workflow
            .delete_item(&id)
            .with_context(|| format!("failed to delete {id}"))?,
        (None, Some(action), Some(subject)) => workflow
            .delete_action_item(&action, &subject)
            .with_context(|| format!("failed to delete '{action}' for {subject}"))?,
        _ => anyhow::bail!("give an action identifier or --action with --subject"),
    };
    let report = project.process(events)?;
    if json {
        return print_json(&report);
    }
    print_report(&report);
    Ok(())
}

fn finish(
    project: &Project,
    verb: &str,
    item: ActionItem,
    events: Vec<WorkflowEvent>,
    json: bool,
) -> anyhow::Result<()> {
    let report: EventReport = project.process(events)?;
    // Notifications may have updated the item.
    let item = project.db.get_item(&item.action_identifier)?.unwrap_or(item);
    if json {
        return print_json(&serde_json::json!({
            "item": item,
            "report": report,
        }));
    }
    println!(
        "{verb}: {} ({}, {})",
        item.action_identifier, item.action_type, item.status
    );
    print_report(&report);
    Ok(())
}

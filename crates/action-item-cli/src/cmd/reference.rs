use super::{print_report, Project};
use crate::output::{print_json, print_table};
use action_item_core::reference::Reference;
use anyhow::Context;
use clap::Subcommand;
use std::path::Path;
use uuid::Uuid;

#[derive(Subcommand)]
pub enum ReferenceSubcommand {
    /// Save a reference object, closing its action item
    Save {
        /// Model label, e.g. adverse_event.ae_initial
        model: String,
        #[arg(long)]
        subject: String,
        /// Identifier of an existing reference object to update
        #[arg(long)]
        id: Option<Uuid>,
        /// Attach to this action item instead of looking one up
        #[arg(long)]
        action_identifier: Option<String>,
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        related: Option<String>,
        /// Field as KEY=VALUE; VALUE is parsed as JSON when possible
        #[arg(long = "field", value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },
    /// Delete a reference object
    Delete { model: String, id: Uuid },
    /// List reference objects
    List {
        #[arg(long)]
        subject: Option<String>,
    },
}

pub fn run(root: &Path, subcmd: ReferenceSubcommand, json: bool) -> anyhow::Result<()> {
    let project = Project::open(root)?;
    match subcmd {
        ReferenceSubcommand::Save {
            model,
            subject,
            id,
            action_identifier,
            parent,
            related,
            fields,
        } => {
            let mut reference = match id {
                Some(id) => project
                    .db
                    .get_reference(&model, id)?
                    .with_context(|| format!("reference {model}:{id} not found"))?,
                None => Reference::new(&model, &subject),
            };
            reference.action_identifier = action_identifier.or(reference.action_identifier);
            reference.parent_action_identifier = parent.or(reference.parent_action_identifier);
            reference.related_action_identifier = related.or(reference.related_action_identifier);
            for field in &fields {
                let (key, value) = parse_field(field)?;
                if let Some(map) = reference.fields.as_object_mut() {
                    map.insert(key, value);
                }
            }
            save(&project, reference, json)
        }
        ReferenceSubcommand::Delete { model, id } => delete(&project, &model, id, json),
        ReferenceSubcommand::List { subject } => list(&project, subject.as_deref(), json),
    }
}

fn save(project: &Project, reference: Reference, json: bool) -> anyhow::Result<()> {
    let label = format!("{}:{}", reference.reference_model, reference.identifier);
    let (saved, events) = project
        .workflow()
        .save_reference(reference)
        .with_context(|| format!("failed to save reference {label}"))?;
    let report = project.process(events).with_context(|| {
        format!(
            "reference {label} was saved and linked to {} but its item was not closed; \
             save it again to retry",
            saved.action_identifier.as_deref().unwrap_or("-")
        )
    })?;

    if json {
        return print_json(&serde_json::json!({
            "reference": saved,
            "report": report,
        }));
    }
    println!(
        "Saved reference: {label} -> {}",
        saved.action_identifier.as_deref().unwrap_or("-")
    );
    print_report(&report);
    Ok(())
}

fn delete(project: &Project, model: &str, id: Uuid, json: bool) -> anyhow::Result<()> {
    let events = project
        .workflow()
        .delete_reference(model, id)
        .with_context(|| format!("failed to delete reference {model}:{id}"))?;
    let report = project.process(events)?;
    if json {
        return print_json(&report);
    }
    println!("Deleted reference: {model}:{id}");
    print_report(&report);
    Ok(())
}

fn list(project: &Project, subject: Option<&str>, json: bool) -> anyhow::Result<()> {
    let references: Vec<Reference> = project
        .db
        .list_references()
        .context("failed to list references")?
        .into_iter()
        .filter(|r| subject.map(|s| r.subject_identifier == s).unwrap_or(true))
        .collect();

    if json {
        return print_json(&references);
    }
    if references.is_empty() {
        println!("No reference objects.");
        return Ok(());
    }
    let rows = references
        .iter()
        .map(|r| {
            vec![
                r.reference_model.clone(),
                r.identifier.to_string(),
                r.subject_identifier.clone(),
                r.action_identifier.clone().unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&["MODEL", "ID", "SUBJECT", "ACTION ITEM"], rows);
    Ok(())
}

/// Split `KEY=VALUE`; VALUE becomes JSON if it parses, a string otherwise.
fn parse_field(raw: &str) -> anyhow::Result<(String, serde_json::Value)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("invalid field '{raw}': expected KEY=VALUE"))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("invalid field '{raw}': empty key");
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

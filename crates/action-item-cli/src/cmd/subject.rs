use super::Project;
use crate::output::{print_json, print_table};
use action_item_core::{paths, reference::RegisteredSubject};
use anyhow::Context;
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum SubjectSubcommand {
    /// Register a subject
    Add { subject_identifier: String },
    /// List registered subjects
    List,
}

pub fn run(root: &Path, subcmd: SubjectSubcommand, json: bool) -> anyhow::Result<()> {
    let project = Project::open(root)?;
    match subcmd {
        SubjectSubcommand::Add { subject_identifier } => add(&project, &subject_identifier, json),
        SubjectSubcommand::List => list(&project, json),
    }
}

fn add(project: &Project, subject_identifier: &str, json: bool) -> anyhow::Result<()> {
    paths::validate_subject_identifier(subject_identifier)?;
    let subject = RegisteredSubject::new(subject_identifier);
    project
        .db
        .add_subject(&subject)
        .with_context(|| format!("failed to register subject '{subject_identifier}'"))?;

    if json {
        print_json(&subject)?;
    } else {
        println!("Registered subject: {subject_identifier}");
    }
    Ok(())
}

fn list(project: &Project, json: bool) -> anyhow::Result<()> {
    let subjects = project.db.list_subjects().context("failed to list subjects")?;
    if json {
        return print_json(&subjects);
    }
    if subjects.is_empty() {
        println!("No subjects registered.");
        return Ok(());
    }
    let rows = subjects
        .iter()
        .map(|s| {
            vec![
                s.subject_identifier.clone(),
                s.registered_at.format("%Y-%m-%d %H:%M").to_string(),
            ]
        })
        .collect();
    print_table(&["SUBJECT", "REGISTERED"], rows);
    Ok(())
}

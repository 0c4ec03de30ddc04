use super::Project;
use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum RegistrySubcommand {
    /// List registered actions
    List,
    /// Show one action definition
    Show { name: String },
    /// Create or refresh the stored action types from config
    Sync,
}

pub fn run(root: &Path, subcmd: RegistrySubcommand, json: bool) -> anyhow::Result<()> {
    let project = Project::open(root)?;
    match subcmd {
        RegistrySubcommand::List => list(&project, json),
        RegistrySubcommand::Show { name } => show(&project, &name, json),
        RegistrySubcommand::Sync => sync(&project, json),
    }
}

fn list(project: &Project, json: bool) -> anyhow::Result<()> {
    let defs: Vec<_> = project.site.definitions().collect();
    if json {
        return print_json(&defs);
    }
    if defs.is_empty() {
        println!("No actions registered.");
        return Ok(());
    }

    let rows = defs
        .iter()
        .map(|d| {
            let next: Vec<String> = d
                .next_actions
                .iter()
                .map(|n| n.action.to_string())
                .collect();
            vec![
                d.name.clone(),
                d.priority.to_string(),
                if d.singleton { "yes".to_string() } else { String::new() },
                d.reference_model.clone().unwrap_or_default(),
                next.join(", "),
            ]
        })
        .collect();
    print_table(&["NAME", "PRIORITY", "SINGLETON", "REFERENCE MODEL", "NEXT"], rows);
    Ok(())
}

fn show(project: &Project, name: &str, json: bool) -> anyhow::Result<()> {
    let def = project
        .site
        .get(name)
        .with_context(|| format!("action '{name}' not found"))?;
    if json {
        return print_json(def);
    }

    println!("Action:    {} ({})", def.name, def.display_name());
    println!("Priority:  {}", def.priority);
    if let Some(model) = &def.reference_model {
        println!("Reference: {model}");
    }
    if let Some(model) = &def.related_reference_model {
        println!("Related:   {model}");
    }
    if !def.parent_action_names.is_empty() {
        println!("Parents:   {}", def.parent_action_names.join(", "));
    }
    for next in &def.next_actions {
        match &next.when {
            Some(cond) => println!("Next:      {} when {}", next.action, serde_json::to_string(cond)?),
            None => println!("Next:      {}", next.action),
        }
    }
    println!("Singleton: {}", def.singleton);
    println!(
        "Create:    user={} action={}",
        def.create_by_user, def.create_by_action
    );
    if let Some(instructions) = &def.instructions {
        println!("\n{instructions}");
    }
    Ok(())
}

fn sync(project: &Project, json: bool) -> anyhow::Result<()> {
    let summary = project
        .site
        .populate_action_types(&project.db)
        .context("failed to populate action types")?;
    if json {
        return print_json(&summary);
    }
    println!(
        "Action types: {} created, {} updated, {} unchanged",
        summary.created, summary.updated, summary.unchanged
    );
    Ok(())
}

use action_item_core::{config::Config, db::ActionDb, io, paths};
use anyhow::Context;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let project_name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string());

    if !json {
        println!("Initializing action items in: {}", root.display());
    }

    for dir in [paths::DATA_DIR, paths::OUTBOX_DIR] {
        let p = root.join(dir);
        io::ensure_dir(&p).with_context(|| format!("failed to create {}", p.display()))?;
    }

    let config_path = paths::config_path(root);
    let created_config = !config_path.exists();
    if created_config {
        Config::new(&project_name)
            .save(root)
            .context("failed to write config.yaml")?;
    }

    let config = Config::load(root).context("failed to load config")?;
    let site = config
        .registry()
        .context("invalid action definitions in config")?;
    let db = ActionDb::open(&paths::db_path(root)).context("failed to open database")?;
    let summary = site
        .populate_action_types(&db)
        .context("failed to populate action types")?;

    if json {
        crate::output::print_json(&serde_json::json!({
            "root": root.display().to_string(),
            "config_created": created_config,
            "action_types": summary,
        }))?;
        return Ok(());
    }

    if created_config {
        println!("  created: {}", paths::CONFIG_FILE);
    } else {
        println!("  exists:  {}", paths::CONFIG_FILE);
    }
    println!(
        "  action types: {} created, {} updated, {} unchanged",
        summary.created, summary.updated, summary.unchanged
    );
    println!("\nNext: action-item subject add <SUBJECT>");
    Ok(())
}

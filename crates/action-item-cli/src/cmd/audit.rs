use super::Project;
use crate::output::print_json;
use action_item_core::audit::{audit, repair};
use anyhow::Context;
use std::path::Path;

pub fn run(root: &Path, apply_repair: bool, json: bool) -> anyhow::Result<()> {
    let project = Project::open(root)?;
    let findings = audit(&project.db, Some(&project.site)).context("audit failed")?;
    let repaired = if apply_repair {
        repair(&project.db, &findings).context("repair failed")?
    } else {
        Vec::new()
    };

    if json {
        return print_json(&serde_json::json!({
            "findings": findings,
            "repaired": repaired,
        }));
    }

    if findings.is_empty() {
        println!("No integrity problems found.");
        return Ok(());
    }
    for finding in &findings {
        let mark = if repaired.contains(finding) {
            "repaired"
        } else if finding.is_repairable() {
            "fixable"
        } else {
            "manual"
        };
        println!("[{mark}] {finding}");
    }
    if !apply_repair && findings.iter().any(|f| f.is_repairable()) {
        println!("\nRun with --repair to fix the fixable findings.");
    }
    Ok(())
}

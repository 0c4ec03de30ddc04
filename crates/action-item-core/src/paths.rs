use crate::error::{ActionError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const DATA_DIR: &str = ".action-items";
pub const OUTBOX_DIR: &str = ".action-items/outbox";

pub const CONFIG_FILE: &str = ".action-items/config.yaml";
pub const DB_FILE: &str = ".action-items/action-items.redb";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn data_dir(root: &Path) -> PathBuf {
    root.join(DATA_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn db_path(root: &Path) -> PathBuf {
    root.join(DB_FILE)
}

pub fn outbox_dir(root: &Path) -> PathBuf {
    root.join(OUTBOX_DIR)
}

// ---------------------------------------------------------------------------
// Name validation
// ---------------------------------------------------------------------------

static NAME_RE: OnceLock<Regex> = OnceLock::new();
static SUBJECT_RE: OnceLock<Regex> = OnceLock::new();

fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9_\-]*[a-z0-9]$|^[a-z0-9]$").unwrap())
}

fn subject_re() -> &'static Regex {
    SUBJECT_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9\-]*$").unwrap())
}

pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 64 || !name_re().is_match(name) {
        return Err(ActionError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Model labels look like `adverse_event.ae_initial`; each dotted part must
/// be a valid name.
pub fn validate_model_label(label: &str) -> Result<()> {
    if label.is_empty() || label.split('.').any(|part| validate_name(part).is_err()) {
        return Err(ActionError::InvalidName(label.to_string()));
    }
    Ok(())
}

pub fn validate_subject_identifier(subject_identifier: &str) -> Result<()> {
    if subject_identifier.len() > 50 || !subject_re().is_match(subject_identifier) {
        return Err(ActionError::InvalidSubjectIdentifier(
            subject_identifier.to_string(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

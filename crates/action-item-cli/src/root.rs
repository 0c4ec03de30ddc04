use action_item_core::paths;
use std::path::{Path, PathBuf};

/// Resolve the project root.
///
/// Priority:
/// 1. `--root` flag / `ACTION_ITEM_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.action-items/`
/// 3. Walk upward from `cwd` looking for `.git/`
/// 4. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    resolve_from(&cwd)
}

fn resolve_from(start: &Path) -> PathBuf {
    find_upward(start, paths::DATA_DIR)
        .or_else(|| find_upward(start, ".git"))
        .unwrap_or_else(|| start.to_path_buf())
}

fn find_upward(start: &Path, marker: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(marker).is_dir())
        .map(Path::to_path_buf)
}

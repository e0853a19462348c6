use std::path::{Path, PathBuf};

use retention_core::paths::RETENTION_DIR;

/// Resolve the project root.
///
/// `--root` / `RETENTION_ROOT` wins. Otherwise walk upward from the current
/// directory looking for `.retention/`, falling back to the current directory.
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_project(&cwd).unwrap_or(cwd)
}

fn find_project(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(RETENTION_DIR).is_dir())
        .map(Path::to_path_buf)
}

use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const RETENTION_DIR: &str = ".retention";
pub const CONFIG_FILE: &str = ".retention/config.yaml";
pub const DEFAULT_DATABASE: &str = ".retention/retention.db";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn retention_dir(root: &Path) -> PathBuf {
    root.join(RETENTION_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Resolve a configured database path. Relative paths are anchored at `root`.
pub fn database_path(root: &Path, configured: &Path) -> PathBuf {
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        root.join(configured)
    }
}

use std::path::PathBuf;
use std::sync::Arc;

use retention_core::config::Config;
use retention_core::store::RetentionDb;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
    pub config: Arc<Config>,
    pub db: Arc<RetentionDb>,
}

impl AppState {
    /// Load `.retention/config.yaml` under `root` and open its database.
    pub fn open(root: PathBuf) -> retention_core::Result<Self> {
        let config = Config::load(&root)?;
        let db = RetentionDb::open(&config.database_path(&root))?;
        Ok(Self::new(root, config, db))
    }

    pub fn new(root: PathBuf, config: Config, db: RetentionDb) -> Self {
        Self {
            root,
            config: Arc::new(config),
            db: Arc::new(db),
        }
    }
}

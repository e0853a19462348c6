use anyhow::Context;
use retention_core::{config::Config, paths, store::RetentionDb};
use std::path::Path;

use crate::output::print_json;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let dir = paths::retention_dir(root);
    std::fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let created = Config::write_default(root).context("failed to write config.yaml")?;
    let config = Config::load(root).context("failed to load config.yaml")?;

    let db_path = config.database_path(root);
    RetentionDb::open(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.display()))?;

    if json {
        return print_json(&serde_json::json!({
            "root": root,
            "config_created": created,
            "database": db_path,
        }));
    }

    println!("Initializing retention in: {}", root.display());
    if created {
        println!("  created: {}", paths::CONFIG_FILE);
    } else {
        println!("  exists:  {}", paths::CONFIG_FILE);
    }
    println!("  database: {}", db_path.display());
    Ok(())
}

pub mod campaign;
pub mod config;
pub mod execution;
pub mod init;
pub mod member;
pub mod playbook;
pub mod policy;
pub mod risk;
pub mod serve;
pub mod settings;
pub mod trigger;
pub mod worker;

use anyhow::{anyhow, Context};
use retention_core::config::Config;
use retention_core::store::RetentionDb;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::Path;
use uuid::Uuid;

/// Load the project config and open its database.
pub(crate) fn open(root: &Path) -> anyhow::Result<(Config, RetentionDb)> {
    let config = Config::load(root).context("failed to load config (run `retention init`)")?;
    let path = config.database_path(root);
    let db = RetentionDb::open(&path)
        .with_context(|| format!("failed to open database {}", path.display()))?;
    Ok((config, db))
}

pub(crate) fn open_db(root: &Path) -> anyhow::Result<RetentionDb> {
    open(root).map(|(_, db)| db)
}

pub(crate) fn require_org(org: Option<Uuid>) -> anyhow::Result<Uuid> {
    org.ok_or_else(|| anyhow!("--org (or RETENTION_ORG) is required"))
}

/// Parse a snake_case enum name through its serde representation.
pub(crate) fn parse_enum<T: DeserializeOwned>(field: &str, raw: &str) -> anyhow::Result<T> {
    serde_json::from_value(Value::String(raw.to_string()))
        .map_err(|_| anyhow!("invalid {field} '{raw}'"))
}

/// Collect `KEY=VALUE` arguments into a JSON object of strings.
pub(crate) fn parse_context(pairs: &[String]) -> anyhow::Result<Map<String, Value>> {
    let mut map = Map::new();
    for pair in pairs {
        let (k, v) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("context entry '{pair}' must be KEY=VALUE"))?;
        if k.trim().is_empty() {
            anyhow::bail!("context entry '{pair}' has an empty key");
        }
        map.insert(k.trim().to_string(), Value::String(v.to_string()));
    }
    Ok(map)
}

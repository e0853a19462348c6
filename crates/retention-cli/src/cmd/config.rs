use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use retention_core::config::{Config, WarnLevel};
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the resolved service configuration
    Show,

    /// Validate the config for common mistakes
    Validate,
}

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    match subcmd {
        ConfigSubcommand::Show => show(&config, root, json),
        ConfigSubcommand::Validate => validate(&config, json),
    }
}

fn show(config: &Config, root: &Path, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(config);
    }
    println!("database:         {}", config.database_path(root).display());
    println!("worker tick:      {}ms", config.worker.tick_interval_ms);
    println!("worker batch:     {}", config.worker.batch_size);
    println!(
        "retry:            {} attempts, backoff {}s..{}s",
        config.retry.max_attempts,
        config.retry.base_backoff_seconds,
        config.retry.max_backoff_seconds
    );
    println!("server port:      {}", config.server.port);
    Ok(())
}

fn validate(config: &Config, json: bool) -> anyhow::Result<()> {
    let warnings = config.validate();

    if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}

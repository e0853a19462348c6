use crate::cmd::{open_db, require_org};
use crate::output::print_json;
use clap::Subcommand;
use retention_core::store::RetentionDb;
use serde_json::Value;
use std::path::Path;
use uuid::Uuid;

#[derive(Subcommand)]
pub enum SettingsSubcommand {
    /// Show overrides and the resolved settings
    Show,

    /// Override one top-level setting
    Set {
        /// risk_bands, streak_break_days, missed_bookings_threshold,
        /// billing_risk, or processing_sla_seconds
        key: String,
        /// JSON value, e.g. 120 or '{"count": 3, "window_days": 14}'
        value: String,
    },

    /// Remove an override so the default applies again
    Clear { key: String },
}

pub fn run(
    root: &Path,
    org: Option<Uuid>,
    subcmd: SettingsSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let org = require_org(org)?;
    let db = open_db(root)?;

    match subcmd {
        SettingsSubcommand::Show => show(&db, org, json),
        SettingsSubcommand::Set { key, value } => {
            let value: Value =
                serde_json::from_str(&value).unwrap_or_else(|_| Value::String(value.clone()));
            db.set_setting(org, &key, &value)?;
            if !json {
                println!("Set {key} = {value}");
            }
            show(&db, org, json)
        }
        SettingsSubcommand::Clear { key } => {
            let removed = db.clear_setting(org, &key)?;
            if !json {
                if removed {
                    println!("Cleared {key}");
                } else {
                    println!("No override for {key}");
                }
            }
            show(&db, org, json)
        }
    }
}

fn show(db: &RetentionDb, org: Uuid, json: bool) -> anyhow::Result<()> {
    let overrides = db.list_settings(org)?;
    let resolved = db.resolve_settings(org)?;
    if json {
        return print_json(&serde_json::json!({
            "overrides": overrides,
            "resolved": resolved,
        }));
    }

    println!("Resolved settings for {org}:");
    for band in &resolved.risk_bands {
        println!("  band {:<12} {:>3}..{:<3}", band.name, band.min, band.max);
    }
    println!("  streak_break_days          {}", resolved.streak_break_days);
    println!(
        "  missed_bookings_threshold  {} in {} days",
        resolved.missed_bookings_threshold.count, resolved.missed_bookings_threshold.window_days
    );
    println!("  billing_risk.overdue_days  {}", resolved.billing_risk.overdue_days);
    println!("  processing_sla_seconds     {}", resolved.processing_sla_seconds);
    if overrides.is_empty() {
        println!("No overrides.");
    } else {
        println!("Overrides: {}", overrides.keys().cloned().collect::<Vec<_>>().join(", "));
    }
    Ok(())
}

use crate::cmd::{open_db, require_org};
use crate::output::print_json;
use chrono::Utc;
use retention_core::campaigns;
use std::path::Path;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// win-back
// ---------------------------------------------------------------------------

pub fn win_back(root: &Path, org: Option<Uuid>, days: u32, json: bool) -> anyhow::Result<()> {
    let org = require_org(org)?;
    let db = open_db(root)?;
    let triggered = campaigns::run_win_back(&db, org, days, Utc::now())?;
    if json {
        return print_json(&serde_json::json!({ "days": days, "triggered": triggered }));
    }
    println!("Triggered win-back for {triggered} member(s) canceled in the last {days} days.");
    Ok(())
}

// ---------------------------------------------------------------------------
// freeze-rescue
// ---------------------------------------------------------------------------

pub fn freeze_rescue(
    root: &Path,
    org: Option<Uuid>,
    member: Uuid,
    json: bool,
) -> anyhow::Result<()> {
    let org = require_org(org)?;
    let db = open_db(root)?;
    let execution = campaigns::freeze_rescue(&db, org, member, Utc::now())?;
    if json {
        return print_json(&serde_json::json!({ "execution": execution }));
    }
    match execution {
        Some(e) => println!("Queued freeze rescue execution {}", e.id),
        None => println!("No active freeze_request playbook; nothing triggered."),
    }
    Ok(())
}

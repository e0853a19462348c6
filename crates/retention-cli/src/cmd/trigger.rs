use crate::cmd::{open_db, parse_context, require_org};
use crate::output::print_json;
use chrono::Utc;
use retention_core::dispatch;
use std::path::Path;
use uuid::Uuid;

/// Record a pending execution and enqueue it. Processing happens in the worker.
pub fn run(
    root: &Path,
    org: Option<Uuid>,
    playbook: Uuid,
    member: Option<Uuid>,
    lead: Option<Uuid>,
    context: &[String],
    json: bool,
) -> anyhow::Result<()> {
    let org = require_org(org)?;
    let context = parse_context(context)?;
    let db = open_db(root)?;

    let execution = match (member, lead) {
        (Some(member), None) => dispatch::trigger_for_member(
            &db,
            org,
            member,
            playbook,
            context,
            Utc::now(),
        )?,
        (None, Some(lead)) => dispatch::trigger_for_lead(
            &db,
            org,
            lead,
            playbook,
            context,
            Utc::now(),
        )?,
        _ => anyhow::bail!("exactly one of --member or --lead is required"),
    };

    if json {
        return print_json(&execution);
    }
    println!(
        "Queued execution {} (playbook v{})",
        execution.id, execution.playbook_version
    );
    Ok(())
}

//! Playbook trigger dispatcher.
//!
//! A trigger synchronously records a pending execution bound to the playbook's
//! newest version and places a job on the playbooks queue. It never waits for
//! processing.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::info;
use uuid::Uuid;

use crate::error::{Result, RetentionError};
use crate::execution::{Job, PlaybookExecution, Recipient};
use crate::store::RetentionDb;

pub fn trigger_for_member(
    db: &RetentionDb,
    organization_id: Uuid,
    member_id: Uuid,
    playbook_id: Uuid,
    context: Map<String, Value>,
    now: DateTime<Utc>,
) -> Result<PlaybookExecution> {
    db.member(organization_id, member_id)?;
    trigger(db, organization_id, Recipient::Member(member_id), playbook_id, context, now)
}

pub fn trigger_for_lead(
    db: &RetentionDb,
    organization_id: Uuid,
    lead_id: Uuid,
    playbook_id: Uuid,
    context: Map<String, Value>,
    now: DateTime<Utc>,
) -> Result<PlaybookExecution> {
    db.lead(organization_id, lead_id)?;
    trigger(db, organization_id, Recipient::Lead(lead_id), playbook_id, context, now)
}

fn trigger(
    db: &RetentionDb,
    organization_id: Uuid,
    recipient: Recipient,
    playbook_id: Uuid,
    context: Map<String, Value>,
    now: DateTime<Utc>,
) -> Result<PlaybookExecution> {
    let playbook = db.playbook(organization_id, playbook_id)?;
    if playbook.is_archived() {
        return Err(RetentionError::PlaybookArchived(playbook_id));
    }
    let version = db
        .latest_version(playbook_id)?
        .ok_or(RetentionError::PlaybookNotFound(playbook_id))?;
    let sla_seconds = db.resolve_settings(organization_id)?.processing_sla_seconds;

    let execution = PlaybookExecution::pending(&version, recipient, context, now);
    let job = Job::new(&execution, sla_seconds, now);
    db.insert_execution_with_job(&execution, &job)?;

    info!(
        execution = %execution.id,
        playbook = %playbook_id,
        version = version.version,
        sla_seconds,
        "playbook triggered"
    );
    Ok(execution)
}

//! Execution records, outbox messages, and queue jobs.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::playbook::PlaybookVersion;
use crate::types::{Channel, ExecutionStatus};

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Recipient {
    Member(Uuid),
    Lead(Uuid),
}

impl Recipient {
    pub fn member_id(&self) -> Option<Uuid> {
        match self {
            Recipient::Member(id) => Some(*id),
            Recipient::Lead(_) => None,
        }
    }

    pub fn lead_id(&self) -> Option<Uuid> {
        match self {
            Recipient::Lead(id) => Some(*id),
            Recipient::Member(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// PlaybookExecution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub sla_met: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One firing of a playbook for one member or lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybookExecution {
    pub id: Uuid,
    pub playbook_id: Uuid,
    /// The version current at trigger time.
    pub playbook_version_id: Uuid,
    pub playbook_version: u32,
    pub organization_id: Uuid,
    pub recipient: Recipient,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub context: Map<String, Value>,
    pub triggered_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ExecutionOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<Uuid>,
}

impl PlaybookExecution {
    /// A fresh pending execution bound to `version`.
    pub fn pending(
        version: &PlaybookVersion,
        recipient: Recipient,
        context: Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            playbook_id: version.playbook_id,
            playbook_version_id: version.id,
            playbook_version: version.version,
            organization_id: version.organization_id,
            recipient,
            status: ExecutionStatus::Pending,
            context,
            triggered_at: now,
            processed_at: None,
            outcome: None,
            message_id: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ExecutionStatus::Pending
    }

    /// Context override for the message body, if the trigger supplied one.
    pub fn message_override(&self) -> Option<&str> {
        self.context
            .get("message")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}

/// True when processing finished within the SLA budget. The boundary counts as met.
///
/// A budget too large for [`TimeDelta`] can never be exceeded.
pub fn sla_met(triggered_at: DateTime<Utc>, processed_at: DateTime<Utc>, sla_seconds: u64) -> bool {
    let Some(budget) = i64::try_from(sla_seconds).ok().and_then(TimeDelta::try_seconds) else {
        return true;
    };
    processed_at.signed_duration_since(triggered_at) <= budget
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Handed to the messaging boundary; transport owns every later state.
    Queued,
}

/// Outbox record for the messaging sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub recipient: Recipient,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<Uuid>,
    pub playbook_id: Uuid,
    pub channel: Channel,
    pub body: String,
    pub status: MessageStatus,
    pub queued_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// A unit of work on the playbooks queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub organization_id: Uuid,
    pub sla_seconds: u64,
    /// Attempts already made; 0 for a fresh job.
    #[serde(default)]
    pub attempt: u32,
    pub available_at: DateTime<Utc>,
    pub enqueued_at: DateTime<Utc>,
}

impl Job {
    pub fn new(execution: &PlaybookExecution, sla_seconds: u64, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            execution_id: execution.id,
            organization_id: execution.organization_id,
            sla_seconds,
            attempt: 0,
            available_at: now,
            enqueued_at: now,
        }
    }
}

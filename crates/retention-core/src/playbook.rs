//! Playbook definitions and their lifecycle.
//!
//! A [`Playbook`] is the mutable "current definition" pointer; every create
//! and update also appends an immutable [`PlaybookVersion`] (see
//! `store::playbooks`). Lifecycle:
//!
//! ```text
//! draft ──activate──▶ active ◀──activate── paused
//!                       └────────pause────────▶┘
//! any ──archive──▶ archived (terminal)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Result, RetentionError};
use crate::types::{Channel, PlaybookStatus, TriggerType};

// ---------------------------------------------------------------------------
// ChannelStrategy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStrategy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<Channel>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback: Vec<Channel>,
}

impl ChannelStrategy {
    pub fn primary(channel: Channel) -> Self {
        Self {
            primary: Some(channel),
            fallback: Vec::new(),
        }
    }

    /// The channel a message goes out on: `primary`, else SMS.
    pub fn resolved(&self) -> Channel {
        self.primary.unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// PlaybookDefinition
// ---------------------------------------------------------------------------

fn empty_object() -> Value {
    Value::Object(Default::default())
}

/// The versioned part of a playbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybookDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub trigger_type: TriggerType,
    #[serde(default = "empty_object")]
    pub trigger_config: Value,
    #[serde(default = "empty_object")]
    pub audience_filter: Value,
    #[serde(default)]
    pub channel_strategy: ChannelStrategy,
    #[serde(default = "empty_object")]
    pub throttle_rules: Value,
    #[serde(default = "empty_object")]
    pub quiet_hours: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_template_id: Option<Uuid>,
}

impl PlaybookDefinition {
    pub fn new(name: impl Into<String>, trigger_type: TriggerType) -> Self {
        Self {
            name: name.into(),
            description: None,
            trigger_type,
            trigger_config: empty_object(),
            audience_filter: empty_object(),
            channel_strategy: ChannelStrategy::default(),
            throttle_rules: empty_object(),
            quiet_hours: empty_object(),
            primary_template_id: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(RetentionError::invalid("name", "must not be empty"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PlaybookPatch
// ---------------------------------------------------------------------------

/// Partial update. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybookPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub trigger_type: Option<TriggerType>,
    #[serde(default)]
    pub trigger_config: Option<Value>,
    #[serde(default)]
    pub audience_filter: Option<Value>,
    #[serde(default)]
    pub channel_strategy: Option<ChannelStrategy>,
    #[serde(default)]
    pub throttle_rules: Option<Value>,
    #[serde(default)]
    pub quiet_hours: Option<Value>,
    #[serde(default)]
    pub primary_template_id: Option<Uuid>,
}

impl PlaybookPatch {
    pub fn apply(self, def: &mut PlaybookDefinition) {
        if let Some(v) = self.name {
            def.name = v;
        }
        if let Some(v) = self.description {
            def.description = Some(v);
        }
        if let Some(v) = self.trigger_type {
            def.trigger_type = v;
        }
        if let Some(v) = self.trigger_config {
            def.trigger_config = v;
        }
        if let Some(v) = self.audience_filter {
            def.audience_filter = v;
        }
        if let Some(v) = self.channel_strategy {
            def.channel_strategy = v;
        }
        if let Some(v) = self.throttle_rules {
            def.throttle_rules = v;
        }
        if let Some(v) = self.quiet_hours {
            def.quiet_hours = v;
        }
        if let Some(v) = self.primary_template_id {
            def.primary_template_id = Some(v);
        }
    }
}

// ---------------------------------------------------------------------------
// Playbook
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playbook {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub status: PlaybookStatus,
    #[serde(flatten)]
    pub definition: PlaybookDefinition,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
}

impl Playbook {
    pub fn new(organization_id: Uuid, definition: PlaybookDefinition, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id,
            status: PlaybookStatus::Draft,
            definition,
            created_at: now,
            updated_at: now,
            archived_at: None,
        }
    }

    pub fn is_archived(&self) -> bool {
        self.status == PlaybookStatus::Archived
    }

    fn invalid(&self, to: PlaybookStatus, reason: &str) -> RetentionError {
        RetentionError::InvalidTransition {
            from: self.status.to_string(),
            to: to.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Apply a definition patch. Archived playbooks are frozen.
    pub fn apply_patch(&mut self, patch: PlaybookPatch, now: DateTime<Utc>) -> Result<()> {
        if self.is_archived() {
            return Err(RetentionError::PlaybookArchived(self.id));
        }
        let mut next = self.definition.clone();
        patch.apply(&mut next);
        next.validate()?;
        self.definition = next;
        self.updated_at = now;
        Ok(())
    }

    /// Returns `false` when already active.
    pub fn activate(&mut self, now: DateTime<Utc>) -> Result<bool> {
        match self.status {
            PlaybookStatus::Active => Ok(false),
            PlaybookStatus::Draft | PlaybookStatus::Paused => {
                self.status = PlaybookStatus::Active;
                self.updated_at = now;
                Ok(true)
            }
            PlaybookStatus::Archived => {
                let reason = "archived playbooks cannot be reactivated";
                Err(self.invalid(PlaybookStatus::Active, reason))
            }
        }
    }

    /// Returns `false` when already paused.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<bool> {
        match self.status {
            PlaybookStatus::Paused => Ok(false),
            PlaybookStatus::Active => {
                self.status = PlaybookStatus::Paused;
                self.updated_at = now;
                Ok(true)
            }
            PlaybookStatus::Draft => {
                Err(self.invalid(PlaybookStatus::Paused, "only active playbooks can be paused"))
            }
            PlaybookStatus::Archived => {
                Err(self.invalid(PlaybookStatus::Paused, "archived playbooks cannot be paused"))
            }
        }
    }

    /// Returns `false` when already archived.
    pub fn archive(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_archived() {
            return false;
        }
        self.status = PlaybookStatus::Archived;
        self.archived_at = Some(now);
        self.updated_at = now;
        true
    }
}

// ---------------------------------------------------------------------------
// PlaybookVersion
// ---------------------------------------------------------------------------

/// Immutable snapshot of a playbook definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybookVersion {
    pub id: Uuid,
    pub playbook_id: Uuid,
    pub organization_id: Uuid,
    pub version: u32,
    pub definition: PlaybookDefinition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_summary: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

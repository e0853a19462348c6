use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::RetentionError;

// ---------------------------------------------------------------------------
// PlaybookStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybookStatus {
    Draft,
    Active,
    Paused,
    Archived,
}

impl PlaybookStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PlaybookStatus::Draft => "draft",
            PlaybookStatus::Active => "active",
            PlaybookStatus::Paused => "paused",
            PlaybookStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for PlaybookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TriggerType
// ---------------------------------------------------------------------------

/// The event kinds a playbook can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Manual,
    RiskBand,
    FreezeRequest,
    WinBack,
}

impl TriggerType {
    pub fn all() -> &'static [TriggerType] {
        &[
            TriggerType::Manual,
            TriggerType::RiskBand,
            TriggerType::FreezeRequest,
            TriggerType::WinBack,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TriggerType::Manual => "manual",
            TriggerType::RiskBand => "risk_band",
            TriggerType::FreezeRequest => "freeze_request",
            TriggerType::WinBack => "win_back",
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TriggerType {
    type Err = RetentionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TriggerType::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                RetentionError::invalid("trigger_type", format!("unknown trigger '{s}'"))
            })
    }
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    #[default]
    Sms,
    Email,
    Push,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Sms => "sms",
            Channel::Email => "email",
            Channel::Push => "push",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Channel {
    type Err = RetentionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sms" => Ok(Channel::Sms),
            "email" => Ok(Channel::Email),
            "push" => Ok(Channel::Push),
            _ => Err(RetentionError::invalid("channel", format!("unknown channel '{s}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// ExecutionStatus
// ---------------------------------------------------------------------------

/// Lifecycle of a playbook execution.
///
/// Transitions: `Pending → Sent | Failed`, exactly once. Both terminal states
/// absorb redelivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Sent,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Sent => "sent",
            ExecutionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = RetentionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ExecutionStatus::Pending),
            "sent" => Ok(ExecutionStatus::Sent),
            "failed" => Ok(ExecutionStatus::Failed),
            _ => Err(RetentionError::invalid("status", format!("unknown execution status '{s}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn trigger_type_parses_every_variant() {
        for &t in TriggerType::all() {
            assert_eq!(TriggerType::from_str(t.as_str()).unwrap(), t);
        }
        assert!(TriggerType::from_str("birthday").is_err());
    }

    #[test]
    fn trigger_type_serializes_snake_case() {
        let json = serde_json::to_string(&TriggerType::FreezeRequest).unwrap();
        assert_eq!(json, "\"freeze_request\"");
    }

    #[test]
    fn channel_defaults_to_sms() {
        assert_eq!(Channel::default(), Channel::Sms);
        assert_eq!(Channel::from_str("email").unwrap(), Channel::Email);
        assert!(Channel::from_str("fax").is_err());
    }

    #[test]
    fn execution_status_display() {
        assert_eq!(ExecutionStatus::Pending.to_string(), "pending");
        assert_eq!(ExecutionStatus::from_str("sent").unwrap(), ExecutionStatus::Sent);
    }
}

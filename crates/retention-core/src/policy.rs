//! Per-organization communication policy.
//!
//! Stored and served here for messaging senders; the execution processor does
//! not consult it. Enforcement belongs to the transport layer.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RetentionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimezoneStrategy {
    MemberLocal,
    StudioLocal,
    Utc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl QuietHours {
    /// True if `t` falls in the window. Windows may wrap midnight.
    pub fn contains(&self, t: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= t && t < self.end
        } else {
            t >= self.start || t < self.end
        }
    }
}

/// Missing fields take their default; an explicit `null` clears quiet hours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommunicationPolicy {
    pub quiet_hours: Option<QuietHours>,
    pub daily_cap: u32,
    pub weekly_cap: u32,
    pub timezone_strategy: TimezoneStrategy,
    pub enforce_stop_keywords: bool,
}

impl Default for CommunicationPolicy {
    fn default() -> Self {
        Self {
            quiet_hours: Some(QuietHours {
                start: NaiveTime::from_hms_opt(21, 0, 0).unwrap_or(NaiveTime::MIN),
                end: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            }),
            daily_cap: 3,
            weekly_cap: 10,
            timezone_strategy: TimezoneStrategy::MemberLocal,
            enforce_stop_keywords: true,
        }
    }
}

impl CommunicationPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.weekly_cap < self.daily_cap {
            return Err(RetentionError::invalid(
                "weekly_cap",
                format!("{} is below daily_cap {}", self.weekly_cap, self.daily_cap),
            ));
        }
        Ok(())
    }
}

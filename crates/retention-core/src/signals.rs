//! Members, leads, and the behavioral signals risk scoring reads.
//!
//! This core reads these records but does not own them; they are written by
//! the surrounding application (imports, front desk, billing sync).

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

// ---------------------------------------------------------------------------
// Member / Lead
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    Active,
    Frozen,
    Canceled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub status: MemberStatus,
    pub joined_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canceled_at: Option<DateTime<Utc>>,
}

impl Member {
    pub fn new(
        organization_id: Uuid,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id,
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: None,
            phone: None,
            status: MemberStatus::Active,
            joined_at: Utc::now(),
            canceled_at: None,
        }
    }

    pub fn cancel(&mut self, at: DateTime<Utc>) {
        self.status = MemberStatus::Canceled;
        self.canceled_at = Some(at);
    }

    /// True if the member canceled at or after `since`.
    pub fn canceled_since(&self, since: DateTime<Utc>) -> bool {
        self.status == MemberStatus::Canceled && self.canceled_at.is_some_and(|at| at >= since)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Lead {
    pub fn new(organization_id: Uuid, first_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id,
            first_name: first_name.into(),
            email: None,
            phone: None,
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckIn {
    pub id: Uuid,
    pub member_id: Uuid,
    pub checked_in_at: DateTime<Utc>,
}

impl CheckIn {
    pub fn new(member_id: Uuid, checked_in_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            member_id,
            checked_in_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Booked,
    Attended,
    NoShow,
    Canceled,
}

impl BookingStatus {
    pub fn is_missed(self) -> bool {
        matches!(self, BookingStatus::NoShow | BookingStatus::Canceled)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub member_id: Uuid,
    pub class_type: String,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(
        member_id: Uuid,
        class_type: impl Into<String>,
        status: BookingStatus,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            member_id,
            class_type: class_type.into(),
            status,
            created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Pending,
    Overdue,
    Refunded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub member_id: Uuid,
    pub amount_cents: i64,
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn new(
        member_id: Uuid,
        amount_cents: i64,
        status: PaymentStatus,
        due_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            member_id,
            amount_cents,
            status,
            due_at,
        }
    }

    /// Overdue outright, or pending past the grace period.
    pub fn is_billing_risk(&self, now: DateTime<Utc>, grace_days: u32) -> bool {
        match self.status {
            PaymentStatus::Overdue => true,
            PaymentStatus::Pending => {
                let cutoff = days_before(now, grace_days);
                self.due_at.is_some_and(|due| due <= cutoff)
            }
            PaymentStatus::Paid | PaymentStatus::Refunded => false,
        }
    }
}

// ---------------------------------------------------------------------------
// MemberSignals / SignalSource
// ---------------------------------------------------------------------------

/// Start of a trailing window of `days` ending at `now`. Saturates at the
/// earliest representable instant, so an oversized window means "no cutoff".
pub fn days_before(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    TimeDelta::try_days(i64::from(days))
        .and_then(|d| now.checked_sub_signed(d))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Everything the scoring rules look at for one member.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemberSignals {
    pub last_check_in: Option<DateTime<Utc>>,
    pub bookings: Vec<Booking>,
    pub payments: Vec<Payment>,
}

/// Read-only signal queries used by the scoring engine.
pub trait SignalSource {
    fn last_check_in(&self, member_id: Uuid) -> Result<Option<DateTime<Utc>>>;

    /// Bookings created at or after `since`.
    fn bookings_since(&self, member_id: Uuid, since: DateTime<Utc>) -> Result<Vec<Booking>>;

    fn payments(&self, member_id: Uuid) -> Result<Vec<Payment>>;

    fn signals(&self, member_id: Uuid, bookings_since: DateTime<Utc>) -> Result<MemberSignals> {
        Ok(MemberSignals {
            last_check_in: self.last_check_in(member_id)?,
            bookings: self.bookings_since(member_id, bookings_since)?,
            payments: self.payments(member_id)?,
        })
    }
}

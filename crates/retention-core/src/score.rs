//! Rule-based churn risk scoring.
//!
//! Three independent signals each contribute a fixed number of points; the
//! total is capped at [`MAX_SCORE`]. Reasons keep evaluation order
//! (streak, bookings, billing) and omit signals that did not fire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::settings::RetentionSettings;
use crate::signals::{days_before, MemberSignals, SignalSource};

pub const MAX_SCORE: u32 = 100;
pub const STREAK_BREAK_POINTS: u32 = 25;
pub const STREAK_BREAK_SEVERE_POINTS: u32 = 40;
pub const MISSED_BOOKINGS_POINTS: u32 = 20;
pub const BILLING_RISK_POINTS: u32 = 25;

// ---------------------------------------------------------------------------
// ReasonCode / RiskReason
// ---------------------------------------------------------------------------

/// Ordered by evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    StreakBreak,
    MissedBookings,
    BillingRisk,
}

impl ReasonCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasonCode::StreakBreak => "streak_break",
            ReasonCode::MissedBookings => "missed_bookings",
            ReasonCode::BillingRisk => "billing_risk",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskReason {
    pub code: ReasonCode,
    pub detail: String,
}

// ---------------------------------------------------------------------------
// RiskAssessment
// ---------------------------------------------------------------------------

/// Output of one scoring pass: a 0-100 score and the reasons behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: u32,
    #[serde(default)]
    pub reasons: Vec<RiskReason>,
}

impl RiskAssessment {
    pub fn codes(&self) -> Vec<ReasonCode> {
        self.reasons.iter().map(|r| r.code).collect()
    }
}

// ---------------------------------------------------------------------------
// Persisted records
// ---------------------------------------------------------------------------

/// The live score for a member. At most one per member; recalculation replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    pub member_id: Uuid,
    pub organization_id: Uuid,
    pub score: u32,
    pub reasons: Vec<RiskReason>,
    pub calculated_at: DateTime<Utc>,
}

/// Append-only history entry written on every recalculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScoreSnapshot {
    pub id: Uuid,
    pub member_id: Uuid,
    pub organization_id: Uuid,
    pub score: u32,
    pub reasons: Vec<RiskReason>,
    pub calculated_at: DateTime<Utc>,
}

impl RiskScore {
    pub fn from_assessment(
        organization_id: Uuid,
        member_id: Uuid,
        assessment: &RiskAssessment,
        calculated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            member_id,
            organization_id,
            score: assessment.score,
            reasons: assessment.reasons.clone(),
            calculated_at,
        }
    }

    pub fn snapshot(&self) -> RiskScoreSnapshot {
        RiskScoreSnapshot {
            id: Uuid::new_v4(),
            member_id: self.member_id,
            organization_id: self.organization_id,
            score: self.score,
            reasons: self.reasons.clone(),
            calculated_at: self.calculated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Score one member from an in-memory signal bundle. Pure.
pub fn evaluate(
    signals: &MemberSignals,
    settings: &RetentionSettings,
    now: DateTime<Utc>,
) -> RiskAssessment {
    let mut total = 0u32;
    let mut reasons = Vec::new();

    // Streak break
    let streak_days = i64::from(settings.streak_break_days);
    let days_since = signals
        .last_check_in
        .map(|last| (now - last).num_days().max(0));
    let streak_points = match days_since {
        None => Some(STREAK_BREAK_SEVERE_POINTS),
        Some(days) if days >= 2 * streak_days => Some(STREAK_BREAK_SEVERE_POINTS),
        Some(days) if days >= streak_days => Some(STREAK_BREAK_POINTS),
        Some(_) => None,
    };
    if let Some(points) = streak_points {
        total += points;
        reasons.push(RiskReason {
            code: ReasonCode::StreakBreak,
            detail: match days_since {
                None => "No recorded check-ins".to_string(),
                Some(days) => format!("No check-in in {days} days"),
            },
        });
    }

    // Missed bookings
    let threshold = &settings.missed_bookings_threshold;
    let window_start = days_before(now, threshold.window_days);
    let missed = signals
        .bookings
        .iter()
        .filter(|b| b.status.is_missed() && b.created_at >= window_start && b.created_at <= now)
        .count() as u32;
    if missed >= threshold.count {
        total += MISSED_BOOKINGS_POINTS;
        reasons.push(RiskReason {
            code: ReasonCode::MissedBookings,
            detail: format!(
                "{missed} missed bookings in the last {} days",
                threshold.window_days
            ),
        });
    }

    // Billing
    let grace = settings.billing_risk.overdue_days;
    if signals.payments.iter().any(|p| p.is_billing_risk(now, grace)) {
        total += BILLING_RISK_POINTS;
        reasons.push(RiskReason {
            code: ReasonCode::BillingRisk,
            detail: "Payment overdue or pending past the grace period".to_string(),
        });
    }

    RiskAssessment {
        score: total.min(MAX_SCORE),
        reasons,
    }
}

/// Score one member, reading its signals through `source`.
pub fn score_member<S: SignalSource + ?Sized>(
    source: &S,
    member_id: Uuid,
    settings: &RetentionSettings,
    now: DateTime<Utc>,
) -> Result<RiskAssessment> {
    let window_start = days_before(now, settings.missed_bookings_threshold.window_days);
    let signals = source.signals(member_id, window_start)?;
    Ok(evaluate(&signals, settings, now))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

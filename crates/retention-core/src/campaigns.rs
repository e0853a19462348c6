//! Callers built on scoring and dispatch: the risk roster, freeze rescue, and
//! win-back runs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map};
use tracing::{debug, info};
use uuid::Uuid;

use crate::band::{resolve_risk_band, RiskBand, UiBand};
use crate::dispatch::trigger_for_member;
use crate::error::{Result, RetentionError};
use crate::execution::PlaybookExecution;
use crate::score::ReasonCode;
use crate::signals::days_before;
use crate::store::RetentionDb;
use crate::types::TriggerType;

pub const DEFAULT_WIN_BACK_DAYS: u32 = 30;
pub const MAX_WIN_BACK_DAYS: u32 = 3650;

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RosterEntry {
    pub member_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub score: u32,
    pub band: RiskBand,
    pub ui_band: UiBand,
    pub reasons: Vec<ReasonCode>,
    pub calculated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Heatmap {
    pub low: usize,
    pub med: usize,
    pub high: usize,
}

impl Heatmap {
    fn add(&mut self, band: UiBand) {
        match band {
            UiBand::Low => self.low += 1,
            UiBand::Med => self.med += 1,
            UiBand::High => self.high += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Roster {
    pub entries: Vec<RosterEntry>,
    pub heatmap: Heatmap,
}

/// Scored members of an organization, riskiest first.
///
/// With `class_type`, only members who ever booked that class are included.
/// Scores whose member record is gone are left out.
pub fn roster(db: &RetentionDb, organization_id: Uuid, class_type: Option<&str>) -> Result<Roster> {
    let settings = db.resolve_settings(organization_id)?;
    let mut entries = Vec::new();
    let mut heatmap = Heatmap::default();

    for score in db.risk_scores(organization_id)? {
        let member = match db.member(organization_id, score.member_id) {
            Ok(m) => m,
            Err(RetentionError::MemberNotFound(_)) => continue,
            Err(e) => return Err(e),
        };
        if let Some(class_type) = class_type {
            let booked = db
                .bookings(member.id)?
                .iter()
                .any(|b| b.class_type.eq_ignore_ascii_case(class_type));
            if !booked {
                continue;
            }
        }

        let band = resolve_risk_band(score.score, &settings);
        let ui_band = UiBand::from(&band);
        heatmap.add(ui_band);
        entries.push(RosterEntry {
            member_id: member.id,
            first_name: member.first_name,
            last_name: member.last_name,
            score: score.score,
            band,
            ui_band,
            reasons: score.reasons.iter().map(|r| r.code).collect(),
            calculated_at: score.calculated_at,
        });
    }

    entries.sort_by(|a, b| b.score.cmp(&a.score).then(a.member_id.cmp(&b.member_id)));
    Ok(Roster { entries, heatmap })
}

// ---------------------------------------------------------------------------
// Freeze rescue
// ---------------------------------------------------------------------------

/// Fire the organization's active `freeze_request` playbook for a member who
/// asked to freeze. `None` when no such playbook is active.
pub fn freeze_rescue(
    db: &RetentionDb,
    organization_id: Uuid,
    member_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Option<PlaybookExecution>> {
    db.member(organization_id, member_id)?;
    let trigger = TriggerType::FreezeRequest;
    let Some(playbook) = db.find_active_by_trigger(organization_id, trigger)? else {
        debug!(org = %organization_id, "no active freeze_request playbook");
        return Ok(None);
    };

    let mut context = Map::new();
    context.insert("reason".to_string(), json!("freeze_intent"));
    let execution = trigger_for_member(db, organization_id, member_id, playbook.id, context, now)?;
    Ok(Some(execution))
}

// ---------------------------------------------------------------------------
// Win-back
// ---------------------------------------------------------------------------

/// Trigger the active `win_back` playbook for every member canceled in the
/// trailing `days`. Returns how many members were triggered.
pub fn run_win_back(
    db: &RetentionDb,
    organization_id: Uuid,
    days: u32,
    now: DateTime<Utc>,
) -> Result<usize> {
    if days > MAX_WIN_BACK_DAYS {
        return Err(RetentionError::invalid(
            "days",
            format!("must be at most {MAX_WIN_BACK_DAYS}, got {days}"),
        ));
    }
    let Some(playbook) = db.find_active_by_trigger(organization_id, TriggerType::WinBack)? else {
        debug!(org = %organization_id, "no active win_back playbook");
        return Ok(0);
    };

    let since = days_before(now, days);
    let mut count = 0;
    for member in db.list_members(organization_id)? {
        if !member.canceled_since(since) {
            continue;
        }
        trigger_for_member(db, organization_id, member.id, playbook.id, Map::new(), now)?;
        count += 1;
    }

    info!(org = %organization_id, playbook = %playbook.id, days, count, "win-back run");
    Ok(count)
}

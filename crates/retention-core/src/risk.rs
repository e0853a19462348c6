//! Organization-wide risk recalculation and per-member risk lookups.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::band::{resolve_risk_band, RiskBand, UiBand};
use crate::error::Result;
use crate::score::{score_member, RiskScore};
use crate::store::RetentionDb;

/// Recalculate every member of an organization. Returns the number scored.
///
/// Each member's live score and snapshot commit together; members are
/// independent, so a failure part-way leaves earlier members updated.
pub fn calculate_for_organization(
    db: &RetentionDb,
    organization_id: Uuid,
    now: DateTime<Utc>,
) -> Result<usize> {
    let settings = db.resolve_settings(organization_id)?;
    let members = db.list_members(organization_id)?;

    let mut scored = 0;
    for member in &members {
        let assessment = score_member(db, member.id, &settings, now)?;
        debug!(member = %member.id, score = assessment.score, "member scored");
        db.save_risk_score(&RiskScore::from_assessment(
            organization_id,
            member.id,
            &assessment,
            now,
        ))?;
        scored += 1;
    }

    info!(org = %organization_id, scored, "risk recalculated");
    Ok(scored)
}

/// A member's live score together with its band classification.
#[derive(Debug, Clone, Serialize)]
pub struct MemberRisk {
    #[serde(flatten)]
    pub score: RiskScore,
    pub band: RiskBand,
    pub ui_band: UiBand,
}

/// Live score of one member, classified with the organization's bands.
/// `None` until the member has been scored once.
pub fn member_risk(
    db: &RetentionDb,
    organization_id: Uuid,
    member_id: Uuid,
) -> Result<Option<MemberRisk>> {
    let Some(score) = db.risk_score(organization_id, member_id)? else {
        return Ok(None);
    };
    let settings = db.resolve_settings(organization_id)?;
    let band = resolve_risk_band(score.score, &settings);
    Ok(Some(MemberRisk {
        ui_band: UiBand::from(&band),
        band,
        score,
    }))
}

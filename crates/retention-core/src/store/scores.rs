//! Settings store, communication policies, and risk score persistence.

use std::collections::BTreeMap;

use serde_json::Value;
use uuid::Uuid;

use super::{
    db_err, decode, encode, pair_bounds, pair_key, timeline_bounds, timeline_key, RetentionDb,
    POLICIES, RISK_SCORES, RISK_SNAPSHOTS, SETTINGS,
};
use crate::error::Result;
use crate::policy::CommunicationPolicy;
use crate::score::{RiskScore, RiskScoreSnapshot};
use crate::settings::{self, RetentionSettings};

fn setting_key(organization_id: Uuid, key: &str) -> Vec<u8> {
    let mut k = organization_id.as_bytes().to_vec();
    k.extend_from_slice(key.as_bytes());
    k
}

impl RetentionDb {
    // -----------------------------------------------------------------------
    // Settings store
    // -----------------------------------------------------------------------

    pub fn set_setting(&self, organization_id: Uuid, key: &str, value: &Value) -> Result<()> {
        settings::check_override(&RetentionSettings::default(), key, value)?;
        self.write_one(SETTINGS, &setting_key(organization_id, key), value)
    }

    /// Remove an override. Returns `false` if none was stored.
    pub fn clear_setting(&self, organization_id: Uuid, key: &str) -> Result<bool> {
        let wt = self.db.begin_write().map_err(db_err)?;
        let removed = {
            let mut t = wt.open_table(SETTINGS).map_err(db_err)?;
            let removed = t
                .remove(setting_key(organization_id, key).as_slice())
                .map_err(db_err)?;
            removed.is_some()
        };
        wt.commit().map_err(db_err)?;
        Ok(removed)
    }

    /// Stored overrides for one organization, keyed by setting name.
    pub fn list_settings(&self, organization_id: Uuid) -> Result<BTreeMap<String, Value>> {
        let lo = organization_id.as_bytes().to_vec();
        let mut hi = lo.clone();
        hi.push(0xff);

        let rt = self.db.begin_read().map_err(db_err)?;
        let t = rt.open_table(SETTINGS).map_err(db_err)?;
        let mut out = BTreeMap::new();
        for entry in t.range(lo.as_slice()..=hi.as_slice()).map_err(db_err)? {
            let (k, v) = entry.map_err(db_err)?;
            let name = String::from_utf8_lossy(&k.value()[16..]).into_owned();
            out.insert(name, decode(v.value())?);
        }
        Ok(out)
    }

    /// Organization overrides merged over the compiled-in defaults.
    pub fn resolve_settings(&self, organization_id: Uuid) -> Result<RetentionSettings> {
        let overrides = self.list_settings(organization_id)?;
        Ok(settings::resolve(&RetentionSettings::default(), &overrides))
    }

    // -----------------------------------------------------------------------
    // Communication policy
    // -----------------------------------------------------------------------

    pub fn policy(&self, organization_id: Uuid) -> Result<CommunicationPolicy> {
        Ok(self
            .read_one(POLICIES, organization_id.as_bytes())?
            .unwrap_or_default())
    }

    pub fn set_policy(&self, organization_id: Uuid, policy: &CommunicationPolicy) -> Result<()> {
        policy.validate()?;
        self.write_one(POLICIES, organization_id.as_bytes(), policy)
    }

    // -----------------------------------------------------------------------
    // Risk scores
    // -----------------------------------------------------------------------

    /// Upsert the live score and append its snapshot in one transaction.
    pub fn save_risk_score(&self, score: &RiskScore) -> Result<RiskScoreSnapshot> {
        let snapshot = score.snapshot();
        let live = encode(score)?;
        let snap = encode(&snapshot)?;
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut scores = wt.open_table(RISK_SCORES).map_err(db_err)?;
            scores
                .insert(
                    pair_key(score.organization_id, score.member_id).as_slice(),
                    live.as_slice(),
                )
                .map_err(db_err)?;
            let mut snaps = wt.open_table(RISK_SNAPSHOTS).map_err(db_err)?;
            snaps
                .insert(
                    timeline_key(score.member_id, snapshot.calculated_at, snapshot.id).as_slice(),
                    snap.as_slice(),
                )
                .map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(snapshot)
    }

    pub fn risk_score(&self, organization_id: Uuid, member_id: Uuid) -> Result<Option<RiskScore>> {
        self.read_one(RISK_SCORES, &pair_key(organization_id, member_id))
    }

    /// Live scores of every scored member in an organization.
    pub fn risk_scores(&self, organization_id: Uuid) -> Result<Vec<RiskScore>> {
        let (lo, hi) = pair_bounds(organization_id);
        self.read_range(RISK_SCORES, &lo, &hi)
    }

    /// Snapshot history of one member, oldest first.
    pub fn risk_history(&self, member_id: Uuid) -> Result<Vec<RiskScoreSnapshot>> {
        let (lo, hi) = timeline_bounds(member_id, None);
        self.read_range(RISK_SNAPSHOTS, &lo, &hi)
    }
}

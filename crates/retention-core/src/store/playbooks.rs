//! Playbook registry: current definitions plus their immutable version history.

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use super::{
    db_err, encode, get_json, last_json, pair_bounds, pair_key, scan_json, version_key, RetentionDb,
    PLAYBOOKS, PLAYBOOK_VERSIONS,
};
use crate::error::{Result, RetentionError};
use crate::playbook::{Playbook, PlaybookDefinition, PlaybookPatch, PlaybookVersion};
use crate::types::{PlaybookStatus, TriggerType};

fn version_bounds(playbook_id: Uuid) -> ([u8; 20], [u8; 20]) {
    (version_key(playbook_id, 0), version_key(playbook_id, u32::MAX))
}

#[derive(Debug, Clone, Copy)]
enum Transition {
    Activate,
    Pause,
    Archive,
}

impl RetentionDb {
    /// Create a draft playbook together with its version 1.
    pub fn create_playbook(
        &self,
        organization_id: Uuid,
        definition: PlaybookDefinition,
        change_summary: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(Playbook, PlaybookVersion)> {
        definition.validate()?;
        let playbook = Playbook::new(organization_id, definition, now);
        let version = PlaybookVersion {
            id: Uuid::new_v4(),
            playbook_id: playbook.id,
            organization_id,
            version: 1,
            definition: playbook.definition.clone(),
            change_summary,
            created_at: now,
        };

        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut pbs = wt.open_table(PLAYBOOKS).map_err(db_err)?;
            pbs.insert(
                pair_key(organization_id, playbook.id).as_slice(),
                encode(&playbook)?.as_slice(),
            )
            .map_err(db_err)?;
            let mut versions = wt.open_table(PLAYBOOK_VERSIONS).map_err(db_err)?;
            versions
                .insert(version_key(playbook.id, 1).as_slice(), encode(&version)?.as_slice())
                .map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;

        info!(playbook = %playbook.id, org = %organization_id, "playbook created");
        Ok((playbook, version))
    }

    /// Apply a patch and append the next version. The read of the current
    /// highest version and the insert of its successor share one write
    /// transaction, so concurrent updates never collide on a number.
    pub fn update_playbook(
        &self,
        organization_id: Uuid,
        playbook_id: Uuid,
        patch: PlaybookPatch,
        change_summary: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(Playbook, PlaybookVersion)> {
        let key = pair_key(organization_id, playbook_id);
        let wt = self.db.begin_write().map_err(db_err)?;
        let result = {
            let mut pbs = wt.open_table(PLAYBOOKS).map_err(db_err)?;
            let mut playbook: Playbook = get_json(&pbs, &key)?
                .ok_or(RetentionError::PlaybookNotFound(playbook_id))?;
            playbook.apply_patch(patch, now)?;

            let mut versions = wt.open_table(PLAYBOOK_VERSIONS).map_err(db_err)?;
            let (lo, hi) = version_bounds(playbook_id);
            let latest: Option<PlaybookVersion> = last_json(&versions, &lo, &hi)?;
            let next = latest.map_or(1, |v| v.version + 1);
            let version = PlaybookVersion {
                id: Uuid::new_v4(),
                playbook_id,
                organization_id,
                version: next,
                definition: playbook.definition.clone(),
                change_summary,
                created_at: now,
            };

            pbs.insert(key.as_slice(), encode(&playbook)?.as_slice())
                .map_err(db_err)?;
            versions
                .insert(version_key(playbook_id, next).as_slice(), encode(&version)?.as_slice())
                .map_err(db_err)?;
            (playbook, version)
        };
        wt.commit().map_err(db_err)?;

        info!(playbook = %playbook_id, version = result.1.version, "playbook updated");
        Ok(result)
    }

    pub fn activate_playbook(
        &self,
        organization_id: Uuid,
        playbook_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Playbook> {
        self.transition(organization_id, playbook_id, Transition::Activate, now)
    }

    pub fn pause_playbook(
        &self,
        organization_id: Uuid,
        playbook_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Playbook> {
        self.transition(organization_id, playbook_id, Transition::Pause, now)
    }

    /// Archiving an archived playbook is a no-op.
    pub fn archive_playbook(
        &self,
        organization_id: Uuid,
        playbook_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Playbook> {
        self.transition(organization_id, playbook_id, Transition::Archive, now)
    }

    /// Status changes do not create a version.
    fn transition(
        &self,
        organization_id: Uuid,
        playbook_id: Uuid,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<Playbook> {
        let key = pair_key(organization_id, playbook_id);
        let wt = self.db.begin_write().map_err(db_err)?;
        let (playbook, changed) = {
            let mut pbs = wt.open_table(PLAYBOOKS).map_err(db_err)?;
            let mut playbook: Playbook = get_json(&pbs, &key)?
                .ok_or(RetentionError::PlaybookNotFound(playbook_id))?;
            let changed = match transition {
                Transition::Activate => playbook.activate(now)?,
                Transition::Pause => playbook.pause(now)?,
                Transition::Archive => playbook.archive(now),
            };
            if changed {
                pbs.insert(key.as_slice(), encode(&playbook)?.as_slice())
                    .map_err(db_err)?;
            }
            (playbook, changed)
        };
        wt.commit().map_err(db_err)?;

        if changed {
            info!(playbook = %playbook_id, status = %playbook.status, "playbook status changed");
        }
        Ok(playbook)
    }

    pub fn playbook(&self, organization_id: Uuid, playbook_id: Uuid) -> Result<Playbook> {
        self.read_one(PLAYBOOKS, &pair_key(organization_id, playbook_id))?
            .ok_or(RetentionError::PlaybookNotFound(playbook_id))
    }

    /// Non-archived playbooks of an organization, oldest first.
    pub fn list_playbooks(&self, organization_id: Uuid) -> Result<Vec<Playbook>> {
        let mut playbooks = self.all_playbooks(organization_id)?;
        playbooks.retain(|p| !p.is_archived());
        Ok(playbooks)
    }

    fn all_playbooks(&self, organization_id: Uuid) -> Result<Vec<Playbook>> {
        let (lo, hi) = pair_bounds(organization_id);
        let mut playbooks: Vec<Playbook> = self.read_range(PLAYBOOKS, &lo, &hi)?;
        playbooks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(playbooks)
    }

    /// Version history, ascending.
    pub fn playbook_versions(&self, playbook_id: Uuid) -> Result<Vec<PlaybookVersion>> {
        let (lo, hi) = version_bounds(playbook_id);
        self.read_range(PLAYBOOK_VERSIONS, &lo, &hi)
    }

    pub fn latest_version(&self, playbook_id: Uuid) -> Result<Option<PlaybookVersion>> {
        let (lo, hi) = version_bounds(playbook_id);
        let rt = self.db.begin_read().map_err(db_err)?;
        let t = rt.open_table(PLAYBOOK_VERSIONS).map_err(db_err)?;
        last_json(&t, &lo, &hi)
    }

    /// The active playbook for a trigger type. With several candidates the
    /// earliest created wins.
    pub fn find_active_by_trigger(
        &self,
        organization_id: Uuid,
        trigger_type: TriggerType,
    ) -> Result<Option<Playbook>> {
        let (lo, hi) = pair_bounds(organization_id);
        let rt = self.db.begin_read().map_err(db_err)?;
        let t = rt.open_table(PLAYBOOKS).map_err(db_err)?;
        let candidates: Vec<Playbook> = scan_json(&t, &lo, &hi)?;
        Ok(candidates
            .into_iter()
            .filter(|p| {
                p.status == PlaybookStatus::Active && p.definition.trigger_type == trigger_type
            })
            .min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::open_tmp;
    use super::*;
    use crate::playbook::ChannelStrategy;
    use crate::types::Channel;
    use chrono::Duration;
    use std::collections::BTreeSet;

    fn def(name: &str, trigger: TriggerType) -> PlaybookDefinition {
        PlaybookDefinition::new(name, trigger)
    }

    #[test]
    fn create_writes_version_one() {
        let (_dir, db) = open_tmp();
        let org = Uuid::new_v4();
        let (pb, v) = db
            .create_playbook(
                org,
                def("Rescue", TriggerType::RiskBand),
                Some("init".into()),
                Utc::now(),
            )
            .unwrap();
        assert_eq!(pb.status, PlaybookStatus::Draft);
        assert_eq!(v.version, 1);
        assert_eq!(db.playbook_versions(pb.id).unwrap(), vec![v]);
    }

    #[test]
    fn create_rejects_blank_name() {
        let (_dir, db) = open_tmp();
        let err = db
            .create_playbook(Uuid::new_v4(), def(" ", TriggerType::Manual), None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, RetentionError::Invalid { .. }));
    }

    #[test]
    fn update_appends_versions() {
        let (_dir, db) = open_tmp();
        let org = Uuid::new_v4();
        let (pb, _) = db
            .create_playbook(org, def("Rescue", TriggerType::RiskBand), None, Utc::now())
            .unwrap();
        let (updated, v2) = db
            .update_playbook(
                org,
                pb.id,
                PlaybookPatch {
                    channel_strategy: Some(ChannelStrategy::primary(Channel::Email)),
                    ..Default::default()
                },
                Some("email first".into()),
                Utc::now(),
            )
            .unwrap();
        assert_eq!(v2.version, 2);
        assert_eq!(updated.definition.channel_strategy.resolved(), Channel::Email);
        let versions = db.playbook_versions(pb.id).unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].definition.channel_strategy.resolved(), Channel::Sms);
        assert_eq!(db.latest_version(pb.id).unwrap().unwrap().version, 2);
    }

    #[test]
    fn update_from_other_org_is_not_found() {
        let (_dir, db) = open_tmp();
        let (pb, _) = db
            .create_playbook(Uuid::new_v4(), def("Rescue", TriggerType::Manual), None, Utc::now())
            .unwrap();
        let err = db
            .update_playbook(Uuid::new_v4(), pb.id, PlaybookPatch::default(), None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, RetentionError::PlaybookNotFound(_)));
    }

    #[test]
    fn concurrent_updates_get_unique_versions() {
        let (_dir, db) = open_tmp();
        let org = Uuid::new_v4();
        let (pb, _) = db
            .create_playbook(org, def("Rescue", TriggerType::Manual), None, Utc::now())
            .unwrap();
        std::thread::scope(|s| {
            for i in 0..8 {
                let db = &db;
                s.spawn(move || {
                    db.update_playbook(
                        org,
                        pb.id,
                        PlaybookPatch {
                            description: Some(format!("rev {i}")),
                            ..Default::default()
                        },
                        None,
                        Utc::now(),
                    )
                    .unwrap();
                });
            }
        });
        let numbers: BTreeSet<u32> = db
            .playbook_versions(pb.id)
            .unwrap()
            .iter()
            .map(|v| v.version)
            .collect();
        assert_eq!(numbers, (1..=9).collect());
    }

    #[test]
    fn transitions_do_not_bump_version() {
        let (_dir, db) = open_tmp();
        let org = Uuid::new_v4();
        let now = Utc::now();
        let (pb, _) = db
            .create_playbook(org, def("Rescue", TriggerType::Manual), None, now)
            .unwrap();
        assert_eq!(db.activate_playbook(org, pb.id, now).unwrap().status, PlaybookStatus::Active);
        assert_eq!(db.pause_playbook(org, pb.id, now).unwrap().status, PlaybookStatus::Paused);
        assert_eq!(db.archive_playbook(org, pb.id, now).unwrap().status, PlaybookStatus::Archived);
        assert_eq!(db.archive_playbook(org, pb.id, now).unwrap().status, PlaybookStatus::Archived);
        assert_eq!(db.playbook_versions(pb.id).unwrap().len(), 1);
        assert!(db.list_playbooks(org).unwrap().is_empty());
        assert!(matches!(
            db.activate_playbook(org, pb.id, now),
            Err(RetentionError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn find_active_prefers_earliest_created() {
        let (_dir, db) = open_tmp();
        let org = Uuid::new_v4();
        let t0 = Utc::now();
        let (late, _) = db
            .create_playbook(
                org,
                def("Late", TriggerType::WinBack),
                None,
                t0 + Duration::seconds(5),
            )
            .unwrap();
        let (early, _) = db
            .create_playbook(org, def("Early", TriggerType::WinBack), None, t0)
            .unwrap();
        let (_draft, _) = db
            .create_playbook(
                org,
                def("Draft", TriggerType::WinBack),
                None,
                t0 - Duration::seconds(5),
            )
            .unwrap();
        assert!(db.find_active_by_trigger(org, TriggerType::WinBack).unwrap().is_none());

        db.activate_playbook(org, late.id, t0).unwrap();
        db.activate_playbook(org, early.id, t0).unwrap();
        let found = db.find_active_by_trigger(org, TriggerType::WinBack).unwrap().unwrap();
        assert_eq!(found.id, early.id);
        assert!(db.find_active_by_trigger(org, TriggerType::Manual).unwrap().is_none());
        assert!(db
            .find_active_by_trigger(Uuid::new_v4(), TriggerType::WinBack)
            .unwrap()
            .is_none());
    }
}

//! Executions, the message outbox, and the durable playbooks queue.

use chrono::{DateTime, Utc};
use redb::ReadableTable;
use uuid::Uuid;

use super::{
    db_err, decode, encode, get_json, pair_bounds, pair_key, ts_ms, version_key, RetentionDb,
    EXECUTIONS, JOBS, LEADS, MEMBERS, MESSAGES, PLAYBOOKS, PLAYBOOK_VERSIONS,
};
use crate::error::{Result, RetentionError};
use crate::execution::{sla_met, ExecutionOutcome, Job, Message, PlaybookExecution, Recipient};
use crate::playbook::{Playbook, PlaybookDefinition, PlaybookVersion};
use crate::signals::{Lead, Member};
use crate::types::ExecutionStatus;

/// `[ available_at_ms: 8 | job: 16 ]`
fn job_key(job: &Job) -> [u8; 24] {
    let mut key = [0u8; 24];
    key[..8].copy_from_slice(&ts_ms(job.available_at).to_be_bytes());
    key[8..].copy_from_slice(job.id.as_bytes());
    key
}

/// Everything a processor needs to render the message for one execution.
#[derive(Debug, Clone)]
pub struct DeliveryContext {
    pub execution: PlaybookExecution,
    /// Definition of the version bound at trigger time.
    pub definition: PlaybookDefinition,
    pub first_name: Option<String>,
}

/// The result of a successful delivery, committed with the execution update.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message: Message,
    pub processed_at: DateTime<Utc>,
    pub sla_met: bool,
}

impl RetentionDb {
    // -----------------------------------------------------------------------
    // Executions
    // -----------------------------------------------------------------------

    /// Persist a pending execution and enqueue its job atomically.
    ///
    /// The playbook is re-read inside the write transaction, so an archive
    /// that commits first makes this fail with `PlaybookArchived`.
    pub fn insert_execution_with_job(
        &self,
        execution: &PlaybookExecution,
        job: &Job,
    ) -> Result<()> {
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let pbs = wt.open_table(PLAYBOOKS).map_err(db_err)?;
            let playbook: Playbook = get_json(
                &pbs,
                &pair_key(execution.organization_id, execution.playbook_id),
            )?
            .ok_or(RetentionError::PlaybookNotFound(execution.playbook_id))?;
            if playbook.is_archived() {
                return Err(RetentionError::PlaybookArchived(playbook.id));
            }

            let mut execs = wt.open_table(EXECUTIONS).map_err(db_err)?;
            execs
                .insert(
                    pair_key(execution.organization_id, execution.id).as_slice(),
                    encode(execution)?.as_slice(),
                )
                .map_err(db_err)?;
            let mut jobs = wt.open_table(JOBS).map_err(db_err)?;
            jobs.insert(job_key(job).as_slice(), encode(job)?.as_slice())
                .map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(())
    }

    pub fn execution(
        &self,
        organization_id: Uuid,
        execution_id: Uuid,
    ) -> Result<PlaybookExecution> {
        self.read_one(EXECUTIONS, &pair_key(organization_id, execution_id))?
            .ok_or(RetentionError::ExecutionNotFound(execution_id))
    }

    /// Executions of an organization, oldest trigger first.
    pub fn list_executions(
        &self,
        organization_id: Uuid,
        status: Option<ExecutionStatus>,
    ) -> Result<Vec<PlaybookExecution>> {
        let (lo, hi) = pair_bounds(organization_id);
        let mut execs: Vec<PlaybookExecution> = self.read_range(EXECUTIONS, &lo, &hi)?;
        if let Some(status) = status {
            execs.retain(|e| e.status == status);
        }
        execs.sort_by(|a, b| a.triggered_at.cmp(&b.triggered_at));
        Ok(execs)
    }

    /// Outbox contents of an organization, oldest first.
    pub fn messages(&self, organization_id: Uuid) -> Result<Vec<Message>> {
        let (lo, hi) = pair_bounds(organization_id);
        let mut messages: Vec<Message> = self.read_range(MESSAGES, &lo, &hi)?;
        messages.sort_by(|a, b| a.queued_at.cmp(&b.queued_at));
        Ok(messages)
    }

    /// Compare-and-set `pending -> sent`.
    ///
    /// Inside one write transaction: load the execution, return `None` unless
    /// it is still pending, hand the bound definition and recipient name to
    /// `build`, then insert the message and mark the execution sent. A second
    /// caller for the same execution observes `sent` and gets `None`.
    pub fn complete_pending<F>(
        &self,
        organization_id: Uuid,
        execution_id: Uuid,
        build: F,
    ) -> Result<Option<Delivery>>
    where
        F: FnOnce(&DeliveryContext) -> Result<Delivery>,
    {
        let key = pair_key(organization_id, execution_id);
        let wt = self.db.begin_write().map_err(db_err)?;
        let delivery = {
            let mut execs = wt.open_table(EXECUTIONS).map_err(db_err)?;
            let execution: PlaybookExecution = match get_json(&execs, &key)? {
                Some(e) => e,
                None => return Ok(None),
            };
            if !execution.is_pending() {
                return Ok(None);
            }

            let versions = wt.open_table(PLAYBOOK_VERSIONS).map_err(db_err)?;
            let vkey = version_key(execution.playbook_id, execution.playbook_version);
            let version: PlaybookVersion = get_json(&versions, &vkey)?
                .ok_or(RetentionError::PlaybookNotFound(execution.playbook_id))?;

            let first_name = match execution.recipient {
                Recipient::Member(id) => {
                    let t = wt.open_table(MEMBERS).map_err(db_err)?;
                    let m: Option<Member> = get_json(&t, &pair_key(organization_id, id))?;
                    m.map(|m| m.first_name)
                }
                Recipient::Lead(id) => {
                    let t = wt.open_table(LEADS).map_err(db_err)?;
                    let l: Option<Lead> = get_json(&t, &pair_key(organization_id, id))?;
                    l.map(|l| l.first_name)
                }
            }
            .filter(|n| !n.trim().is_empty());

            let ctx = DeliveryContext {
                execution,
                definition: version.definition,
                first_name,
            };
            let delivery = build(&ctx)?;

            let mut execution = ctx.execution;
            execution.status = ExecutionStatus::Sent;
            execution.processed_at = Some(delivery.processed_at);
            execution.outcome = Some(ExecutionOutcome {
                sla_met: delivery.sla_met,
                error: None,
            });
            execution.message_id = Some(delivery.message.id);

            let mut messages = wt.open_table(MESSAGES).map_err(db_err)?;
            messages
                .insert(
                    pair_key(organization_id, delivery.message.id).as_slice(),
                    encode(&delivery.message)?.as_slice(),
                )
                .map_err(db_err)?;
            execs
                .insert(key.as_slice(), encode(&execution)?.as_slice())
                .map_err(db_err)?;
            delivery
        };
        wt.commit().map_err(db_err)?;
        Ok(Some(delivery))
    }

    /// Compare-and-set `pending -> failed`. Returns `false` when the execution
    /// is missing or already left `pending`.
    pub fn fail_pending(
        &self,
        organization_id: Uuid,
        execution_id: Uuid,
        error: &str,
        sla_seconds: u64,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let key = pair_key(organization_id, execution_id);
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut execs = wt.open_table(EXECUTIONS).map_err(db_err)?;
            let found: Option<PlaybookExecution> = get_json(&execs, &key)?;
            let mut execution = match found {
                Some(e) if e.is_pending() => e,
                _ => return Ok(false),
            };
            execution.status = ExecutionStatus::Failed;
            execution.processed_at = Some(now);
            execution.outcome = Some(ExecutionOutcome {
                sla_met: sla_met(execution.triggered_at, now, sla_seconds),
                error: Some(error.to_string()),
            });
            execs
                .insert(key.as_slice(), encode(&execution)?.as_slice())
                .map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Queue
    // -----------------------------------------------------------------------

    /// Jobs whose `available_at` is at or before `now`, earliest first.
    pub fn due_jobs(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Job>> {
        let lo = [0u8; 24];
        let mut hi = [0xffu8; 24];
        hi[..8].copy_from_slice(&ts_ms(now).to_be_bytes());
        let rt = self.db.begin_read().map_err(db_err)?;
        let t = rt.open_table(JOBS).map_err(db_err)?;
        let mut jobs: Vec<Job> = Vec::new();
        for entry in t.range(lo.as_slice()..=hi.as_slice()).map_err(db_err)?.take(limit) {
            let (_, v) = entry.map_err(db_err)?;
            jobs.push(decode(v.value())?);
        }
        Ok(jobs)
    }

    /// Number of jobs in the queue, due or not.
    pub fn queue_depth(&self) -> Result<u64> {
        use redb::ReadableTableMetadata;
        let rt = self.db.begin_read().map_err(db_err)?;
        let t = rt.open_table(JOBS).map_err(db_err)?;
        t.len().map_err(db_err)
    }

    /// Acknowledge a job. Returns `false` if it was already gone.
    pub fn remove_job(&self, job: &Job) -> Result<bool> {
        let wt = self.db.begin_write().map_err(db_err)?;
        let removed = {
            let mut t = wt.open_table(JOBS).map_err(db_err)?;
            let removed = t.remove(job_key(job).as_slice()).map_err(db_err)?;
            removed.is_some()
        };
        wt.commit().map_err(db_err)?;
        Ok(removed)
    }

    /// Replace `job` with its next attempt.
    pub fn reschedule_job(&self, job: &Job, available_at: DateTime<Utc>) -> Result<Job> {
        let next = Job {
            attempt: job.attempt + 1,
            available_at,
            ..job.clone()
        };
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut t = wt.open_table(JOBS).map_err(db_err)?;
            t.remove(job_key(job).as_slice()).map_err(db_err)?;
            t.insert(job_key(&next).as_slice(), encode(&next)?.as_slice())
                .map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::open_tmp;
    use super::*;
    use crate::execution::MessageStatus;
    use crate::playbook::PlaybookDefinition;
    use crate::types::{Channel, TriggerType};
    use chrono::Duration;
    use serde_json::Map;

    fn seeded(db: &RetentionDb) -> (Uuid, PlaybookExecution, Job) {
        let org = Uuid::new_v4();
        let member = Member::new(org, "Ana", "Lima");
        db.upsert_member(&member).unwrap();
        let (_, version) = db
            .create_playbook(
                org,
                PlaybookDefinition::new("Rescue", TriggerType::Manual),
                None,
                Utc::now(),
            )
            .unwrap();
        let now = Utc::now();
        let exec = PlaybookExecution::pending(
            &version,
            Recipient::Member(member.id),
            Map::new(),
            now,
        );
        let job = Job::new(&exec, 300, now);
        db.insert_execution_with_job(&exec, &job).unwrap();
        (org, exec, job)
    }

    fn deliver(ctx: &DeliveryContext) -> Result<Delivery> {
        let now = Utc::now();
        Ok(Delivery {
            message: Message {
                id: Uuid::new_v4(),
                organization_id: ctx.execution.organization_id,
                recipient: ctx.execution.recipient,
                template_id: None,
                playbook_id: ctx.execution.playbook_id,
                channel: Channel::Sms,
                body: format!("Hi {}", ctx.first_name.as_deref().unwrap_or("there")),
                status: MessageStatus::Queued,
                queued_at: now,
            },
            processed_at: now,
            sla_met: true,
        })
    }

    #[test]
    fn insert_enqueues_job() {
        let (_dir, db) = open_tmp();
        let (org, exec, job) = seeded(&db);
        assert_eq!(db.execution(org, exec.id).unwrap().status, ExecutionStatus::Pending);
        assert_eq!(db.due_jobs(Utc::now(), 10).unwrap(), vec![job]);
        assert_eq!(db.queue_depth().unwrap(), 1);
    }

    #[test]
    fn insert_rejects_playbook_archived_after_binding() {
        let (_dir, db) = open_tmp();
        let org = Uuid::new_v4();
        let member = Member::new(org, "Ana", "Lima");
        db.upsert_member(&member).unwrap();
        let (pb, version) = db
            .create_playbook(
                org,
                PlaybookDefinition::new("Rescue", TriggerType::Manual),
                None,
                Utc::now(),
            )
            .unwrap();
        let exec = PlaybookExecution::pending(
            &version,
            Recipient::Member(member.id),
            Map::new(),
            Utc::now(),
        );
        let job = Job::new(&exec, 300, Utc::now());

        db.archive_playbook(org, pb.id, Utc::now()).unwrap();
        let err = db.insert_execution_with_job(&exec, &job).unwrap_err();
        assert!(matches!(err, RetentionError::PlaybookArchived(id) if id == pb.id));
        assert!(db.list_executions(org, None).unwrap().is_empty());
        assert_eq!(db.queue_depth().unwrap(), 0);
    }

    #[test]
    fn execution_is_scoped_to_org() {
        let (_dir, db) = open_tmp();
        let (_org, exec, _) = seeded(&db);
        assert!(matches!(
            db.execution(Uuid::new_v4(), exec.id),
            Err(RetentionError::ExecutionNotFound(_))
        ));
    }

    #[test]
    fn complete_pending_is_single_shot() {
        let (_dir, db) = open_tmp();
        let (org, exec, _) = seeded(&db);
        let first = db.complete_pending(org, exec.id, deliver).unwrap().unwrap();
        assert_eq!(first.message.body, "Hi Ana");
        assert!(db.complete_pending(org, exec.id, deliver).unwrap().is_none());

        let stored = db.execution(org, exec.id).unwrap();
        assert_eq!(stored.status, ExecutionStatus::Sent);
        assert_eq!(stored.message_id, Some(first.message.id));
        assert_eq!(db.messages(org).unwrap().len(), 1);
    }

    #[test]
    fn failed_build_leaves_execution_pending() {
        let (_dir, db) = open_tmp();
        let (org, exec, _) = seeded(&db);
        let err = db
            .complete_pending(org, exec.id, |_| Err(RetentionError::Store("boom".into())))
            .unwrap_err();
        assert!(matches!(err, RetentionError::Store(_)));
        assert!(db.execution(org, exec.id).unwrap().is_pending());
        assert!(db.messages(org).unwrap().is_empty());
    }

    #[test]
    fn concurrent_completion_sends_once() {
        let (_dir, db) = open_tmp();
        let (org, exec, _) = seeded(&db);
        let sent: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| db.complete_pending(org, exec.id, deliver).unwrap().is_some()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap() as usize).sum()
        });
        assert_eq!(sent, 1);
        assert_eq!(db.messages(org).unwrap().len(), 1);
    }

    #[test]
    fn fail_pending_only_from_pending() {
        let (_dir, db) = open_tmp();
        let (org, exec, _) = seeded(&db);
        assert!(db.fail_pending(org, exec.id, "transport down", 300, Utc::now()).unwrap());
        assert!(!db.fail_pending(org, exec.id, "again", 300, Utc::now()).unwrap());
        let stored = db.execution(org, exec.id).unwrap();
        assert_eq!(stored.status, ExecutionStatus::Failed);
        assert_eq!(stored.outcome.unwrap().error.as_deref(), Some("transport down"));
        assert_eq!(db.list_executions(org, Some(ExecutionStatus::Failed)).unwrap().len(), 1);
        assert!(db.list_executions(org, Some(ExecutionStatus::Pending)).unwrap().is_empty());
    }

    #[test]
    fn reschedule_moves_job_out_of_window() {
        let (_dir, db) = open_tmp();
        let (_org, _exec, job) = seeded(&db);
        let now = Utc::now();
        let next = db.reschedule_job(&job, now + Duration::seconds(30)).unwrap();
        assert_eq!(next.attempt, 1);
        assert!(db.due_jobs(now, 10).unwrap().is_empty());
        assert_eq!(db.due_jobs(now + Duration::seconds(31), 10).unwrap(), vec![next.clone()]);
        assert!(db.remove_job(&next).unwrap());
        assert!(!db.remove_job(&next).unwrap());
        assert_eq!(db.queue_depth().unwrap(), 0);
    }

    #[test]
    fn due_jobs_respects_limit() {
        let (_dir, db) = open_tmp();
        for _ in 0..3 {
            seeded(&db);
        }
        let now = Utc::now();
        let all = db.due_jobs(now, 10).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(db.due_jobs(now, 2).unwrap(), all[..2].to_vec());
        assert!(db.due_jobs(now, 0).unwrap().is_empty());
    }
}

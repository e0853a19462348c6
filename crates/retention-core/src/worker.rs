//! Consumer of the playbooks queue.
//!
//! A tick takes up to `batch_size` due jobs and processes each one. A job is
//! acknowledged (removed) only after processing returns, which gives
//! at-least-once delivery; the processor's pending guard absorbs duplicates.
//!
//! Failed attempts are rescheduled with exponential backoff. Once a job has
//! used `max_attempts` attempts its execution moves `pending -> failed`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::config::{Config, RetryConfig};
use crate::error::Result;
use crate::execution::Job;
use crate::processor::{self, ProcessOutcome};
use crate::store::RetentionDb;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub processed: usize,
    pub sent: usize,
    pub skipped: usize,
    pub retried: usize,
    pub failed: usize,
}

impl TickReport {
    fn absorb(&mut self, other: &TickReport) {
        self.processed += other.processed;
        self.sent += other.sent;
        self.skipped += other.skipped;
        self.retried += other.retried;
        self.failed += other.failed;
    }
}

pub struct Worker {
    db: Arc<RetentionDb>,
    retry: RetryConfig,
    batch_size: usize,
}

impl Worker {
    pub fn new(db: Arc<RetentionDb>, config: &Config) -> Self {
        Self {
            db,
            retry: config.retry.clone(),
            batch_size: config.worker.batch_size,
        }
    }

    /// Process every job due at `now`, up to the batch size.
    pub fn tick(&self, now: DateTime<Utc>) -> Result<TickReport> {
        let mut report = TickReport::default();
        for job in self.db.due_jobs(now, self.batch_size)? {
            report.processed += 1;
            match processor::process(&self.db, &job, now) {
                Ok(ProcessOutcome::Sent { .. }) => {
                    report.sent += 1;
                    self.db.remove_job(&job)?;
                }
                Ok(ProcessOutcome::Skipped) => {
                    report.skipped += 1;
                    self.db.remove_job(&job)?;
                }
                Err(e) => {
                    if self.handle_failure(&job, &e.to_string(), now)? {
                        report.failed += 1;
                    } else {
                        report.retried += 1;
                    }
                }
            }
        }
        if report.processed > 0 {
            debug!(?report, "worker tick");
        }
        Ok(report)
    }

    /// Tick repeatedly until nothing is due at `now`.
    pub fn drain(&self, now: DateTime<Utc>) -> Result<TickReport> {
        let mut total = TickReport::default();
        if self.batch_size == 0 {
            return Ok(total);
        }
        loop {
            let report = self.tick(now)?;
            if report.processed == 0 {
                return Ok(total);
            }
            total.absorb(&report);
        }
    }

    /// Reschedule or give up. Returns `true` when the job was dropped.
    fn handle_failure(&self, job: &Job, err: &str, now: DateTime<Utc>) -> Result<bool> {
        let attempt = job.attempt + 1;
        if attempt >= self.retry.max_attempts {
            let marked = self.db.fail_pending(
                job.organization_id,
                job.execution_id,
                err,
                job.sla_seconds,
                now,
            )?;
            self.db.remove_job(job)?;
            error!(
                execution = %job.execution_id,
                attempts = attempt,
                marked,
                error = err,
                "execution failed, giving up"
            );
            return Ok(true);
        }

        let delay = self.retry.backoff(attempt);
        let retry_at = now.checked_add_signed(delay).unwrap_or(DateTime::<Utc>::MAX_UTC);
        let next = self.db.reschedule_job(job, retry_at)?;
        warn!(
            execution = %job.execution_id,
            attempt,
            retry_at = %next.available_at,
            error = err,
            "execution processing failed, will retry"
        );
        Ok(false)
    }
}

//! Execution processor: turns one queued job into a queued outbox message.
//!
//! The pending check, the message insert, and the execution update run in a
//! single write transaction (`RetentionDb::complete_pending`). Redelivering a
//! job whose execution already left `pending` is a no-op.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::execution::{sla_met, Job, Message, MessageStatus};
use crate::store::{Delivery, DeliveryContext, RetentionDb};

/// Display name used when neither member nor lead has a first name.
pub const FALLBACK_NAME: &str = "there";

/// Body used when the trigger context carries no `message`.
pub const FALLBACK_TEMPLATE: &str =
    "Hi {{first_name}}, we miss you at the studio! Reply to book your next class.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ProcessOutcome {
    /// Missing or no longer pending.
    Skipped,
    Sent {
        execution_id: Uuid,
        message_id: Uuid,
        sla_met: bool,
    },
}

// ---------------------------------------------------------------------------
// Template rendering
// ---------------------------------------------------------------------------

static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();

fn placeholder_re() -> &'static Regex {
    PLACEHOLDER_RE.get_or_init(|| Regex::new(r"\{\{\s*([a-z_][a-z0-9_]*)\s*\}\}").unwrap())
}

/// Substitute `{{name}}` placeholders. `first_name` comes from the recipient;
/// any other name is looked up as a string in the trigger context. Unknown
/// placeholders are left as written.
pub fn render(template: &str, ctx: &DeliveryContext) -> String {
    let first_name = ctx.first_name.as_deref().unwrap_or(FALLBACK_NAME);
    placeholder_re()
        .replace_all(template, |caps: &Captures| {
            let name = &caps[1];
            if name == "first_name" {
                return first_name.to_string();
            }
            match ctx.execution.context.get(name).and_then(Value::as_str) {
                Some(v) => v.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn build_delivery(ctx: &DeliveryContext, sla_seconds: u64, now: DateTime<Utc>) -> Delivery {
    let exec = &ctx.execution;
    let body = render(exec.message_override().unwrap_or(FALLBACK_TEMPLATE), ctx);
    let message = Message {
        id: Uuid::new_v4(),
        organization_id: exec.organization_id,
        recipient: exec.recipient,
        template_id: ctx.definition.primary_template_id,
        playbook_id: exec.playbook_id,
        channel: ctx.definition.channel_strategy.resolved(),
        body,
        status: MessageStatus::Queued,
        queued_at: now,
    };
    Delivery {
        message,
        processed_at: now,
        sla_met: sla_met(exec.triggered_at, now, sla_seconds),
    }
}

// ---------------------------------------------------------------------------
// Process
// ---------------------------------------------------------------------------

/// Process one job. Errors leave the execution pending for the worker's
/// retry policy.
pub fn process(db: &RetentionDb, job: &Job, now: DateTime<Utc>) -> Result<ProcessOutcome> {
    let delivery = db.complete_pending(job.organization_id, job.execution_id, |ctx| {
        Ok(build_delivery(ctx, job.sla_seconds, now))
    })?;

    match delivery {
        None => {
            debug!(execution = %job.execution_id, "execution not pending, skipping");
            Ok(ProcessOutcome::Skipped)
        }
        Some(d) => {
            info!(
                execution = %job.execution_id,
                message = %d.message.id,
                channel = %d.message.channel,
                sla_met = d.sla_met,
                "execution sent"
            );
            Ok(ProcessOutcome::Sent {
                execution_id: job.execution_id,
                message_id: d.message.id,
                sla_met: d.sla_met,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{trigger_for_lead, trigger_for_member};
    use crate::playbook::{ChannelStrategy, PlaybookDefinition, PlaybookPatch};
    use crate::signals::{Lead, Member};
    use crate::store::tests::open_tmp;
    use crate::types::{Channel, ExecutionStatus, TriggerType};
    use chrono::Duration;
    use serde_json::{json, Map};

    struct Fixture {
        org: Uuid,
        member: Member,
        playbook: Uuid,
    }

    fn fixture(db: &RetentionDb) -> Fixture {
        let org = Uuid::new_v4();
        let member = Member::new(org, "Ana", "Lima");
        db.upsert_member(&member).unwrap();
        let (pb, _) = db
            .create_playbook(
                org,
                PlaybookDefinition::new("Rescue", TriggerType::Manual),
                None,
                Utc::now(),
            )
            .unwrap();
        Fixture {
            org,
            member,
            playbook: pb.id,
        }
    }

    fn only_job(db: &RetentionDb) -> Job {
        let mut jobs = db.due_jobs(Utc::now() + Duration::days(1), 10).unwrap();
        assert_eq!(jobs.len(), 1);
        jobs.remove(0)
    }

    #[test]
    fn sends_fallback_body_on_sms() {
        let (_dir, db) = open_tmp();
        let f = fixture(&db);
        let exec = trigger_for_member(
            &db,
            f.org,
            f.member.id,
            f.playbook,
            Map::new(),
            Utc::now(),
        )
        .unwrap();
        let job = only_job(&db);

        let outcome = process(&db, &job, Utc::now()).unwrap();
        let ProcessOutcome::Sent { message_id, sla_met, .. } = outcome else {
            panic!("expected sent, got {outcome:?}");
        };
        assert!(sla_met);

        let stored = db.execution(f.org, exec.id).unwrap();
        assert_eq!(stored.status, ExecutionStatus::Sent);
        assert_eq!(stored.message_id, Some(message_id));
        let messages = db.messages(f.org).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].channel, Channel::Sms);
        assert!(messages[0].body.starts_with("Hi Ana,"));
    }

    #[test]
    fn redelivery_is_a_noop() {
        let (_dir, db) = open_tmp();
        let f = fixture(&db);
        trigger_for_member(&db, f.org, f.member.id, f.playbook, Map::new(), Utc::now()).unwrap();
        let job = only_job(&db);
        assert!(matches!(process(&db, &job, Utc::now()).unwrap(), ProcessOutcome::Sent { .. }));
        assert_eq!(process(&db, &job, Utc::now()).unwrap(), ProcessOutcome::Skipped);
        assert_eq!(db.messages(f.org).unwrap().len(), 1);
    }

    #[test]
    fn concurrent_redelivery_yields_one_message() {
        let (_dir, db) = open_tmp();
        let f = fixture(&db);
        trigger_for_member(&db, f.org, f.member.id, f.playbook, Map::new(), Utc::now()).unwrap();
        let job = only_job(&db);
        let sent = std::thread::scope(|s| {
            let handles: Vec<_> = (0..6)
                .map(|_| s.spawn(|| process(&db, &job, Utc::now()).unwrap()))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|o| matches!(o, ProcessOutcome::Sent { .. }))
                .count()
        });
        assert_eq!(sent, 1);
        assert_eq!(db.messages(f.org).unwrap().len(), 1);
    }

    #[test]
    fn missing_execution_is_skipped() {
        let (_dir, db) = open_tmp();
        let f = fixture(&db);
        let exec = trigger_for_member(
            &db,
            f.org,
            f.member.id,
            f.playbook,
            Map::new(),
            Utc::now(),
        )
        .unwrap();
        let mut job = only_job(&db);
        job.organization_id = Uuid::new_v4();
        assert_eq!(process(&db, &job, Utc::now()).unwrap(), ProcessOutcome::Skipped);
        assert!(db.execution(f.org, exec.id).unwrap().is_pending());
    }

    #[test]
    fn context_override_and_bound_version_channel() {
        let (_dir, db) = open_tmp();
        let f = fixture(&db);
        db.update_playbook(
            f.org,
            f.playbook,
            PlaybookPatch {
                channel_strategy: Some(ChannelStrategy::primary(Channel::Email)),
                ..Default::default()
            },
            None,
            Utc::now(),
        )
        .unwrap();
        let mut ctx = Map::new();
        ctx.insert("message".into(), json!("{{first_name}}, your {{offer}} is waiting"));
        ctx.insert("offer".into(), json!("free class"));
        trigger_for_member(&db, f.org, f.member.id, f.playbook, ctx, Utc::now()).unwrap();

        // A later edit does not affect the already-bound version.
        db.update_playbook(
            f.org,
            f.playbook,
            PlaybookPatch {
                channel_strategy: Some(ChannelStrategy::primary(Channel::Push)),
                ..Default::default()
            },
            None,
            Utc::now(),
        )
        .unwrap();

        process(&db, &only_job(&db), Utc::now()).unwrap();
        let msg = &db.messages(f.org).unwrap()[0];
        assert_eq!(msg.body, "Ana, your free class is waiting");
        assert_eq!(msg.channel, Channel::Email);
    }

    #[test]
    fn lead_and_unnamed_recipients() {
        let (_dir, db) = open_tmp();
        let f = fixture(&db);
        let lead = Lead::new(f.org, "Lee");
        db.upsert_lead(&lead).unwrap();
        let nameless = Member::new(f.org, "", "");
        db.upsert_member(&nameless).unwrap();

        trigger_for_lead(&db, f.org, lead.id, f.playbook, Map::new(), Utc::now()).unwrap();
        trigger_for_member(&db, f.org, nameless.id, f.playbook, Map::new(), Utc::now()).unwrap();
        for job in db.due_jobs(Utc::now() + Duration::days(1), 10).unwrap() {
            process(&db, &job, Utc::now()).unwrap();
        }
        let bodies: Vec<String> = db.messages(f.org).unwrap().into_iter().map(|m| m.body).collect();
        assert!(bodies.iter().any(|b| b.starts_with("Hi Lee,")));
        assert!(bodies.iter().any(|b| b.starts_with("Hi there,")));
    }

    #[test]
    fn late_processing_misses_sla() {
        let (_dir, db) = open_tmp();
        let f = fixture(&db);
        let t0 = Utc::now();
        let exec = trigger_for_member(&db, f.org, f.member.id, f.playbook, Map::new(), t0).unwrap();
        let job = only_job(&db);
        process(&db, &job, t0 + Duration::seconds(301)).unwrap();
        assert!(!db.execution(f.org, exec.id).unwrap().outcome.unwrap().sla_met);
    }

    #[test]
    fn unknown_placeholders_survive() {
        let (_dir, db) = open_tmp();
        let f = fixture(&db);
        let mut ctx = Map::new();
        ctx.insert("message".into(), json!("Hi {{ first_name }} {{coach}}"));
        trigger_for_member(&db, f.org, f.member.id, f.playbook, ctx, Utc::now()).unwrap();
        process(&db, &only_job(&db), Utc::now()).unwrap();
        assert_eq!(db.messages(f.org).unwrap()[0].body, "Hi Ana {{coach}}");
    }
}

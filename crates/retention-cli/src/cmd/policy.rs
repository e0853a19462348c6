use crate::cmd::{open_db, parse_enum, require_org};
use crate::output::{enum_name, print_json};
use anyhow::Context;
use chrono::NaiveTime;
use clap::Subcommand;
use retention_core::policy::{CommunicationPolicy, QuietHours, TimezoneStrategy};
use std::path::Path;
use uuid::Uuid;

#[derive(Subcommand)]
pub enum PolicySubcommand {
    /// Show the organization's communication policy
    Show,

    /// Change fields of the communication policy
    Set {
        #[arg(long)]
        daily_cap: Option<u32>,
        #[arg(long)]
        weekly_cap: Option<u32>,
        /// Quiet hours start, HH:MM
        #[arg(long, requires = "quiet_end")]
        quiet_start: Option<String>,
        /// Quiet hours end, HH:MM
        #[arg(long, requires = "quiet_start")]
        quiet_end: Option<String>,
        /// Remove quiet hours
        #[arg(long, conflicts_with_all = ["quiet_start", "quiet_end"])]
        no_quiet_hours: bool,
        /// member_local, studio_local, or utc
        #[arg(long)]
        timezone_strategy: Option<String>,
        #[arg(long)]
        stop_keywords: Option<bool>,
    },
}

pub fn run(
    root: &Path,
    org: Option<Uuid>,
    subcmd: PolicySubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let org = require_org(org)?;
    let db = open_db(root)?;

    match subcmd {
        PolicySubcommand::Show => show(&db.policy(org)?, json),
        PolicySubcommand::Set {
            daily_cap,
            weekly_cap,
            quiet_start,
            quiet_end,
            no_quiet_hours,
            timezone_strategy,
            stop_keywords,
        } => {
            let mut policy = db.policy(org)?;
            if let Some(v) = daily_cap {
                policy.daily_cap = v;
            }
            if let Some(v) = weekly_cap {
                policy.weekly_cap = v;
            }
            if let (Some(start), Some(end)) = (quiet_start, quiet_end) {
                policy.quiet_hours = Some(QuietHours {
                    start: parse_time(&start)?,
                    end: parse_time(&end)?,
                });
            }
            if no_quiet_hours {
                policy.quiet_hours = None;
            }
            if let Some(raw) = timezone_strategy {
                policy.timezone_strategy =
                    parse_enum::<TimezoneStrategy>("timezone strategy", &raw)?;
            }
            if let Some(v) = stop_keywords {
                policy.enforce_stop_keywords = v;
            }
            db.set_policy(org, &policy)?;
            show(&policy, json)
        }
    }
}

fn parse_time(raw: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .with_context(|| format!("invalid time '{raw}', expected HH:MM"))
}

fn show(policy: &CommunicationPolicy, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(policy);
    }
    match &policy.quiet_hours {
        Some(q) => {
            let now = chrono::Utc::now().time();
            println!(
                "quiet hours:        {}-{} (UTC now {}: {})",
                q.start.format("%H:%M"),
                q.end.format("%H:%M"),
                now.format("%H:%M"),
                if q.contains(now) { "quiet" } else { "open" }
            );
        }
        None => println!("quiet hours:        none"),
    }
    println!("daily cap:          {}", policy.daily_cap);
    println!("weekly cap:         {}", policy.weekly_cap);
    println!("timezone strategy:  {}", enum_name(&policy.timezone_strategy));
    println!("stop keywords:      {}", policy.enforce_stop_keywords);
    Ok(())
}

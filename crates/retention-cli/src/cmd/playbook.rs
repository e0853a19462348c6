use crate::cmd::{open_db, require_org};
use crate::output::{print_json, print_table, short_id};
use chrono::Utc;
use clap::Subcommand;
use retention_core::playbook::{ChannelStrategy, Playbook, PlaybookDefinition, PlaybookPatch};
use retention_core::types::{Channel, TriggerType};
use std::path::Path;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum PlaybookSubcommand {
    /// Create a draft playbook (version 1)
    Create {
        #[arg(long)]
        name: String,
        /// manual, risk_band, freeze_request, or win_back
        #[arg(long)]
        trigger_type: TriggerType,
        #[arg(long)]
        description: Option<String>,
        /// sms, email, or push
        #[arg(long)]
        channel: Option<Channel>,
        #[arg(long)]
        template_id: Option<Uuid>,
        /// Note stored with the version
        #[arg(long)]
        summary: Option<String>,
    },

    /// Change a playbook; every update appends a version
    Update {
        id: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        trigger_type: Option<TriggerType>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        channel: Option<Channel>,
        #[arg(long)]
        template_id: Option<Uuid>,
        #[arg(long)]
        summary: Option<String>,
    },

    /// List non-archived playbooks
    List,

    /// Show one playbook
    Show { id: Uuid },

    /// Show the version history of a playbook
    Versions { id: Uuid },

    /// Move a draft or paused playbook to active
    Activate { id: Uuid },

    /// Pause an active playbook
    Pause { id: Uuid },

    /// Archive a playbook (terminal)
    Archive { id: Uuid },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(
    root: &Path,
    org: Option<Uuid>,
    subcmd: PlaybookSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let org = require_org(org)?;
    let db = open_db(root)?;
    let now = Utc::now();

    match subcmd {
        PlaybookSubcommand::Create {
            name,
            trigger_type,
            description,
            channel,
            template_id,
            summary,
        } => {
            let mut definition = PlaybookDefinition::new(name, trigger_type);
            definition.description = description;
            definition.channel_strategy = channel.map(ChannelStrategy::primary).unwrap_or_default();
            definition.primary_template_id = template_id;
            let (playbook, version) = db.create_playbook(org, definition, summary, now)?;
            if json {
                return print_json(&serde_json::json!({
                    "playbook": playbook,
                    "version": version.version,
                }));
            }
            println!(
                "Created playbook {} '{}' (v{}, {})",
                playbook.id, playbook.definition.name, version.version, playbook.status
            );
        }

        PlaybookSubcommand::Update {
            id,
            name,
            trigger_type,
            description,
            channel,
            template_id,
            summary,
        } => {
            let patch = PlaybookPatch {
                name,
                trigger_type,
                description,
                channel_strategy: channel.map(ChannelStrategy::primary),
                primary_template_id: template_id,
                ..Default::default()
            };
            let (playbook, version) = db.update_playbook(org, id, patch, summary, now)?;
            if json {
                return print_json(&serde_json::json!({
                    "playbook": playbook,
                    "version": version.version,
                }));
            }
            println!("Updated playbook {} to v{}", playbook.id, version.version);
        }

        PlaybookSubcommand::List => {
            let playbooks = db.list_playbooks(org)?;
            if json {
                return print_json(&playbooks);
            }
            if playbooks.is_empty() {
                println!("No playbooks.");
                return Ok(());
            }
            let rows = playbooks
                .iter()
                .map(|p| {
                    vec![
                        short_id(&p.id),
                        p.definition.name.clone(),
                        p.definition.trigger_type.to_string(),
                        p.status.to_string(),
                        p.definition.channel_strategy.resolved().to_string(),
                    ]
                })
                .collect();
            print_table(&["ID", "NAME", "TRIGGER", "STATUS", "CHANNEL"], rows);
        }

        PlaybookSubcommand::Show { id } => {
            let playbook = db.playbook(org, id)?;
            let latest = db.latest_version(id)?.map(|v| v.version);
            if json {
                let mut value = serde_json::to_value(&playbook)?;
                value["version"] = latest.into();
                return print_json(&value);
            }
            print_playbook(&playbook, latest);
        }

        PlaybookSubcommand::Versions { id } => {
            db.playbook(org, id)?;
            let versions = db.playbook_versions(id)?;
            if json {
                return print_json(&versions);
            }
            for v in &versions {
                println!(
                    "  v{:<3} {}  {}",
                    v.version,
                    v.created_at.to_rfc3339(),
                    v.change_summary.as_deref().unwrap_or("-")
                );
            }
        }

        PlaybookSubcommand::Activate { id } => {
            report(db.activate_playbook(org, id, now)?, json)?;
        }
        PlaybookSubcommand::Pause { id } => {
            report(db.pause_playbook(org, id, now)?, json)?;
        }
        PlaybookSubcommand::Archive { id } => {
            report(db.archive_playbook(org, id, now)?, json)?;
        }
    }
    Ok(())
}

fn report(playbook: Playbook, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&playbook);
    }
    println!("Playbook {} is {}", playbook.id, playbook.status);
    Ok(())
}

fn print_playbook(playbook: &Playbook, version: Option<u32>) {
    let def = &playbook.definition;
    println!("{} ({})", def.name, playbook.id);
    println!("  status:   {}", playbook.status);
    println!("  trigger:  {}", def.trigger_type);
    println!("  channel:  {}", def.channel_strategy.resolved());
    if let Some(v) = version {
        println!("  version:  {v}");
    }
    if let Some(desc) = &def.description {
        println!("  {desc}");
    }
}

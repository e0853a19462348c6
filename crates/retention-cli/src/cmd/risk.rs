use crate::cmd::{open_db, require_org};
use crate::output::{print_json, print_table, short_id};
use anyhow::Context;
use clap::Subcommand;
use retention_core::{campaigns, risk};
use std::path::Path;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum RiskSubcommand {
    /// Rescore every member of the organization
    Recalc,

    /// Show a member's live score, band, and reasons
    Show { member: Uuid },

    /// Show every recorded score for a member
    History { member: Uuid },

    /// Scored members, riskiest first, with a band heatmap
    Roster {
        /// Only members who booked this class type
        #[arg(long)]
        class_type: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(
    root: &Path,
    org: Option<Uuid>,
    subcmd: RiskSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let org = require_org(org)?;
    let db = open_db(root)?;

    match subcmd {
        RiskSubcommand::Recalc => {
            let scored = risk::calculate_for_organization(&db, org, chrono::Utc::now())
                .context("risk recalculation failed")?;
            if json {
                return print_json(&serde_json::json!({ "scored": scored }));
            }
            println!("Scored {scored} member(s).");
        }

        RiskSubcommand::Show { member } => {
            db.member(org, member)?;
            let Some(risk) = risk::member_risk(&db, org, member)? else {
                anyhow::bail!("member {member} has not been scored; run `retention risk recalc`");
            };
            if json {
                return print_json(&risk);
            }
            println!(
                "{member}: score {} band {} ({})",
                risk.score.score,
                risk.band,
                risk.ui_band.as_str()
            );
            for reason in &risk.score.reasons {
                println!("  - {}: {}", reason.code.as_str(), reason.detail);
            }
            println!("calculated at {}", risk.score.calculated_at.to_rfc3339());
        }

        RiskSubcommand::History { member } => {
            db.member(org, member)?;
            let history = db.risk_history(member)?;
            if json {
                return print_json(&history);
            }
            if history.is_empty() {
                println!("No score history for {member}.");
                return Ok(());
            }
            for snap in &history {
                let codes: Vec<&str> = snap.reasons.iter().map(|r| r.code.as_str()).collect();
                println!(
                    "  {} | {:>3} | {}",
                    snap.calculated_at.to_rfc3339(),
                    snap.score,
                    codes.join(", ")
                );
            }
        }

        RiskSubcommand::Roster { class_type } => {
            let roster = campaigns::roster(&db, org, class_type.as_deref())?;
            if json {
                return print_json(&roster);
            }
            println!(
                "Heatmap: High {}  Med {}  Low {}",
                roster.heatmap.high, roster.heatmap.med, roster.heatmap.low
            );
            if roster.entries.is_empty() {
                println!("No scored members.");
                return Ok(());
            }
            let rows = roster
                .entries
                .iter()
                .map(|e| {
                    vec![
                        short_id(&e.member_id),
                        format!("{} {}", e.first_name, e.last_name).trim().to_string(),
                        e.score.to_string(),
                        e.band.to_string(),
                        e.reasons.iter().map(|r| r.as_str()).collect::<Vec<_>>().join(","),
                    ]
                })
                .collect();
            print_table(&["ID", "NAME", "SCORE", "BAND", "REASONS"], rows);
        }
    }
    Ok(())
}

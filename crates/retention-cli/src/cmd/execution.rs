use crate::cmd::{open_db, require_org};
use crate::output::{print_json, print_table, short_id};
use clap::Subcommand;
use retention_core::execution::{PlaybookExecution, Recipient};
use retention_core::types::ExecutionStatus;
use std::path::Path;
use uuid::Uuid;

#[derive(Subcommand)]
pub enum ExecutionSubcommand {
    /// List executions, oldest trigger first
    List {
        /// pending, sent, or failed
        #[arg(long)]
        status: Option<ExecutionStatus>,
    },

    /// Show one execution
    Show { id: Uuid },

    /// List outbox messages written by the worker
    Messages,
}

pub fn run(
    root: &Path,
    org: Option<Uuid>,
    subcmd: ExecutionSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let org = require_org(org)?;
    let db = open_db(root)?;

    match subcmd {
        ExecutionSubcommand::List { status } => {
            let executions = db.list_executions(org, status)?;
            if json {
                return print_json(&executions);
            }
            if executions.is_empty() {
                println!("No executions.");
                return Ok(());
            }
            let rows = executions.iter().map(row).collect();
            print_table(&["ID", "PLAYBOOK", "RECIPIENT", "STATUS", "SLA", "TRIGGERED"], rows);
        }

        ExecutionSubcommand::Show { id } => {
            let execution = db.execution(org, id)?;
            if json {
                return print_json(&execution);
            }
            println!("{} ({})", execution.id, execution.status);
            println!(
                "  playbook:  {} v{}",
                execution.playbook_id, execution.playbook_version
            );
            println!("  recipient: {}", recipient(&execution.recipient));
            println!("  triggered: {}", execution.triggered_at.to_rfc3339());
            if let Some(at) = execution.processed_at {
                println!("  processed: {}", at.to_rfc3339());
            }
            if let Some(outcome) = &execution.outcome {
                println!("  sla met:   {}", outcome.sla_met);
                if let Some(err) = &outcome.error {
                    println!("  error:     {err}");
                }
            }
            if let Some(message_id) = execution.message_id {
                println!("  message:   {message_id}");
            }
        }

        ExecutionSubcommand::Messages => {
            let messages = db.messages(org)?;
            if json {
                return print_json(&messages);
            }
            for m in &messages {
                println!(
                    "[{}] {} -> {}: {}",
                    m.channel,
                    short_id(&m.id),
                    recipient(&m.recipient),
                    m.body
                );
            }
        }
    }
    Ok(())
}

fn recipient(r: &Recipient) -> String {
    match r {
        Recipient::Member(id) => format!("member {}", short_id(id)),
        Recipient::Lead(id) => format!("lead {}", short_id(id)),
    }
}

fn row(e: &PlaybookExecution) -> Vec<String> {
    vec![
        short_id(&e.id),
        format!("{} v{}", short_id(&e.playbook_id), e.playbook_version),
        recipient(&e.recipient),
        e.status.to_string(),
        match &e.outcome {
            Some(o) if o.sla_met => "met".to_string(),
            Some(_) => "missed".to_string(),
            None => "-".to_string(),
        },
        e.triggered_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    ]
}

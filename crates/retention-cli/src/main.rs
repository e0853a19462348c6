mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    config::ConfigSubcommand, execution::ExecutionSubcommand, member::MemberSubcommand,
    playbook::PlaybookSubcommand, policy::PolicySubcommand, risk::RiskSubcommand,
    settings::SettingsSubcommand,
};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "retention",
    about = "Studio retention: churn-risk scoring and playbook automation",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .retention/)
    #[arg(long, global = true, env = "RETENTION_ROOT")]
    root: Option<PathBuf>,

    /// Organization the command acts on
    #[arg(long, global = true, env = "RETENTION_ORG")]
    org: Option<Uuid>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .retention/config.yaml and the database
    Init,

    /// Inspect and validate the service configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Record members, leads, and their activity signals
    Member {
        #[command(subcommand)]
        subcommand: MemberSubcommand,
    },

    /// Per-organization retention settings overrides
    Settings {
        #[command(subcommand)]
        subcommand: SettingsSubcommand,
    },

    /// Risk scoring and the at-risk roster
    Risk {
        #[command(subcommand)]
        subcommand: RiskSubcommand,
    },

    /// Manage playbooks and their version history
    Playbook {
        #[command(subcommand)]
        subcommand: PlaybookSubcommand,
    },

    /// Trigger a playbook for one member or lead
    Trigger {
        /// Playbook id
        playbook: Uuid,
        /// Member recipient
        #[arg(long, conflicts_with = "lead", required_unless_present = "lead")]
        member: Option<Uuid>,
        /// Lead recipient
        #[arg(long)]
        lead: Option<Uuid>,
        /// Context entry as KEY=VALUE (repeatable)
        #[arg(long = "context", value_name = "KEY=VALUE")]
        context: Vec<String>,
    },

    /// Inspect playbook executions
    Execution {
        #[command(subcommand)]
        subcommand: ExecutionSubcommand,
    },

    /// Process queued executions
    Worker {
        /// Drain everything currently due and exit
        #[arg(long)]
        once: bool,
    },

    /// Trigger the win-back playbook for recent cancellations
    WinBack {
        /// Look-back window in days
        #[arg(long, default_value_t = retention_core::campaigns::DEFAULT_WIN_BACK_DAYS)]
        days: u32,
    },

    /// Trigger the freeze-request playbook for a member
    FreezeRescue {
        /// Member id
        member: Uuid,
    },

    /// Communication policy
    Policy {
        #[command(subcommand)]
        subcommand: PolicySubcommand,
    },

    /// Serve the HTTP API and run the queue worker
    Serve {
        /// Port to listen on (default: server.port from config)
        #[arg(long)]
        port: Option<u16>,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } | Commands::Worker { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let org = cli.org;
    let json = cli.json;

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root, json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, json),
        Commands::Member { subcommand } => cmd::member::run(&root, org, subcommand, json),
        Commands::Settings { subcommand } => cmd::settings::run(&root, org, subcommand, json),
        Commands::Risk { subcommand } => cmd::risk::run(&root, org, subcommand, json),
        Commands::Playbook { subcommand } => cmd::playbook::run(&root, org, subcommand, json),
        Commands::Trigger {
            playbook,
            member,
            lead,
            context,
        } => cmd::trigger::run(&root, org, playbook, member, lead, &context, json),
        Commands::Execution { subcommand } => cmd::execution::run(&root, org, subcommand, json),
        Commands::Worker { once } => cmd::worker::run(&root, once, json),
        Commands::WinBack { days } => cmd::campaign::win_back(&root, org, days, json),
        Commands::FreezeRescue { member } => cmd::campaign::freeze_rescue(&root, org, member, json),
        Commands::Policy { subcommand } => cmd::policy::run(&root, org, subcommand, json),
        Commands::Serve { port } => cmd::serve::run(&root, port),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{job::JobSubcommand, playbook::PlaybookSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "plays",
    about = "Store, validate and run Ansible playbooks as tracked jobs",
    version,
    propagate_version = true
)]
struct Cli {
    /// plays root (default: nearest directory containing plays.yaml)
    #[arg(long, global = true, env = "PLAYS_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create plays.yaml, the playbook directory and the default inventory
    Init,

    /// Serve the HTTP API
    Serve {
        #[arg(long, short, default_value_t = 5000)]
        port: u16,
    },

    /// Manage playbooks
    Playbook {
        #[command(subcommand)]
        subcommand: PlaybookSubcommand,
    },

    /// Manage jobs
    Job {
        #[command(subcommand)]
        subcommand: JobSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
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

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Serve { port } => cmd::serve::run(&root, port),
        Commands::Playbook { subcommand } => cmd::playbook::run(&root, subcommand, cli.json),
        Commands::Job { subcommand } => cmd::job::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

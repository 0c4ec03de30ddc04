mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    config::ConfigSubcommand, item::ItemSubcommand, reference::ReferenceSubcommand,
    registry::RegistrySubcommand, subject::SubjectSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "action-item",
    about = "Action item workflow: track required follow-up actions per subject",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .action-items/ or .git/)
    #[arg(long, global = true, env = "ACTION_ITEM_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Log at debug level (overrides RUST_LOG's default)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory, default config and database
    Init,

    /// Inspect and sync registered actions
    Registry {
        #[command(subcommand)]
        subcommand: RegistrySubcommand,
    },

    /// Manage registered subjects
    Subject {
        #[command(subcommand)]
        subcommand: SubjectSubcommand,
    },

    /// Manage action items
    Item {
        #[command(subcommand)]
        subcommand: ItemSubcommand,
    },

    /// Save and delete reference objects
    Reference {
        #[command(subcommand)]
        subcommand: ReferenceSubcommand,
    },

    /// Check links between items and reference objects
    Audit {
        /// Fix the findings that have an unambiguous fix
        #[arg(long)]
        repair: bool,
    },

    /// Validate the project configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
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
        Commands::Init => cmd::init::run(&root, cli.json),
        Commands::Registry { subcommand } => cmd::registry::run(&root, subcommand, cli.json),
        Commands::Subject { subcommand } => cmd::subject::run(&root, subcommand, cli.json),
        Commands::Item { subcommand } => cmd::item::run(&root, subcommand, cli.json),
        Commands::Reference { subcommand } => cmd::reference::run(&root, subcommand, cli.json),
        Commands::Audit { repair } => cmd::audit::run(&root, repair, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

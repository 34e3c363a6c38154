#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::OutputMode;
use std::env;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "jejak: versioned change tracking for budget records",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Derive the output mode from flags.
    fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Initialize a jejak ledger",
        long_about = "Initialize the jejak ledger in the current directory.",
        after_help = "EXAMPLES:\n    # Initialize a ledger in the current directory\n    jejak init\n\n    # Emit machine-readable output\n    jejak init --json"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        about = "Record a completed save of a record",
        long_about = "Notify the tracker that a record was saved, appending or amending a ledger version as needed.",
        after_help = "EXAMPLES:\n    # Track a budget record save by user 7\n    jejak save --ledger budget --record record.json --actor 7\n\n    # Track a system-initiated realization save\n    jejak save --ledger realization --record record.json"
    )]
    Save(cmd::save::SaveArgs),

    #[command(
        about = "List a record's version history",
        long_about = "List a record's versions, newest first, optionally including soft-deleted entries.",
        after_help = "EXAMPLES:\n    # Newest five budget versions of record 12\n    jejak history --ledger budget 12\n\n    # Full realization history, deleted entries included\n    jejak history --ledger realization 12 --all --show-deleted"
    )]
    History(cmd::history::HistoryArgs),

    #[command(
        about = "Show one ledger entry in full",
        long_about = "Show a single ledger entry with its snapshot and change set.",
        after_help = "EXAMPLES:\n    # Show budget entry 3\n    jejak show --ledger budget 3\n\n    # Emit machine-readable output\n    jejak show --ledger budget 3 --json"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        about = "Soft-delete a realization entry",
        after_help = "EXAMPLES:\n    # Hide realization entry 9 from history\n    jejak delete 9"
    )]
    Delete(cmd::delete::DeleteArgs),

    #[command(
        about = "Restore a soft-deleted realization entry",
        after_help = "EXAMPLES:\n    # Bring realization entry 9 back\n    jejak restore 9"
    )]
    Restore(cmd::restore::RestoreArgs),

    #[command(
        about = "Sweep realization entries past retention",
        long_about = "Soft-delete realization entries older than the retention window.",
        after_help = "EXAMPLES:\n    # Sweep with the configured retention\n    jejak prune\n\n    # One-off sweep with a 30-day window\n    jejak prune --retention-days 30"
    )]
    Prune(cmd::prune::PruneArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("JEJAK_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "jejak=debug,info"
        } else {
            "jejak=info,warn"
        })
    });

    let format = env::var("JEJAK_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry.with(fmt::layer().json().with_ansi(false)).init();
        }
        _ => {
            registry.with(fmt::layer().compact()).init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = std::env::current_dir()?;
    let mode = cli.output_mode();

    match cli.command {
        Commands::Init(ref args) => cmd::init::run_init(args, mode, &project_root),
        Commands::Save(ref args) => cmd::save::run_save(args, mode, &project_root),
        Commands::History(ref args) => cmd::history::run_history(args, mode, &project_root),
        Commands::Show(ref args) => cmd::show::run_show(args, mode, &project_root),
        Commands::Delete(ref args) => cmd::delete::run_delete(args, mode, &project_root),
        Commands::Restore(ref args) => cmd::restore::run_restore(args, mode, &project_root),
        Commands::Prune(ref args) => cmd::prune::run_prune(args, mode, &project_root),
    }
}

//! Corpus: cache-aware sync of a shared document corpus into projects.
//!
//! # Usage
//!
//! ```text
//! corpus sync   [--target DIR] [-c CATEGORY]... [--remote URL] [--ref REF] [--force] [--json]
//! corpus status [--target DIR] [-c CATEGORY]... [--json]
//! corpus diff   [--target DIR] [-c CATEGORY]... [--remote URL] [--ref REF] [--patch] [--json]
//! corpus update [--target DIR] [-c CATEGORY]... [--remote URL] [--ref REF] [--dry-run] [--force] [--json]
//! corpus cache  stats|health|prune|clear [--json]
//! ```
//!
//! `-v` raises log verbosity (`-v` info, `-vv` debug); `RUST_LOG` overrides.

mod commands;
mod error;
mod report;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{
    cache::CacheCommand, diff::DiffArgs, status::StatusArgs, sync::SyncArgs, update::UpdateArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "corpus",
    version,
    about = "Sync a shared document corpus into project trees, fetching only when the cache falls short",
    long_about = None,
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Materialise corpus files into the target, fetching only when needed.
    Sync(SyncArgs),

    /// Show local changes since the last sync (no network).
    Status(StatusArgs),

    /// Show upstream changes since the last sync without applying them.
    Diff(DiffArgs),

    /// Apply upstream changes, stopping on files that also changed locally.
    Update(UpdateArgs),

    /// Inspect and maintain the content cache.
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = std::env::var("RUST_LOG")
        .ok()
        .filter(|raw| !raw.trim().is_empty())
        .and_then(|raw| EnvFilter::try_new(raw.trim()).ok())
        .unwrap_or_else(|| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Sync(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Update(args) => args.run(),
        Commands::Cache { command } => commands::cache::run(command),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report::print_error(&err, cli.verbose);
            ExitCode::FAILURE
        }
    }
}

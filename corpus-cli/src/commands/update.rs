//! `corpus update`: apply upstream changes, stopping on local conflicts.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use corpus_sync::{Project, UpdateReport, WriteResult};
use corpus_transport::GitTransport;

use super::{print_json, Invocation, RemoteArgs, TargetArgs};
use crate::commands::sync::short_version;
use crate::error::CliError;

/// Arguments for `corpus update`.
#[derive(Args, Debug)]
pub struct UpdateArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub remote: RemoteArgs,

    /// Show what would change without touching the target or the state.
    #[arg(long)]
    pub dry_run: bool,

    /// Overwrite files that changed both locally and upstream.
    #[arg(long)]
    pub force: bool,
}

impl UpdateArgs {
    pub fn run(self) -> Result<()> {
        let inv = Invocation::resolve(&self.target, &self.remote)?;
        let options = inv.options(self.force);
        let project = Project::open(&inv.target, &inv.settings, &inv.cache);
        let mut transport = GitTransport::from_settings(&inv.settings);

        let report = project
            .update(&mut transport, &options, self.dry_run)
            .with_context(|| format!("update failed for {}", inv.target.display()))?;

        if self.target.json {
            print_json(&report)?;
        } else {
            print_update(&report);
        }

        if !report.errors.is_empty() {
            return Err(CliError::PartialFailure {
                count: report.errors.len(),
                operation: "updated",
            }
            .into());
        }
        Ok(())
    }
}

fn print_update(report: &UpdateReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    let version = short_version(&report.version);

    let changed: Vec<&WriteResult> = report
        .actions
        .iter()
        .filter(|a| !matches!(a, WriteResult::Unchanged(_)))
        .collect();

    if changed.is_empty() && report.conflicts.is_empty() && report.errors.is_empty() {
        println!("{prefix}✓ already at {version}");
        return;
    }

    println!(
        "{prefix}✓ updated to {version} ({} change(s), {} local drift)",
        changed.len(),
        report.local.total_changes()
    );
    for action in &report.actions {
        match action {
            WriteResult::Written(p) => println!("  ✎  {p}"),
            WriteResult::WouldWrite(p) => println!("  ~  {p}"),
            WriteResult::Removed(p) => println!("  ✗  {p}"),
            WriteResult::WouldRemove(p) => println!("  -  {p}"),
            WriteResult::Unchanged(p) => println!("  ·  {p}"),
        }
    }

    if !report.conflicts.is_empty() {
        let label = if report.forced {
            "Overwritten local changes:".yellow()
        } else {
            "Conflicts (changed locally and upstream):".red()
        };
        println!();
        println!("{label}");
        for path in &report.conflicts {
            println!("  !  {path}");
        }
        if report.dry_run && !report.forced {
            println!("Re-run with --force to overwrite them.");
        }
    }

    for failure in &report.errors {
        println!("  {}  {}: {}", "✗".red(), failure.file, failure.error);
    }
}

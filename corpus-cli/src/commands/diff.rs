//! `corpus diff`: upstream changes since the last sync, not applied.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use corpus_sync::{DiffReport, Project};
use corpus_transport::GitTransport;

use super::{print_json, Invocation, RemoteArgs, TargetArgs};
use crate::commands::sync::short_version;

/// Arguments for `corpus diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub remote: RemoteArgs,

    /// Print unified diffs for every changed file.
    #[arg(long)]
    pub patch: bool,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let inv = Invocation::resolve(&self.target, &self.remote)?;
        let options = inv.options(false);
        let project = Project::open(&inv.target, &inv.settings, &inv.cache);
        let mut transport = GitTransport::from_settings(&inv.settings);

        let report = project
            .diff(&mut transport, &options, self.patch)
            .with_context(|| format!("diff failed for {}", inv.target.display()))?;

        if self.target.json {
            return print_json(&report);
        }
        print_diff(&report);
        Ok(())
    }
}

fn print_diff(report: &DiffReport) {
    let version = short_version(&report.version);
    let c = &report.comparison;
    if c.is_clean() {
        println!("No upstream changes (upstream at {version}).");
        return;
    }

    println!(
        "Upstream {version}: {} added, {} modified, {} removed",
        c.added.len(),
        c.modified.len(),
        c.removed.len()
    );
    for path in &c.added {
        println!("  {}  {path}", "+".green());
    }
    for path in &c.modified {
        println!("  {}  {path}", "~".yellow());
    }
    for path in &c.removed {
        println!("  {}  {path}", "-".red());
    }

    for patch in &report.patches {
        println!();
        print!("{}", patch.unified_diff);
        if !patch.unified_diff.ends_with('\n') {
            println!();
        }
    }
}

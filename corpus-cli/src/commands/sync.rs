//! `corpus sync`: materialise corpus files into a target.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use corpus_sync::{Project, SyncReport};
use corpus_transport::GitTransport;

use crate::error::CliError;

use super::{category_list, print_json, Invocation, RemoteArgs, TargetArgs};

/// Arguments for `corpus sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub remote: RemoteArgs,

    /// Fetch even when the cache could satisfy the sync.
    #[arg(long)]
    pub force: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let inv = Invocation::resolve(&self.target, &self.remote)?;
        let options = inv.options(self.force);
        let project = Project::open(&inv.target, &inv.settings, &inv.cache);
        let mut transport = GitTransport::from_settings(&inv.settings);

        let report = project
            .sync(&mut transport, &options)
            .with_context(|| format!("sync failed for {}", inv.target.display()))?;

        if self.target.json {
            print_json(&report)?;
        } else {
            print_report(&report, &category_list(&options.categories));
        }

        if !report.is_success() {
            return Err(CliError::PartialFailure {
                count: report.errors.len(),
                operation: "synced",
            }
            .into());
        }
        Ok(())
    }
}

fn print_report(report: &SyncReport, categories: &str) {
    let source = if report.fetched {
        match &report.version {
            Some(version) => format!("fetched {}", short_version(version)),
            None => "fetched".to_string(),
        }
    } else {
        format!("from cache, {:.0}% hit", report.cache_hit_ratio * 100.0)
    };

    if report.copied.is_empty() && report.removed.is_empty() && report.errors.is_empty() {
        println!("✓ [{categories}] up to date ({source})");
    } else {
        println!(
            "✓ [{categories}] synced ({} copied, {} removed, {} unchanged, {source})",
            report.copied.len(),
            report.removed.len(),
            report.skipped.len()
        );
    }

    for path in &report.copied {
        println!("  ✎  {path}");
    }
    for path in &report.removed {
        println!("  -  {path}");
    }
    for failure in &report.errors {
        println!("  {}  {}: {}", "✗".red(), failure.file, failure.error);
    }
}

/// Commit ids are shortened; branch and tag names are left alone.
pub(crate) fn short_version(version: &str) -> &str {
    if version.len() == 40 && version.bytes().all(|b| b.is_ascii_hexdigit()) {
        &version[..12]
    } else {
        version
    }
}

#[cfg(test)]
mod tests {
    use super::short_version;

    #[test]
    fn shortens_commit_ids_only() {
        let commit = "0123456789abcdef0123456789abcdef01234567";
        assert_eq!(short_version(commit), "0123456789ab");
        assert_eq!(short_version("v1.2"), "v1.2");
        assert_eq!(short_version("main"), "main");
    }
}

//! `corpus status`: local drift since the last sync.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use corpus_core::RelPath;
use corpus_sync::{Comparison, Project, StatusReport};

use super::{category_list, print_json, Invocation, RemoteArgs, TargetArgs};
use crate::commands::sync::short_version;

/// Arguments for `corpus status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let inv = Invocation::resolve(&self.target, &RemoteArgs::default())?;
        let project = Project::open(&inv.target, &inv.settings, &inv.cache);
        let report = project
            .status(&inv.settings.categories)
            .with_context(|| format!("status check failed for {}", inv.target.display()))?;

        if self.target.json {
            print_json(&StatusJson::from(&report))?;
            return Ok(());
        }

        print_status(&report);
        Ok(())
    }
}

#[derive(Serialize)]
struct StatusJson<'a> {
    target: String,
    categories: Vec<&'a str>,
    synced: bool,
    last_sync: Option<DateTime<Utc>>,
    version: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<SummaryJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    changes: Option<&'a Comparison>,
}

#[derive(Serialize)]
struct SummaryJson {
    added: usize,
    modified: usize,
    removed: usize,
    unchanged: usize,
    coverage: f64,
}

impl<'a> From<&'a StatusReport> for StatusJson<'a> {
    fn from(report: &'a StatusReport) -> Self {
        Self {
            target: report.target.display().to_string(),
            categories: report.categories.iter().map(|c| c.as_str()).collect(),
            synced: report.has_state(),
            last_sync: report.last_sync,
            version: report.version.as_deref(),
            summary: report.comparison.as_ref().map(|c| SummaryJson {
                added: c.added.len(),
                modified: c.modified.len(),
                removed: c.removed.len(),
                unchanged: c.unchanged.len(),
                coverage: c.coverage(),
            }),
            changes: report.comparison.as_ref(),
        }
    }
}

#[derive(Tabled)]
struct ChangeRow {
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "path")]
    path: String,
}

fn print_status(report: &StatusReport) {
    let categories = category_list(&report.categories);
    let Some(comparison) = &report.comparison else {
        println!(
            "No sync state for {} [{categories}]. Run `corpus sync` first.",
            report.target.display()
        );
        return;
    };

    let when = report
        .last_sync
        .map(|t| format!("{} ({})", t.format("%Y-%m-%d %H:%M UTC"), age(t, Utc::now())))
        .unwrap_or_else(|| "unknown".to_string());
    let version = report.version.as_deref().map(short_version).unwrap_or("unknown");
    println!("{} [{categories}]", report.target.display().to_string().bold());
    println!("  last sync: {when}");
    println!("  version:   {version}");
    println!();

    if comparison.is_clean() {
        println!(
            "{} no local changes ({} files tracked)",
            "✓".green(),
            comparison.unchanged.len()
        );
        return;
    }

    let rows = rows(comparison);
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    println!(
        "{} added, {} modified, {} removed, {} unchanged ({:.0}% coverage)",
        comparison.added.len(),
        comparison.modified.len(),
        comparison.removed.len(),
        comparison.unchanged.len(),
        comparison.coverage() * 100.0
    );
}

fn rows(comparison: &Comparison) -> Vec<ChangeRow> {
    let row = |label: &str, path: &RelPath| ChangeRow {
        status: label.to_string(),
        path: path.to_string(),
    };
    let mut rows: Vec<ChangeRow> = comparison
        .added
        .iter()
        .map(|p| row("added", p))
        .chain(comparison.modified.iter().map(|p| row("modified", p)))
        .chain(comparison.removed.iter().map(|p| row("removed", p)))
        .collect();
    rows.sort_by(|a, b| a.path.cmp(&b.path));
    rows
}

/// `5m ago`, `3h ago`, `2d ago`.
fn age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds().max(0);
    match secs {
        s if s < 60 => "just now".to_string(),
        s if s < 3_600 => format!("{}m ago", s / 60),
        s if s < 86_400 => format!("{}h ago", s / 3_600),
        s => format!("{}d ago", s / 86_400),
    }
}

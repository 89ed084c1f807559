//! Subcommands and the argument groups they share.

pub mod cache;
pub mod diff;
pub mod status;
pub mod sync;
pub mod update;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use corpus_cache::ContentCache;
use corpus_core::{Category, ProjectConfig, Settings};
use corpus_sync::SyncOptions;

use crate::error::CliError;

/// Which project and categories a command works on.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Project directory to sync into.
    #[arg(long, default_value = ".")]
    pub target: PathBuf,

    /// Category to include; repeat or separate with commas.
    #[arg(short = 'c', long = "category", value_delimiter = ',', value_parser = parse_category)]
    pub categories: Vec<Category>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

/// Where upstream lives.
#[derive(Args, Debug, Clone, Default)]
pub struct RemoteArgs {
    /// Upstream repository URL (overrides CORPUS_REMOTE and .corpus.yaml).
    #[arg(long)]
    pub remote: Option<String>,

    /// Branch, tag or commit to fetch (default: upstream default branch).
    #[arg(long = "ref")]
    pub version_ref: Option<String>,
}

fn parse_category(raw: &str) -> std::result::Result<Category, String> {
    Category::new(raw.trim()).map_err(|e| e.to_string())
}

/// Settings resolved for one invocation: environment, then the project's
/// `.corpus.yaml`, then flags.
pub struct Invocation {
    pub settings: Settings,
    pub target: PathBuf,
    pub cache: ContentCache,
}

impl Invocation {
    pub fn resolve(target: &TargetArgs, remote: &RemoteArgs) -> Result<Self> {
        let mut settings = Settings::from_env().context("failed to resolve settings")?;
        let dir = existing_dir(&target.target)?;

        if let Some(project) = ProjectConfig::load_at(&dir)? {
            tracing::debug!(path = %ProjectConfig::path_at(&dir).display(), "applying project config");
            settings.apply_project(&project);
        }
        if !target.categories.is_empty() {
            settings.categories = dedup(&target.categories);
        }
        if let Some(url) = &remote.remote {
            settings.remote_url = Some(url.clone());
        }
        if let Some(reference) = &remote.version_ref {
            settings.version_ref = Some(reference.clone());
        }

        let cache = ContentCache::from_settings(&settings);
        Ok(Self {
            settings,
            target: dir,
            cache,
        })
    }

    pub fn options(&self, force: bool) -> SyncOptions {
        SyncOptions {
            force,
            ..SyncOptions::from_settings(&self.settings)
        }
    }
}

fn existing_dir(path: &Path) -> Result<PathBuf> {
    if !path.is_dir() {
        return Err(CliError::TargetMissing {
            path: path.to_path_buf(),
        }
        .into());
    }
    path.canonicalize()
        .with_context(|| format!("cannot resolve target directory {}", path.display()))
}

fn dedup(categories: &[Category]) -> Vec<Category> {
    let mut out: Vec<Category> = Vec::with_capacity(categories.len());
    for c in categories {
        if !out.contains(c) {
            out.push(c.clone());
        }
    }
    out
}

/// Pretty JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize JSON output")?
    );
    Ok(())
}

/// `core, agents`
pub fn category_list(categories: &[Category]) -> String {
    categories
        .iter()
        .map(Category::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

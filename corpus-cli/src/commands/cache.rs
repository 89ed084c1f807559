//! `corpus cache`: inspect and maintain the content cache.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;

use corpus_cache::ContentCache;
use corpus_core::Settings;

use super::print_json;
use crate::error::CliError;

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Blob count, size and utilization.
    Stats(JsonFlag),

    /// Check that the cache directory is usable.
    Health(JsonFlag),

    /// Evict least recently used blobs down to a size limit.
    Prune {
        /// Size limit in bytes (default: CORPUS_CACHE_MAX_BYTES).
        #[arg(long)]
        max_bytes: Option<u64>,

        #[command(flatten)]
        output: JsonFlag,
    },

    /// Remove every cached blob.
    Clear(JsonFlag),
}

#[derive(Args, Debug, Clone, Copy)]
pub struct JsonFlag {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct ClearJson {
    removed: usize,
}

pub fn run(command: CacheCommand) -> Result<()> {
    let settings = Settings::from_env().context("failed to resolve settings")?;
    let cache = ContentCache::from_settings(&settings);

    match command {
        CacheCommand::Stats(out) => {
            let stats = cache.directory_stats();
            if out.json {
                return print_json(&stats);
            }
            println!("{}", stats.path.display().to_string().bold());
            println!("  blobs:       {}", stats.file_count);
            println!("  size:        {}", human_bytes(stats.size));
            println!("  capacity:    {}", human_bytes(stats.capacity));
            println!("  utilization: {:.1}%", stats.utilization_percent);
        }
        CacheCommand::Health(out) => {
            let health = cache.health_status();
            if out.json {
                print_json(&health)?;
            } else if health.healthy {
                println!("{} cache at {} is healthy", "✓".green(), cache.root().display());
            } else {
                println!("{} cache at {} is unhealthy", "✗".red(), cache.root().display());
                for line in &health.diagnostics {
                    println!("  - {line}");
                }
            }
            if !health.healthy {
                return Err(CliError::CacheUnhealthy {
                    root: cache.root().to_path_buf(),
                    diagnostics: health.diagnostics,
                }
                .into());
            }
        }
        CacheCommand::Prune { max_bytes, output } => {
            let limit = max_bytes.unwrap_or(settings.cache_max_bytes);
            let report = cache.evict(limit)?;
            if output.json {
                return print_json(&report);
            }
            println!(
                "✓ pruned {} blob(s), freed {} (limit {})",
                report.removed,
                human_bytes(report.freed_bytes),
                human_bytes(limit)
            );
        }
        CacheCommand::Clear(out) => {
            let removed = cache.clear()?;
            if out.json {
                return print_json(&ClearJson { removed });
            }
            println!("✓ removed {removed} blob(s) from {}", cache.root().display());
        }
    }
    Ok(())
}

fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::human_bytes;

    #[test]
    fn formats_binary_units() {
        assert_eq!(human_bytes(0), "0 B");
        assert_eq!(human_bytes(1023), "1023 B");
        assert_eq!(human_bytes(1024), "1.0 KiB");
        assert_eq!(human_bytes(256 * 1024 * 1024), "256.0 MiB");
    }
}

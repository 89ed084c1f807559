//! Health and usage reporting for the content cache.
//!
//! Neither report ever fails: problems become diagnostics, since an unhealthy
//! cache only costs performance.

use std::fs;
use std::path::PathBuf;

use serde::Serialize;

use crate::store::ContentCache;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub diagnostics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectoryStats {
    pub path: PathBuf,
    pub file_count: u64,
    pub size: u64,
    pub capacity: u64,
    pub utilization_percent: f64,
}

impl ContentCache {
    /// Check the cache root: creatable, writable, listable.
    pub fn health_status(&self) -> HealthStatus {
        let mut diagnostics = Vec::new();
        let root = self.root();

        if let Err(err) = fs::create_dir_all(root) {
            diagnostics.push(format!("cannot create {}: {err}", root.display()));
            return HealthStatus {
                healthy: false,
                diagnostics,
            };
        }

        let marker = root.join(format!(".health-check-{}", std::process::id()));
        let writable = match fs::write(&marker, b"ok") {
            Ok(()) => {
                let _ = fs::remove_file(&marker);
                true
            }
            Err(err) => {
                diagnostics.push(format!("{} is not writable: {err}", root.display()));
                false
            }
        };

        let listable = match self.entries() {
            Ok(entries) => {
                let size: u64 = entries.iter().map(|e| e.size).sum();
                if self.max_bytes() > 0 && size > self.max_bytes() {
                    diagnostics.push(format!(
                        "over capacity: {size} of {} bytes used",
                        self.max_bytes()
                    ));
                }
                true
            }
            Err(err) => {
                diagnostics.push(format!("cannot list blobs: {err}"));
                false
            }
        };

        if let Ok(stray) = self.stray_temp_files() {
            if !stray.is_empty() {
                diagnostics.push(format!(
                    "{} interrupted write(s) left temp files behind",
                    stray.len()
                ));
            }
        }

        let healthy = writable && listable;
        if !healthy {
            tracing::warn!(root = %root.display(), "content cache is unhealthy");
        }
        HealthStatus {
            healthy,
            diagnostics,
        }
    }

    /// Blob count and total size. An unreadable root reports zeros.
    pub fn directory_stats(&self) -> DirectoryStats {
        let entries = self.entries().unwrap_or_else(|err| {
            tracing::debug!(error = %err, "cache stats unavailable");
            Vec::new()
        });
        let size: u64 = entries.iter().map(|e| e.size).sum();
        let utilization_percent = if self.max_bytes() == 0 {
            0.0
        } else {
            size as f64 * 100.0 / self.max_bytes() as f64
        };
        DirectoryStats {
            path: self.root().to_path_buf(),
            file_count: entries.len() as u64,
            size,
            capacity: self.max_bytes(),
            utilization_percent,
        }
    }
}

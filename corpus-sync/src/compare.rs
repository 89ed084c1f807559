//! Manifest comparison. Pure: no I/O.

use std::collections::BTreeSet;

use serde::Serialize;

use corpus_core::{Manifest, RelPath};

/// Every path of a `(current, saved)` pair, in exactly one bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Comparison {
    /// In current only.
    pub added: Vec<RelPath>,
    /// In both, digests differ.
    pub modified: Vec<RelPath>,
    /// In saved only.
    pub removed: Vec<RelPath>,
    pub unchanged: Vec<RelPath>,
}

impl Comparison {
    pub fn total_changes(&self) -> usize {
        self.added.len() + self.modified.len() + self.removed.len()
    }

    pub fn total(&self) -> usize {
        self.total_changes() + self.unchanged.len()
    }

    /// Fraction of paths unchanged; 1.0 when there are no paths at all.
    pub fn coverage(&self) -> f64 {
        match self.total() {
            0 => 1.0,
            total => self.unchanged.len() as f64 / total as f64,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.total_changes() == 0
    }

    /// Added, modified and removed paths together.
    pub fn changed(&self) -> BTreeSet<&RelPath> {
        self.added
            .iter()
            .chain(&self.modified)
            .chain(&self.removed)
            .collect()
    }
}

/// Partition `current ∪ saved`. Buckets come out sorted because manifests
/// are ordered maps.
pub fn compare(current: &Manifest, saved: &Manifest) -> Comparison {
    let mut result = Comparison::default();

    for (path, digest) in current {
        match saved.get(path) {
            None => result.added.push(path.clone()),
            Some(old) if old != digest => result.modified.push(path.clone()),
            Some(_) => result.unchanged.push(path.clone()),
        }
    }
    result.removed = saved
        .keys()
        .filter(|path| !current.contains_key(*path))
        .cloned()
        .collect();

    result
}

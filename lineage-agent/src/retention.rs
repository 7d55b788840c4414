//! Retention pass.
//!
//! Keeps the newest `keep_full` full backups together with every incremental
//! chained onto them, plus the whole lineage of the artifact named by the
//! result handle. Everything else under the storage root is removed,
//! including incrementals whose chain is broken.

use crate::lineage::validate_lineage;
use crate::storage::list_artifacts;
use crate::utils::errors::{LineageError, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    pub retained: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

/// Work out which artifacts a prune would remove, without touching disk.
pub fn plan_prune(
    storage_root: &Path,
    keep_full: usize,
    max_depth: usize,
    referenced: Option<&Path>,
) -> Result<PruneReport> {
    let artifacts = list_artifacts(storage_root)?;
    if keep_full == 0 {
        return Ok(PruneReport {
            retained: artifacts.into_iter().map(|a| a.directory).collect(),
            removed: Vec::new(),
        });
    }

    // Chain roots, one per artifact, oldest artifact first.
    let roots: Vec<Option<PathBuf>> = artifacts
        .iter()
        .map(|a| {
            validate_lineage(&a.directory, max_depth)
                .ok()
                .map(|lineage| canonical(&lineage.root().directory))
        })
        .collect();

    let kept_fulls: HashSet<PathBuf> = artifacts
        .iter()
        .zip(&roots)
        .filter(|(a, root)| root.as_deref() == Some(canonical(&a.directory).as_path()))
        .map(|(a, _)| canonical(&a.directory))
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .take(keep_full)
        .collect();

    let mut keep: HashSet<PathBuf> = HashSet::new();
    for (artifact, root) in artifacts.iter().zip(&roots) {
        if root.as_ref().map(|r| kept_fulls.contains(r)).unwrap_or(false) {
            keep.insert(canonical(&artifact.directory));
        }
    }

    if let Some(target) = referenced {
        keep.insert(canonical(target));
        match validate_lineage(target, max_depth) {
            Ok(lineage) => {
                keep.extend(lineage.links().iter().map(|l| canonical(&l.directory)));
            }
            Err(e) => warn!("Referenced backup {} has no intact lineage: {}", target.display(), e),
        }
    }

    let mut report = PruneReport::default();
    for artifact in artifacts {
        if keep.contains(&canonical(&artifact.directory)) {
            report.retained.push(artifact.directory);
        } else {
            report.removed.push(artifact.directory);
        }
    }
    Ok(report)
}

/// Remove every artifact outside the retained set.
pub fn prune(
    storage_root: &Path,
    keep_full: usize,
    max_depth: usize,
    referenced: Option<&Path>,
    dry_run: bool,
) -> Result<PruneReport> {
    let report = plan_prune(storage_root, keep_full, max_depth, referenced)?;

    for dir in &report.removed {
        if dry_run {
            info!("[dry-run] Would remove {}", dir.display());
            continue;
        }
        std::fs::remove_dir_all(dir).map_err(|e| LineageError::storage(dir, e))?;
        info!("Removed expired backup {}", dir.display());
    }

    info!(
        "Retention: {} retained, {} {}",
        report.retained.len(),
        report.removed.len(),
        if dry_run { "to remove" } else { "removed" }
    );
    Ok(report)
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

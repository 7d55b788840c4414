//! Storage root scanning.
//!
//! Artifacts are the immediate subdirectories of the storage root whose
//! names follow the `full_*` / `incr_*` convention. "Latest" means most
//! recently modified directory.

use crate::artifact::is_artifact_name;
use crate::utils::errors::{LineageError, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// An artifact directory discovered on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub directory: PathBuf,
    pub modified: SystemTime,
}

/// List every artifact directory under `storage_root`, oldest first.
///
/// A missing storage root is an empty listing.
pub fn list_artifacts(storage_root: &Path) -> Result<Vec<ArtifactRef>> {
    let entries = match std::fs::read_dir(storage_root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(LineageError::storage(storage_root, e)),
    };

    let mut artifacts = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| LineageError::storage(storage_root, e))?;

        let name = entry.file_name();
        if !is_artifact_name(&name.to_string_lossy()) {
            continue;
        }

        // Symlinked directories are not artifacts.
        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(_) => continue,
        };
        if !file_type.is_dir() {
            continue;
        }

        let modified = match entry.metadata().and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", entry.path().display(), e);
                continue;
            }
        };

        artifacts.push(ArtifactRef {
            directory: entry.path(),
            modified,
        });
    }

    artifacts.sort_by(|a, b| {
        a.modified
            .cmp(&b.modified)
            .then_with(|| a.directory.cmp(&b.directory))
    });

    Ok(artifacts)
}

/// The most recently modified artifact, or `None` when there is none yet.
pub fn latest_artifact(storage_root: &Path) -> Result<Option<ArtifactRef>> {
    Ok(list_artifacts(storage_root)?.pop())
}

#[cfg(test)]
pub(crate) fn backdate(dir: &Path, secs: u64) {
    let when = SystemTime::now() - std::time::Duration::from_secs(secs);
    std::fs::File::open(dir).unwrap().set_modified(when).unwrap();
}

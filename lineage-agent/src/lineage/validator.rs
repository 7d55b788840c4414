//! Lineage validation.
//!
//! Walks parent references from a chosen artifact back to its full backup
//! and returns the chain oldest-first. Any gap in the chain is reported as a
//! broken lineage; callers decide whether that is recoverable.

use crate::artifact::{ArtifactId, ArtifactKind, BackupArtifact};
use crate::lineage::checkpoint::{has_parent_ref, read_metadata, read_parent_ref};
use crate::utils::errors::{BrokenReason, LineageError, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default bound on the number of links in a chain.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// An intact chain `[full, incr_1, ..., incr_n]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lineage {
    links: Vec<BackupArtifact>,
}

impl Lineage {
    /// The full backup the chain is rooted at.
    pub fn root(&self) -> &BackupArtifact {
        &self.links[0]
    }

    /// The artifact the chain was resolved from.
    pub fn tip(&self) -> &BackupArtifact {
        &self.links[self.links.len() - 1]
    }

    /// Incrementals in apply order, oldest first.
    pub fn incrementals(&self) -> &[BackupArtifact] {
        &self.links[1..]
    }

    pub fn links(&self) -> &[BackupArtifact] {
        &self.links
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Always false: a lineage holds at least its full backup.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn contains(&self, dir: &Path) -> bool {
        self.links.iter().any(|link| link.directory == dir)
    }
}

/// Resolve and validate the lineage ending at `artifact_dir`.
///
/// Walks at most `max_depth` links; a longer chain is treated as a cycle.
pub fn validate_lineage(artifact_dir: &Path, max_depth: usize) -> Result<Lineage> {
    let mut links: Vec<BackupArtifact> = Vec::new();
    let mut current: PathBuf = artifact_dir.to_path_buf();

    loop {
        if links.len() >= max_depth {
            return Err(broken(&current, BrokenReason::TooDeep));
        }

        let (kind, _, checkpoint) = match read_metadata(&current) {
            Ok(record) => record,
            Err(e) => {
                debug!("Unreadable lineage link {}: {}", current.display(), e);
                return Err(broken(&current, BrokenReason::CorruptLink));
            }
        };

        // Any parent entry counts here, even one whose target cannot be read.
        let parent = match kind {
            ArtifactKind::Full => {
                if has_parent_ref(&current) {
                    return Err(broken(&current, BrokenReason::UnexpectedParent));
                }
                None
            }
            ArtifactKind::Incremental => match read_parent_ref(&current) {
                Ok(Some(parent)) if parent.is_dir() => Some(parent),
                Ok(Some(parent)) => {
                    debug!(
                        "Parent of {} does not resolve: {}",
                        current.display(),
                        parent.display()
                    );
                    return Err(broken(&current, BrokenReason::MissingParent));
                }
                Ok(None) => return Err(broken(&current, BrokenReason::MissingParent)),
                Err(e) => {
                    debug!("Unusable parent reference in {}: {}", current.display(), e);
                    return Err(broken(&current, BrokenReason::MissingParent));
                }
            },
        };

        links.push(BackupArtifact {
            id: ArtifactId::from_dir(&current),
            directory: current.clone(),
            kind,
            checkpoint,
            parent: parent.clone(),
        });

        match parent {
            Some(parent) => current = parent,
            None => break,
        }
    }

    links.reverse();
    Ok(Lineage { links })
}

fn broken(artifact: &Path, reason: BrokenReason) -> LineageError {
    LineageError::BrokenLineage {
        artifact: artifact.to_path_buf(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lineage::checkpoint::{write_parent_ref, CHECKPOINTS_FILE, PARENT_REF};
    use std::fs;
    use tempfile::TempDir;

    fn make_full(root: &Path, name: &str, lsn: u64) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir(&dir).unwrap();
        fs::write(
            dir.join(CHECKPOINTS_FILE),
            format!("backup_type = full-backuped\nfrom_lsn = 0\nto_lsn = {}\n", lsn),
        )
        .unwrap();
        dir
    }

    fn make_incr(root: &Path, name: &str, parent: &Path, from: u64, to: u64) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir(&dir).unwrap();
        fs::write(
            dir.join(CHECKPOINTS_FILE),
            format!("backup_type = incremental\nfrom_lsn = {}\nto_lsn = {}\n", from, to),
        )
        .unwrap();
        write_parent_ref(&dir, parent).unwrap();
        dir
    }

    fn ids(lineage: &Lineage) -> Vec<String> {
        lineage.links().iter().map(|l| l.id.to_string()).collect()
    }

    #[test]
    fn test_full_backup_is_trivially_valid() {
        let temp_dir = TempDir::new().unwrap();
        let full = make_full(temp_dir.path(), "full_a", 100);

        let lineage = validate_lineage(&full, DEFAULT_MAX_DEPTH).unwrap();
        assert_eq!(lineage.len(), 1);
        assert_eq!(lineage.root().directory, full);
        assert_eq!(lineage.tip().directory, full);
        assert!(lineage.incrementals().is_empty());
    }

    #[test]
    fn test_incremental_chain_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let full = make_full(temp_dir.path(), "full_a", 100);
        let i1 = make_incr(temp_dir.path(), "incr_b", &full, 100, 200);
        let i2 = make_incr(temp_dir.path(), "incr_c", &i1, 200, 300);

        let lineage = validate_lineage(&i2, DEFAULT_MAX_DEPTH).unwrap();
        assert_eq!(ids(&lineage), vec!["full_a", "incr_b", "incr_c"]);
        assert_eq!(lineage.tip().checkpoint, 300);
        assert_eq!(lineage.incrementals().len(), 2);
        assert!(lineage.contains(&full));
        assert!(!lineage.is_empty());
    }

    #[test]
    fn test_deleted_parent_is_broken() {
        let temp_dir = TempDir::new().unwrap();
        let full = make_full(temp_dir.path(), "full_a", 100);
        let i1 = make_incr(temp_dir.path(), "incr_b", &full, 100, 200);
        fs::remove_dir_all(&full).unwrap();

        let err = validate_lineage(&i1, DEFAULT_MAX_DEPTH).unwrap_err();
        assert_eq!(err.broken_reason(), Some(BrokenReason::MissingParent));
    }

    #[test]
    fn test_incremental_without_parent_is_broken() {
        let temp_dir = TempDir::new().unwrap();
        let full = make_full(temp_dir.path(), "full_a", 100);
        let i1 = make_incr(temp_dir.path(), "incr_b", &full, 100, 200);
        fs::remove_file(i1.join(PARENT_REF)).unwrap();

        let err = validate_lineage(&i1, DEFAULT_MAX_DEPTH).unwrap_err();
        assert_eq!(err.broken_reason(), Some(BrokenReason::MissingParent));
    }

    #[test]
    fn test_full_with_parent_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let other = make_full(temp_dir.path(), "full_a", 100);
        let full = make_full(temp_dir.path(), "full_b", 200);
        write_parent_ref(&full, &other).unwrap();

        let err = validate_lineage(&full, DEFAULT_MAX_DEPTH).unwrap_err();
        assert_eq!(err.broken_reason(), Some(BrokenReason::UnexpectedParent));

        // Dangling parent on a full backup is rejected the same way.
        fs::remove_dir_all(&other).unwrap();
        let err = validate_lineage(&full, DEFAULT_MAX_DEPTH).unwrap_err();
        assert_eq!(err.broken_reason(), Some(BrokenReason::UnexpectedParent));
    }

    #[test]
    fn test_unreadable_parent_entry_on_full_is_unexpected() {
        let temp_dir = TempDir::new().unwrap();
        let full = make_full(temp_dir.path(), "full_a", 100);
        fs::write(full.join(PARENT_REF), "\n").unwrap();

        let err = validate_lineage(&full, DEFAULT_MAX_DEPTH).unwrap_err();
        assert_eq!(err.broken_reason(), Some(BrokenReason::UnexpectedParent));
    }

    #[test]
    fn test_empty_parent_entry_on_incremental_is_missing() {
        let temp_dir = TempDir::new().unwrap();
        let full = make_full(temp_dir.path(), "full_a", 100);
        let i1 = make_incr(temp_dir.path(), "incr_b", &full, 100, 200);
        fs::write(i1.join(PARENT_REF), "").unwrap();

        let err = validate_lineage(&i1, DEFAULT_MAX_DEPTH).unwrap_err();
        assert_eq!(err.broken_reason(), Some(BrokenReason::MissingParent));
    }

    #[test]
    fn test_corrupt_link_is_broken() {
        let temp_dir = TempDir::new().unwrap();
        let full = make_full(temp_dir.path(), "full_a", 100);
        let i1 = make_incr(temp_dir.path(), "incr_b", &full, 100, 200);
        fs::write(full.join(CHECKPOINTS_FILE), "garbage\n").unwrap();

        let err = validate_lineage(&i1, DEFAULT_MAX_DEPTH).unwrap_err();
        assert_eq!(err.broken_reason(), Some(BrokenReason::CorruptLink));

        fs::remove_file(full.join(CHECKPOINTS_FILE)).unwrap();
        let err = validate_lineage(&i1, DEFAULT_MAX_DEPTH).unwrap_err();
        assert_eq!(err.broken_reason(), Some(BrokenReason::CorruptLink));
    }

    #[test]
    fn test_cycle_terminates() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("incr_a");
        let b = make_incr(temp_dir.path(), "incr_b", &a, 100, 200);
        fs::create_dir(&a).unwrap();
        fs::write(
            a.join(CHECKPOINTS_FILE),
            "backup_type = incremental\nfrom_lsn = 200\nto_lsn = 300\n",
        )
        .unwrap();
        write_parent_ref(&a, &b).unwrap();

        let err = validate_lineage(&a, DEFAULT_MAX_DEPTH).unwrap_err();
        assert_eq!(err.broken_reason(), Some(BrokenReason::TooDeep));
    }

    #[test]
    fn test_self_referencing_incremental_terminates() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("incr_a");
        fs::create_dir(&a).unwrap();
        fs::write(a.join(CHECKPOINTS_FILE), "backup_type = incremental\nto_lsn = 1\n").unwrap();
        write_parent_ref(&a, &a).unwrap();

        let err = validate_lineage(&a, 8).unwrap_err();
        assert_eq!(err.broken_reason(), Some(BrokenReason::TooDeep));
    }

    #[test]
    fn test_depth_bound_applies_to_legitimate_chains() {
        let temp_dir = TempDir::new().unwrap();
        let full = make_full(temp_dir.path(), "full_a", 100);
        let i1 = make_incr(temp_dir.path(), "incr_b", &full, 100, 200);
        let i2 = make_incr(temp_dir.path(), "incr_c", &i1, 200, 300);

        assert!(validate_lineage(&i2, 3).is_ok());
        let err = validate_lineage(&i2, 2).unwrap_err();
        assert_eq!(err.broken_reason(), Some(BrokenReason::TooDeep));
    }
}

//! Storage root access: artifact discovery, locking and disk usage.

pub mod footprint;
pub mod lock;
pub mod scanner;

pub use lock::StorageLock;
pub use scanner::{latest_artifact, list_artifacts, ArtifactRef};

use crate::utils::errors::{LineageError, Result};
use std::path::{Path, PathBuf};

/// Create the storage root if needed and return its canonical path.
///
/// Fails with a storage error when the root cannot be created or is not a
/// writable directory.
pub fn ensure_root(root: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(root).map_err(|e| LineageError::storage(root, e))?;
    let root = std::fs::canonicalize(root).map_err(|e| LineageError::storage(root, e))?;

    let meta = std::fs::metadata(&root).map_err(|e| LineageError::storage(&root, e))?;
    if !meta.is_dir() {
        return Err(LineageError::storage(&root, "not a directory"));
    }

    // Permission bits say nothing for root; try an actual write.
    let check = root.join(format!(".lineage.write-check.{}", std::process::id()));
    std::fs::write(&check, b"")
        .map_err(|e| LineageError::storage(&root, format!("not writable: {}", e)))?;
    std::fs::remove_file(&check).map_err(|e| LineageError::storage(&check, e))?;

    Ok(root)
}

/// Canonical form of an existing root, without creating it.
pub fn existing_root(root: &Path) -> Result<PathBuf> {
    let root = std::fs::canonicalize(root).map_err(|e| LineageError::storage(root, e))?;
    if !root.is_dir() {
        return Err(LineageError::storage(&root, "not a directory"));
    }
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_root_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("a/b/backups");
        let canonical = ensure_root(&root).unwrap();
        assert!(canonical.is_dir());
        assert!(canonical.is_absolute());
    }

    #[test]
    fn test_ensure_root_leaves_no_trace() {
        let temp_dir = TempDir::new().unwrap();
        let root = ensure_root(temp_dir.path()).unwrap();
        assert_eq!(std::fs::read_dir(&root).unwrap().count(), 0);
    }

    #[test]
    #[cfg(unix)]
    fn test_ensure_root_rejects_unwritable_directory() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("backups");
        std::fs::create_dir(&root).unwrap();
        std::fs::set_permissions(&root, std::fs::Permissions::from_mode(0o555)).unwrap();

        let writable = std::fs::write(root.join("x"), b"").is_ok();
        let result = ensure_root(&root);
        std::fs::set_permissions(&root, std::fs::Permissions::from_mode(0o755)).unwrap();

        if writable {
            // Running with privileges that ignore mode bits.
            assert!(result.is_ok());
        } else {
            assert!(matches!(result, Err(LineageError::Storage { .. })));
        }
    }

    #[test]
    fn test_ensure_root_rejects_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("backups");
        std::fs::write(&file, b"x").unwrap();
        assert!(matches!(ensure_root(&file), Err(LineageError::Storage { .. })));
    }

    #[test]
    fn test_existing_root_requires_presence() {
        let temp_dir = TempDir::new().unwrap();
        assert!(existing_root(temp_dir.path()).is_ok());
        assert!(matches!(
            existing_root(&temp_dir.path().join("missing")),
            Err(LineageError::Storage { .. })
        ));
    }
}

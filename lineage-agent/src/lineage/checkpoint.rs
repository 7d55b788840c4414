//! Checkpoint records and parent references.
//!
//! The backup tool leaves an `xtrabackup_checkpoints` file in every artifact:
//!
//! ```text
//! backup_type = incremental
//! from_lsn = 1626007
//! to_lsn = 1626124
//! last_lsn = 1626124
//! ```
//!
//! Incremental artifacts additionally carry a `basedir` entry naming the
//! parent artifact directory. It is either a symlink to the parent or a
//! plain file whose first line is the parent path.

use crate::artifact::{ArtifactId, ArtifactKind, BackupArtifact};
use crate::utils::errors::{LineageError, Result};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Metadata file written by the backup tool.
pub const CHECKPOINTS_FILE: &str = "xtrabackup_checkpoints";

/// Parent reference entry inside an incremental artifact.
pub const PARENT_REF: &str = "basedir";

/// Parsed contents of an artifact's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointRecord {
    pub kind: ArtifactKind,
    pub from_lsn: u64,
    pub to_lsn: u64,
    pub parent: Option<PathBuf>,
}

/// Parse the key=value body of a checkpoints file.
///
/// `path` is only used for error reporting.
pub fn parse_checkpoints(path: &Path, content: &str) -> Result<(ArtifactKind, u64, u64)> {
    let corrupt = |detail: String| LineageError::MetadataCorrupt {
        path: path.to_path_buf(),
        detail,
    };

    let mut values = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            values.insert(key.trim(), value.trim());
        }
    }

    let kind = match values.get("backup_type").copied() {
        Some("full-backuped") | Some("full-prepared") => ArtifactKind::Full,
        Some("incremental") => ArtifactKind::Incremental,
        Some(other) => return Err(corrupt(format!("unknown backup_type '{}'", other))),
        None => return Err(corrupt("missing backup_type".to_string())),
    };

    let lsn = |key: &str| -> Result<Option<u64>> {
        match values.get(key) {
            Some(raw) => raw
                .parse::<u64>()
                .map(Some)
                .map_err(|_| corrupt(format!("invalid {} '{}'", key, raw))),
            None => Ok(None),
        }
    };

    let to_lsn = lsn("to_lsn")?.ok_or_else(|| corrupt("missing to_lsn".to_string()))?;
    let from_lsn = lsn("from_lsn")?.unwrap_or(0);

    Ok((kind, from_lsn, to_lsn))
}

/// Read and parse the checkpoints file of the artifact in `artifact_dir`.
pub fn read_metadata(artifact_dir: &Path) -> Result<(ArtifactKind, u64, u64)> {
    let path = artifact_dir.join(CHECKPOINTS_FILE);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(LineageError::MetadataMissing { path });
        }
        Err(e) => {
            return Err(LineageError::MetadataCorrupt {
                path,
                detail: e.to_string(),
            });
        }
    };

    parse_checkpoints(&path, &content)
}

/// Read the checkpoint record of the artifact in `artifact_dir`.
pub fn read_checkpoint(artifact_dir: &Path) -> Result<CheckpointRecord> {
    let (kind, from_lsn, to_lsn) = read_metadata(artifact_dir)?;
    let parent = read_parent_ref(artifact_dir)?;

    Ok(CheckpointRecord {
        kind,
        from_lsn,
        to_lsn,
        parent,
    })
}

/// Whether a parent reference entry exists, whatever it contains.
pub fn has_parent_ref(artifact_dir: &Path) -> bool {
    std::fs::symlink_metadata(artifact_dir.join(PARENT_REF)).is_ok()
}

/// Resolve the parent reference stored alongside the metadata, if any.
///
/// The target is returned as recorded; whether it still exists is the
/// caller's concern.
pub fn read_parent_ref(artifact_dir: &Path) -> Result<Option<PathBuf>> {
    let path = artifact_dir.join(PARENT_REF);
    let meta = match std::fs::symlink_metadata(&path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(LineageError::MetadataCorrupt { path, detail: e.to_string() }),
    };

    let target = if meta.file_type().is_symlink() {
        std::fs::read_link(&path)
            .map_err(|e| LineageError::MetadataCorrupt { path: path.clone(), detail: e.to_string() })?
    } else if meta.is_file() {
        let content = std::fs::read_to_string(&path)
            .map_err(|e| LineageError::MetadataCorrupt { path: path.clone(), detail: e.to_string() })?;
        let line = content.lines().next().unwrap_or("").trim();
        if line.is_empty() {
            return Err(LineageError::MetadataCorrupt {
                path,
                detail: "empty parent reference".to_string(),
            });
        }
        PathBuf::from(line)
    } else {
        return Err(LineageError::MetadataCorrupt {
            path,
            detail: "parent reference is neither a file nor a symlink".to_string(),
        });
    };

    if target.is_relative() {
        Ok(Some(artifact_dir.join(target)))
    } else {
        Ok(Some(target))
    }
}

/// Record `parent` as the parent of the artifact in `artifact_dir`.
pub fn write_parent_ref(artifact_dir: &Path, parent: &Path) -> Result<()> {
    let path = artifact_dir.join(PARENT_REF);
    std::fs::write(&path, format!("{}\n", parent.display()))?;
    Ok(())
}

/// Load the artifact stored in `dir`.
pub fn load_artifact(dir: &Path) -> Result<BackupArtifact> {
    let record = read_checkpoint(dir)?;
    Ok(BackupArtifact {
        id: ArtifactId::from_dir(dir),
        directory: dir.to_path_buf(),
        kind: record.kind,
        checkpoint: record.to_lsn,
        parent: record.parent,
    })
}

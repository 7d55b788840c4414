//! Backup artifact identity and naming.
//!
//! Every backup lives in its own directory directly under the storage root.
//! The directory name is the artifact id: `<tag>_<timestamp>_<suffix>`, where
//! the tag is `full`, `incr` or `restore`. Only `full_*` and `incr_*`
//! directories are backup artifacts; `restore_*` directories are staging areas.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Type of a backup artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Full,
    Incremental,
}

impl ArtifactKind {
    /// Directory name tag for this kind.
    pub fn tag(self) -> &'static str {
        match self {
            ArtifactKind::Full => "full",
            ArtifactKind::Incremental => "incr",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Full => f.write_str("full"),
            ArtifactKind::Incremental => f.write_str("incremental"),
        }
    }
}

/// Tag used for restore staging directories.
pub const RESTORE_TAG: &str = "restore";

/// Unique artifact identifier, also used as the directory name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
    /// Generate a fresh id for a backup of the given kind.
    pub fn generate(kind: ArtifactKind) -> Self {
        Self::with_tag(kind.tag())
    }

    /// Generate a fresh id for a restore staging directory.
    pub fn generate_restore() -> Self {
        Self::with_tag(RESTORE_TAG)
    }

    fn with_tag(tag: &str) -> Self {
        let timestamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        ArtifactId(format!("{}_{}_{}", tag, timestamp, &suffix[..8]))
    }

    /// Id of the artifact stored at `dir` (its final path component).
    pub fn from_dir(dir: &Path) -> Self {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.to_string_lossy().into_owned());
        ArtifactId(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a directory name follows the backup artifact naming convention.
pub fn is_artifact_name(name: &str) -> bool {
    ["full_", "incr_"]
        .iter()
        .any(|prefix| name.len() > prefix.len() && name.starts_with(prefix))
}

/// A backup artifact resolved from disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupArtifact {
    pub id: ArtifactId,
    pub directory: PathBuf,
    pub kind: ArtifactKind,
    /// Log sequence number at which the backup is consistent.
    pub checkpoint: u64,
    /// Directory of the previous artifact in the chain (incrementals only).
    pub parent: Option<PathBuf>,
}

//! Custom error types for the lineage agent.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Why a parent chain could not be resolved back to a full backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokenReason {
    /// A full backup carries a parent reference.
    UnexpectedParent,
    /// An incremental backup has no parent reference, or it points nowhere.
    MissingParent,
    /// A link's checkpoint record could not be read.
    CorruptLink,
    /// The walk exceeded the configured depth.
    TooDeep,
}

impl fmt::Display for BrokenReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            BrokenReason::UnexpectedParent => "unexpected parent reference in full backup",
            BrokenReason::MissingParent => "missing parent reference",
            BrokenReason::CorruptLink => "corrupt or unreadable lineage link",
            BrokenReason::TooDeep => "lineage too deep / possible cycle",
        };
        f.write_str(reason)
    }
}

#[derive(Error, Debug)]
pub enum LineageError {
    #[error("Metadata missing: {}", path.display())]
    MetadataMissing { path: PathBuf },

    #[error("Metadata corrupt: {}: {detail}", path.display())]
    MetadataCorrupt { path: PathBuf, detail: String },

    #[error("Broken lineage at {}: {reason}", artifact.display())]
    BrokenLineage { artifact: PathBuf, reason: BrokenReason },

    #[error("External tool failed ({command}, exit code {}): {output}", exit_code.map(|c| c.to_string()).unwrap_or_else(|| "none".to_string()))]
    ExternalTool {
        command: String,
        exit_code: Option<i32>,
        output: String,
    },

    #[error("Failed to launch {program}: {source}")]
    ToolLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage error: {}: {detail}", path.display())]
    Storage { path: PathBuf, detail: String },

    #[error("Storage locked: {} (held by {})", path.display(), holder.map(|pid| format!("pid {}", pid)).unwrap_or_else(|| "an unidentified process".to_string()))]
    Locked { path: PathBuf, holder: Option<u32> },

    #[error("No backup available to restore in {}", storage_root.display())]
    NothingToRestore { storage_root: PathBuf },

    #[error("Invalid result handle {}: {detail}", path.display())]
    InvalidHandle { path: PathBuf, detail: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LineageError {
    pub fn storage(path: impl Into<PathBuf>, detail: impl fmt::Display) -> Self {
        LineageError::Storage {
            path: path.into(),
            detail: detail.to_string(),
        }
    }

    /// The broken-lineage reason, if this is a broken-lineage error.
    pub fn broken_reason(&self) -> Option<BrokenReason> {
        match self {
            LineageError::BrokenLineage { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, LineageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broken_reason_messages() {
        let err = LineageError::BrokenLineage {
            artifact: PathBuf::from("/backups/incr_1"),
            reason: BrokenReason::TooDeep,
        };
        assert_eq!(
            err.to_string(),
            "Broken lineage at /backups/incr_1: lineage too deep / possible cycle"
        );
        assert_eq!(err.broken_reason(), Some(BrokenReason::TooDeep));
    }

    #[test]
    fn test_external_tool_without_exit_code() {
        let err = LineageError::ExternalTool {
            command: "xtrabackup --backup".to_string(),
            exit_code: None,
            output: "killed".to_string(),
        };
        assert!(err.to_string().contains("exit code none"));
        assert_eq!(err.broken_reason(), None);
    }
}

//! JSON-friendly summary of an artifact's lineage.

use crate::artifact::{ArtifactId, ArtifactKind};
use crate::lineage::validate_lineage;
use crate::storage::footprint::{measure, Footprint};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize)]
pub struct LinkReport {
    pub id: ArtifactId,
    pub kind: ArtifactKind,
    pub checkpoint: u64,
    pub directory: PathBuf,
    pub modified: Option<String>,
    pub footprint: Option<Footprint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LineageReport {
    pub artifact: PathBuf,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub links: Vec<LinkReport>,
}

/// Validate the lineage ending at `artifact_dir` and describe it.
pub fn inspect(artifact_dir: &Path, max_depth: usize) -> LineageReport {
    match validate_lineage(artifact_dir, max_depth) {
        Ok(lineage) => LineageReport {
            artifact: artifact_dir.to_path_buf(),
            valid: true,
            error: None,
            links: lineage
                .links()
                .iter()
                .map(|link| LinkReport {
                    id: link.id.clone(),
                    kind: link.kind,
                    checkpoint: link.checkpoint,
                    directory: link.directory.clone(),
                    modified: modified_rfc3339(&link.directory),
                    footprint: measure(&link.directory).ok(),
                })
                .collect(),
        },
        Err(e) => LineageReport {
            artifact: artifact_dir.to_path_buf(),
            valid: false,
            error: Some(e.to_string()),
            links: Vec::new(),
        },
    }
}

fn modified_rfc3339(dir: &Path) -> Option<String> {
    let modified = std::fs::metadata(dir).and_then(|m| m.modified()).ok()?;
    Some(chrono::DateTime::<chrono::Utc>::from(modified).to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lineage::checkpoint::{write_parent_ref, CHECKPOINTS_FILE};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_report_for_valid_chain() {
        let temp_dir = TempDir::new().unwrap();
        let full = temp_dir.path().join("full_a");
        let incr = temp_dir.path().join("incr_b");
        fs::create_dir(&full).unwrap();
        fs::create_dir(&incr).unwrap();
        fs::write(full.join(CHECKPOINTS_FILE), "backup_type = full-backuped\nto_lsn = 10\n").unwrap();
        fs::write(incr.join(CHECKPOINTS_FILE), "backup_type = incremental\nto_lsn = 20\n").unwrap();
        write_parent_ref(&incr, &full).unwrap();

        let report = inspect(&incr, 16);
        assert!(report.valid);
        assert_eq!(report.links.len(), 2);
        assert_eq!(report.links[0].kind, ArtifactKind::Full);
        assert_eq!(report.links[1].checkpoint, 20);
        assert!(report.links[0].modified.is_some());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["links"][1]["kind"], "incremental");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_report_for_broken_chain() {
        let temp_dir = TempDir::new().unwrap();
        let incr = temp_dir.path().join("incr_b");
        fs::create_dir(&incr).unwrap();
        fs::write(incr.join(CHECKPOINTS_FILE), "backup_type = incremental\nto_lsn = 20\n").unwrap();

        let report = inspect(&incr, 16);
        assert!(!report.valid);
        assert!(report.links.is_empty());
        assert!(report.error.unwrap().contains("missing parent reference"));
    }
}

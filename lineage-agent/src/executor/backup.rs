//! Backup executor - produces full and incremental artifacts.
//!
//! In incremental mode the latest artifact is chained onto only when its
//! whole lineage back to a full backup is intact; otherwise a fresh full
//! backup is taken. A failed backup never leaves its directory behind.

use crate::artifact::{ArtifactId, ArtifactKind, BackupArtifact};
use crate::config::Config;
use crate::executor::handle::write_handle;
use crate::lineage::checkpoint::{load_artifact, write_parent_ref, CHECKPOINTS_FILE};
use crate::lineage::validate_lineage;
use crate::retention;
use crate::storage::footprint::{format_bytes, measure};
use crate::storage::{ensure_root, latest_artifact, StorageLock};
use crate::tool::{invoke, CommandRunner, Xtrabackup};
use crate::utils::errors::{LineageError, Result};
use std::io::ErrorKind;
use std::path::Path;
use tracing::{error, info, warn};

/// Requested backup type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupMode {
    Full,
    IncrementalIfPossible,
}

/// Main backup executor
pub struct BackupExecutor<R> {
    config: Config,
    tool: Xtrabackup,
    runner: R,
}

impl<R: CommandRunner> BackupExecutor<R> {
    pub fn new(config: &Config, runner: R) -> Self {
        Self {
            config: config.clone(),
            tool: Xtrabackup::new(&config.tool, &config.mysql),
            runner,
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Take a backup and, when `handle` is given, record where it went.
    pub async fn create_backup(&self, mode: BackupMode, handle: Option<&Path>) -> Result<BackupArtifact> {
        let start_time = std::time::Instant::now();

        let root = ensure_root(&self.config.storage.root)?;
        let _lock = if self.config.storage.lock {
            Some(StorageLock::acquire(&root)?)
        } else {
            None
        };

        let parent = match mode {
            BackupMode::Full => None,
            BackupMode::IncrementalIfPossible => self.choose_parent(&root)?,
        };
        let kind = if parent.is_some() {
            ArtifactKind::Incremental
        } else {
            ArtifactKind::Full
        };

        let id = ArtifactId::generate(kind);
        let dir = root.join(id.as_str());
        info!("Starting {} backup {} in {}", kind, id, dir.display());

        tokio::fs::create_dir(&dir)
            .await
            .map_err(|e| LineageError::storage(&dir, e))?;

        let artifact = match self.populate(&id, &dir, kind, parent.as_ref(), handle).await {
            Ok(artifact) => artifact,
            Err(e) => {
                error!("Backup {} failed: {}", id, e);
                discard(&dir).await;
                return Err(e);
            }
        };

        match measure(&dir) {
            Ok(footprint) => info!(
                "Backup {} completed: {} files, {}, checkpoint {}, {:.1}s",
                id,
                footprint.files,
                format_bytes(footprint.bytes),
                artifact.checkpoint,
                start_time.elapsed().as_secs_f64()
            ),
            Err(e) => warn!("Backup {} completed, but its size is unknown: {}", id, e),
        }

        if self.config.retention.keep_full > 0 {
            if let Err(e) = retention::prune(
                &root,
                self.config.retention.keep_full,
                self.config.storage.max_lineage_depth,
                Some(dir.as_path()),
                false,
            ) {
                warn!("Retention pass failed: {}", e);
            }
        }

        Ok(artifact)
    }

    /// The artifact to chain onto, or `None` to take a full backup.
    fn choose_parent(&self, root: &Path) -> Result<Option<BackupArtifact>> {
        let latest = match latest_artifact(root)? {
            Some(latest) => latest,
            None => {
                info!("No previous backup in {}, taking a full backup", root.display());
                return Ok(None);
            }
        };

        match validate_lineage(&latest.directory, self.config.storage.max_lineage_depth) {
            Ok(lineage) => {
                info!(
                    "Chaining onto {} ({} links, checkpoint {})",
                    lineage.tip().id,
                    lineage.len(),
                    lineage.tip().checkpoint
                );
                Ok(Some(lineage.tip().clone()))
            }
            Err(e @ LineageError::BrokenLineage { .. }) => {
                warn!("{}; falling back to a full backup", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn populate(
        &self,
        id: &ArtifactId,
        dir: &Path,
        kind: ArtifactKind,
        parent: Option<&BackupArtifact>,
        handle: Option<&Path>,
    ) -> Result<BackupArtifact> {
        let command = match parent {
            Some(parent) => self.tool.incremental_backup(id, dir, parent.checkpoint),
            None => self.tool.full_backup(id, dir),
        };
        invoke(&self.runner, &command).await?;

        if let Some(parent) = parent {
            write_parent_ref(dir, &parent.directory)?;
        }

        let artifact = load_artifact(dir)?;
        if artifact.kind != kind {
            return Err(LineageError::MetadataCorrupt {
                path: dir.join(CHECKPOINTS_FILE),
                detail: format!("expected a {} backup, tool recorded {}", kind, artifact.kind),
            });
        }

        if let Some(handle) = handle {
            write_handle(handle, dir).await?;
        }

        Ok(artifact)
    }
}

/// Remove a partially written artifact.
async fn discard(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => info!("Removed partial backup {}", dir.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => error!("Failed to remove partial backup {}: {}", dir.display(), e),
    }
}

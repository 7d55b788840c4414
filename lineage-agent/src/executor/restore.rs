//! Restore executor - replays a validated lineage into a staging directory.
//!
//! Order is fixed: copy the full backup, apply its log, layer each
//! incremental oldest first, then finalize. Any failure aborts the restore
//! and the staging directory is left as-is for inspection.

use crate::config::Config;
use crate::executor::handle::read_handle;
use crate::lineage::{validate_lineage, Lineage};
use crate::storage::{existing_root, latest_artifact, StorageLock};
use crate::tool::{invoke, CommandRunner, ToolCommand, Xtrabackup};
use crate::utils::errors::{LineageError, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// A staging directory holding a restorable snapshot.
#[derive(Debug, Clone)]
pub struct RestoreTarget {
    pub staging_directory: PathBuf,
    pub lineage: Lineage,
}

pub struct RestoreExecutor<R> {
    config: Config,
    tool: Xtrabackup,
    runner: R,
}

impl<R: CommandRunner> RestoreExecutor<R> {
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

    /// Restore the artifact named by `handle` (or the latest one) into `staging_dir`.
    pub async fn restore(&self, staging_dir: &Path, handle: Option<&Path>) -> Result<RestoreTarget> {
        let start_time = std::time::Instant::now();

        let root = existing_root(&self.config.storage.root)?;
        let _lock = if self.config.storage.lock {
            Some(StorageLock::acquire(&root)?)
        } else {
            None
        };

        let target = match handle {
            Some(handle) => read_handle(handle).await?,
            None => latest_artifact(&root)?
                .map(|latest| latest.directory)
                .ok_or_else(|| LineageError::NothingToRestore {
                    storage_root: root.clone(),
                })?,
        };

        let lineage = match validate_lineage(&target, self.config.storage.max_lineage_depth) {
            Ok(lineage) => lineage,
            Err(e) => {
                error!("Cannot restore {}: {}", target.display(), e);
                return Err(e);
            }
        };
        info!(
            "Restoring {} from {} ({} incrementals) into {}",
            lineage.tip().id,
            lineage.root().id,
            lineage.incrementals().len(),
            staging_dir.display()
        );

        prepare_staging(staging_dir).await?;

        for command in self.plan(&lineage, staging_dir) {
            if let Err(e) = invoke(&self.runner, &command).await {
                error!(
                    "Restore aborted at '{}'; staging directory {} left for inspection",
                    command.step,
                    staging_dir.display()
                );
                return Err(e);
            }
        }

        info!(
            "Restore prepared in {} ({:.1}s)",
            staging_dir.display(),
            start_time.elapsed().as_secs_f64()
        );

        Ok(RestoreTarget {
            staging_directory: staging_dir.to_path_buf(),
            lineage,
        })
    }

    /// Every tool invocation of a restore, in execution order.
    fn plan(&self, lineage: &Lineage, staging_dir: &Path) -> Vec<ToolCommand> {
        let full = lineage.root();
        let mut commands = vec![
            self.tool.copy(&full.id, &full.directory, staging_dir),
            self.tool.apply_log(&full.id, staging_dir),
        ];
        for incremental in lineage.incrementals() {
            commands.push(self.tool.apply_incremental(
                &incremental.id,
                staging_dir,
                &incremental.directory,
            ));
        }
        commands.push(self.tool.finalize(staging_dir));
        commands
    }
}

/// Create the staging directory; an existing one must be empty.
async fn prepare_staging(staging_dir: &Path) -> Result<()> {
    match tokio::fs::read_dir(staging_dir).await {
        Ok(mut entries) => {
            let first = entries
                .next_entry()
                .await
                .map_err(|e| LineageError::storage(staging_dir, e))?;
            if first.is_some() {
                return Err(LineageError::storage(staging_dir, "staging directory is not empty"));
            }
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => tokio::fs::create_dir_all(staging_dir)
            .await
            .map_err(|e| LineageError::storage(staging_dir, e)),
        Err(e) => Err(LineageError::storage(staging_dir, e)),
    }
}

//! Command lines for the physical backup tool.

use crate::artifact::ArtifactId;
use crate::config::{MysqlConfig, ToolConfig};
use crate::tool::runner::{ToolCommand, ToolStep};
use std::path::Path;

/// Builds backup, copy and prepare invocations from configuration.
#[derive(Debug, Clone)]
pub struct Xtrabackup {
    tool: ToolConfig,
    mysql: MysqlConfig,
}

impl Xtrabackup {
    pub fn new(tool: &ToolConfig, mysql: &MysqlConfig) -> Self {
        Self {
            tool: tool.clone(),
            mysql: mysql.clone(),
        }
    }

    /// Full backup into `target`.
    pub fn full_backup(&self, id: &ArtifactId, target: &Path) -> ToolCommand {
        self.backup(id, target, None)
    }

    /// Incremental backup into `target` of changes after `from_lsn`.
    pub fn incremental_backup(&self, id: &ArtifactId, target: &Path, from_lsn: u64) -> ToolCommand {
        self.backup(id, target, Some(from_lsn))
    }

    fn backup(&self, id: &ArtifactId, target: &Path, from_lsn: Option<u64>) -> ToolCommand {
        let mut args = Vec::new();

        // --defaults-file must come first.
        if let Some(defaults_file) = &self.mysql.defaults_file {
            args.push(format!("--defaults-file={}", defaults_file.display()));
        }
        args.push("--backup".to_string());
        args.push(format!("--target-dir={}", target.display()));
        if let Some(lsn) = from_lsn {
            args.push(format!("--incremental-lsn={}", lsn));
        }

        args.push(format!("--host={}", self.mysql.host));
        args.push(format!("--port={}", self.mysql.port));
        args.push(format!("--user={}", self.mysql.user));
        if let Some(password) = &self.mysql.password {
            args.push(format!("--password={}", password));
        }
        if let Some(socket) = &self.mysql.socket {
            args.push(format!("--socket={}", socket.display()));
        }
        args.extend(self.tool.extra_args.iter().cloned());

        ToolCommand {
            step: ToolStep::Backup { id: id.to_string() },
            program: self.tool.xtrabackup.clone(),
            args,
        }
    }

    /// Copy the contents of a full backup into the staging directory.
    pub fn copy(&self, id: &ArtifactId, source: &Path, staging: &Path) -> ToolCommand {
        ToolCommand {
            step: ToolStep::Copy { id: id.to_string() },
            program: self.tool.copy.clone(),
            args: vec![
                "-a".to_string(),
                format!("{}/.", source.display()),
                staging.display().to_string(),
            ],
        }
    }

    /// Roll the staged full backup forward without the rollback phase.
    pub fn apply_log(&self, id: &ArtifactId, staging: &Path) -> ToolCommand {
        ToolCommand {
            step: ToolStep::ApplyLog { id: id.to_string() },
            program: self.tool.xtrabackup.clone(),
            args: vec![
                "--prepare".to_string(),
                "--apply-log-only".to_string(),
                format!("--target-dir={}", staging.display()),
            ],
        }
    }

    /// Layer one incremental onto the staging directory.
    pub fn apply_incremental(&self, id: &ArtifactId, staging: &Path, incremental: &Path) -> ToolCommand {
        ToolCommand {
            step: ToolStep::ApplyIncremental { id: id.to_string() },
            program: self.tool.xtrabackup.clone(),
            args: vec![
                "--prepare".to_string(),
                "--apply-log-only".to_string(),
                format!("--target-dir={}", staging.display()),
                format!("--incremental-dir={}", incremental.display()),
            ],
        }
    }

    /// Final prepare, making the staging directory startable.
    pub fn finalize(&self, staging: &Path) -> ToolCommand {
        ToolCommand {
            step: ToolStep::Finalize,
            program: self.tool.xtrabackup.clone(),
            args: vec![
                "--prepare".to_string(),
                format!("--target-dir={}", staging.display()),
            ],
        }
    }
}

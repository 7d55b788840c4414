//! Recording stand-in for the backup tool.

use crate::lineage::checkpoint::CHECKPOINTS_FILE;
use crate::tool::runner::{CommandRunner, ToolCommand, ToolOutput, ToolStep};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Records every command and simulates the on-disk effect of backups.
///
/// A backup writes a data file and an `xtrabackup_checkpoints` record into
/// `--target-dir`; every other step is only recorded.
#[derive(Debug, Default)]
pub(crate) struct FakeTool {
    calls: Mutex<Vec<ToolCommand>>,
    fail_on: Option<String>,
    skip_metadata: bool,
    next_lsn: AtomicU64,
}

impl FakeTool {
    pub(crate) fn new() -> Self {
        Self {
            next_lsn: AtomicU64::new(1000),
            ..Default::default()
        }
    }

    /// Exit non-zero on the first step whose label starts with `label`.
    pub(crate) fn failing_on(mut self, label: &str) -> Self {
        self.fail_on = Some(label.to_string());
        self
    }

    /// Run backups without leaving a checkpoints record behind.
    pub(crate) fn without_metadata(mut self) -> Self {
        self.skip_metadata = true;
        self
    }

    pub(crate) fn calls(&self) -> Vec<ToolCommand> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn labels(&self) -> Vec<String> {
        self.calls().iter().map(|c| c.step.to_string()).collect()
    }

    fn simulate_backup(&self, command: &ToolCommand, fail: bool) -> std::io::Result<()> {
        let target = PathBuf::from(command.flag("target-dir").unwrap_or_default());
        std::fs::create_dir_all(&target)?;
        std::fs::write(target.join("ibdata1"), b"pages")?;
        if fail || self.skip_metadata {
            return Ok(());
        }

        let from_lsn = command
            .flag("incremental-lsn")
            .and_then(|v| v.parse::<u64>().ok());
        let to_lsn = self.next_lsn.fetch_add(100, Ordering::SeqCst) + 100;
        let body = match from_lsn {
            Some(from) => format!(
                "backup_type = incremental\nfrom_lsn = {}\nto_lsn = {}\nlast_lsn = {}\n",
                from, to_lsn, to_lsn
            ),
            None => format!(
                "backup_type = full-backuped\nfrom_lsn = 0\nto_lsn = {}\nlast_lsn = {}\n",
                to_lsn, to_lsn
            ),
        };
        std::fs::write(target.join(CHECKPOINTS_FILE), body)
    }
}

impl CommandRunner for FakeTool {
    async fn run(&self, command: &ToolCommand) -> std::io::Result<ToolOutput> {
        self.calls.lock().unwrap().push(command.clone());

        let label = command.step.to_string();
        let fail = self
            .fail_on
            .as_deref()
            .map(|prefix| label.starts_with(prefix))
            .unwrap_or(false);

        if let ToolStep::Backup { .. } = command.step {
            self.simulate_backup(command, fail)?;
        }

        if fail {
            return Ok(ToolOutput {
                exit_code: Some(1),
                stdout: String::new(),
                stderr: format!("simulated failure in {}", label),
            });
        }

        Ok(ToolOutput {
            exit_code: Some(0),
            stdout: format!("{} completed OK!", label),
            stderr: String::new(),
        })
    }
}

//! External command execution.
//!
//! Every external tool call goes through [`CommandRunner`], so executors can
//! be driven by a fake in tests. [`invoke`] adds the logging and exit-status
//! handling shared by all callers.

use crate::utils::errors::{LineageError, Result};
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use tracing::{error, info};

/// What an invocation does, independent of the command line used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolStep {
    Backup { id: String },
    Copy { id: String },
    ApplyLog { id: String },
    ApplyIncremental { id: String },
    Finalize,
}

impl fmt::Display for ToolStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolStep::Backup { id } => write!(f, "backup {}", id),
            ToolStep::Copy { id } => write!(f, "copy {}", id),
            ToolStep::ApplyLog { id } => write!(f, "apply-log {}", id),
            ToolStep::ApplyIncremental { id } => write!(f, "apply-incremental {}", id),
            ToolStep::Finalize => f.write_str("finalize"),
        }
    }
}

/// A single external command.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    pub step: ToolStep,
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl ToolCommand {
    /// Command line with credentials masked, for logs and errors.
    pub fn display_masked(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            if arg.starts_with("--password=") {
                line.push_str("--password=****");
            } else {
                line.push_str(arg);
            }
        }
        line
    }

    /// Value of a `--name=value` argument.
    pub fn flag(&self, name: &str) -> Option<&str> {
        let prefix = format!("--{}=", name);
        self.args
            .iter()
            .find_map(|arg| arg.strip_prefix(prefix.as_str()))
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout and stderr combined, trimmed.
    pub fn combined(&self) -> String {
        let mut out = self.stdout.trim().to_string();
        let err = self.stderr.trim();
        if !err.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(err);
        }
        out
    }
}

/// Runs external commands to completion.
pub trait CommandRunner {
    fn run(&self, command: &ToolCommand) -> impl Future<Output = std::io::Result<ToolOutput>> + Send;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &ToolCommand) -> std::io::Result<ToolOutput> {
        let output = tokio::process::Command::new(&command.program)
            .args(&command.args)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(ToolOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Run `command` and wait for it, turning a non-zero exit into an error.
pub async fn invoke<R: CommandRunner>(runner: &R, command: &ToolCommand) -> Result<ToolOutput> {
    let line = command.display_masked();
    info!("[{}] Running: {}", command.step, line);

    let output = match runner.run(command).await {
        Ok(output) => output,
        Err(e) => {
            error!("[{}] Failed to launch {}: {}", command.step, line, e);
            return Err(LineageError::ToolLaunch {
                program: command.program.display().to_string(),
                source: e,
            });
        }
    };

    if !output.success() {
        let combined = output.combined();
        error!(
            "[{}] Command failed with exit code {:?}: {}\n{}",
            command.step, output.exit_code, line, combined
        );
        return Err(LineageError::ExternalTool {
            command: line,
            exit_code: output.exit_code,
            output: combined,
        });
    }

    Ok(output)
}

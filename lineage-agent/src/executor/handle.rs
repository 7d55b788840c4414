//! Result handle file.
//!
//! The orchestration layer expects a single properties file telling it where
//! the backup went: `file=<artifact directory>`. Restore reads it back.

use crate::utils::errors::{LineageError, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const FILE_KEY: &str = "file";

/// Write `file=<artifact_dir>` to `handle`, replacing it atomically.
pub async fn write_handle(handle: &Path, artifact_dir: &Path) -> Result<()> {
    if let Some(parent) = handle.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| LineageError::storage(parent, e))?;
    }

    let mut tmp = handle.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let body = format!("{}={}\n", FILE_KEY, artifact_dir.display());
    tokio::fs::write(&tmp, body)
        .await
        .map_err(|e| LineageError::storage(&tmp, e))?;
    tokio::fs::rename(&tmp, handle)
        .await
        .map_err(|e| LineageError::storage(handle, e))?;

    tracing::info!("Wrote result handle {} -> {}", handle.display(), artifact_dir.display());
    Ok(())
}

/// Read the artifact directory recorded in `handle`.
pub async fn read_handle(handle: &Path) -> Result<PathBuf> {
    let content = match tokio::fs::read_to_string(handle).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(LineageError::InvalidHandle {
                path: handle.to_path_buf(),
                detail: "file does not exist".to_string(),
            });
        }
        Err(e) => return Err(LineageError::storage(handle, e)),
    };

    parse_handle(&content)
        .map(PathBuf::from)
        .ok_or_else(|| LineageError::InvalidHandle {
            path: handle.to_path_buf(),
            detail: format!("no '{}=' entry", FILE_KEY),
        })
}

fn parse_handle(content: &str) -> Option<&str> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .find(|(key, _)| key.trim() == FILE_KEY)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

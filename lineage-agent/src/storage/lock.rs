//! Exclusive lock on a storage root.
//!
//! Only one backup, restore or prune may run against a storage root at a
//! time. The lock is a `.lineage.lock` file holding the owner's PID. The PID
//! is written to a private file first and hard-linked into place, so the lock
//! never exists without its owner. A lock left behind by a dead process is
//! taken over.

use crate::utils::errors::{LineageError, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

pub const LOCK_FILE: &str = ".lineage.lock";

const ACQUIRE_ATTEMPTS: usize = 3;

/// Age after which a lock naming no PID is considered abandoned.
const UNIDENTIFIED_GRACE: Duration = Duration::from_secs(60);

/// Held lock; released on drop.
#[derive(Debug)]
pub struct StorageLock {
    path: PathBuf,
}

impl StorageLock {
    /// Take the lock for `storage_root`, which must already exist.
    pub fn acquire(storage_root: &Path) -> Result<Self> {
        let path = storage_root.join(LOCK_FILE);
        let pid = std::process::id();
        let staged = storage_root.join(format!("{}.{}", LOCK_FILE, pid));

        fs::write(&staged, format!("{}\n", pid)).map_err(|e| LineageError::storage(&staged, e))?;
        let result = Self::install(&staged, path);
        if let Err(e) = fs::remove_file(&staged) {
            warn!("Failed to remove {}: {}", staged.display(), e);
        }
        result
    }

    fn install(staged: &Path, path: PathBuf) -> Result<Self> {
        let mut holder = None;

        for _ in 0..ACQUIRE_ATTEMPTS {
            match fs::hard_link(staged, &path) {
                Ok(()) => {
                    debug!("Acquired storage lock {}", path.display());
                    return Ok(StorageLock { path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    let text = match fs::read_to_string(&path) {
                        Ok(text) => text,
                        Err(e) if e.kind() == ErrorKind::NotFound => continue,
                        Err(e) => return Err(LineageError::storage(&path, e)),
                    };

                    match text.trim().parse::<u32>() {
                        Ok(pid) if process_alive(pid) => {
                            return Err(LineageError::Locked {
                                path,
                                holder: Some(pid),
                            });
                        }
                        Ok(pid) => {
                            warn!("Removing stale storage lock {} (pid {})", path.display(), pid);
                            holder = Some(pid);
                        }
                        Err(_) if !abandoned(&path) => {
                            return Err(LineageError::Locked { path, holder: None });
                        }
                        Err(_) => {
                            warn!("Removing abandoned storage lock {} (no owner recorded)", path.display());
                        }
                    }

                    match fs::remove_file(&path) {
                        Ok(()) => continue,
                        Err(e) if e.kind() == ErrorKind::NotFound => continue,
                        Err(e) => return Err(LineageError::storage(&path, e)),
                    }
                }
                Err(e) => return Err(LineageError::storage(&path, e)),
            }
        }

        Err(LineageError::Locked { path, holder })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StorageLock {
    fn drop(&mut self) {
        // Only remove the file while it still names us.
        match fs::read_to_string(&self.path) {
            Ok(text) if text.trim() == std::process::id().to_string() => {
                if let Err(e) = fs::remove_file(&self.path) {
                    warn!("Failed to release storage lock {}: {}", self.path.display(), e);
                }
            }
            Ok(text) => warn!(
                "Storage lock {} now belongs to '{}', leaving it in place",
                self.path.display(),
                text.trim()
            ),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to read storage lock {}: {}", self.path.display(), e),
        }
    }
}

fn abandoned(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .map(|age| age >= UNIDENTIFIED_GRACE)
        .unwrap_or(false)
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

// Without procfs we cannot tell, so never steal a lock.
#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> bool {
    true
}

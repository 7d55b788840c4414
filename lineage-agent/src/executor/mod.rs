//! Backup and restore executors.
//!
//! Both run strictly sequentially: each external tool call is awaited to
//! completion before the next one starts.

pub mod backup;
pub mod handle;
pub mod restore;

pub use backup::{BackupExecutor, BackupMode};
pub use handle::{read_handle, write_handle};
pub use restore::{RestoreExecutor, RestoreTarget};

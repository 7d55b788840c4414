//! Lineage Agent Library
//!
//! Tracks chains of full and incremental physical MySQL backups, validates
//! them back to their full backup, and replays them into a staging directory
//! for restore.

pub mod artifact;
pub mod config;
pub mod executor;
pub mod lineage;
pub mod retention;
pub mod storage;
pub mod tool;
pub mod utils;

// Re-export commonly used types
pub use artifact::{ArtifactId, ArtifactKind, BackupArtifact};
pub use config::Config;
pub use executor::{BackupExecutor, BackupMode, RestoreExecutor, RestoreTarget};
pub use lineage::{validate_lineage, Lineage};
pub use utils::errors::{BrokenReason, LineageError};
pub type Result<T> = std::result::Result<T, LineageError>;

//! Backup lineage: checkpoint records and chain validation.

pub mod checkpoint;
pub mod report;
pub mod validator;

pub use checkpoint::{load_artifact, read_checkpoint, CheckpointRecord};
pub use report::{inspect, LineageReport};
pub use validator::{validate_lineage, Lineage, DEFAULT_MAX_DEPTH};

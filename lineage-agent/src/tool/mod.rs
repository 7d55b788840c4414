//! External tool invocation.

pub mod runner;
pub mod xtrabackup;

#[cfg(test)]
pub(crate) mod fake;

pub use runner::{invoke, CommandRunner, ProcessRunner, ToolCommand, ToolOutput, ToolStep};
pub use xtrabackup::Xtrabackup;

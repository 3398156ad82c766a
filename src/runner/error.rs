//! Errors reported by the command runner.

use thiserror::Error;

/// Rejections surfaced to the caller of [`CommandRunner`](super::CommandRunner).
///
/// Every variant maps to exactly one user-facing message. Stream read
/// failures are not represented here: a reader that errors simply stops
/// producing lines.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    /// The command line was empty after trimming.
    #[error("Please enter a command.")]
    EmptyCommand,

    /// A previous run on this runner has not settled yet.
    #[error("A command is already running. Stop it or wait for it to finish.")]
    AlreadyRunning,

    /// The OS refused to create the interpreter process.
    #[error("Failed to start command: {0}")]
    SpawnFailed(String),

    /// Kill or await was requested with nothing running.
    #[error("No command is currently running.")]
    NoActiveRun,
}

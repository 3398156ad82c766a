//! PS Commander - run shell commands and stream their output.
//!
//! This library provides the core functionality for PS Commander:
//! - [`runner`]: start one command at a time through a shell interpreter,
//!   stream its stdout/stderr lines to a sink, kill it, await its outcome
//! - [`presets`]: the predefined command table and help mode
//! - [`utils`]: logging setup
//!
//! # Example
//!
//! ```no_run
//! use ps_commander::runner::{ChannelSink, CommandRunner, SinkEvent};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runner = CommandRunner::default();
//!     let (sink, mut events) = ChannelSink::new();
//!
//!     let handle = runner.start("Get-Date", sink)?;
//!
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             SinkEvent::Line(line) => println!("{}", line),
//!             SinkEvent::Complete(outcome) => println!("({})", outcome),
//!         }
//!     }
//!
//!     let outcome = runner.wait(&handle).await?;
//!     std::process::exit(outcome.exit_code());
//! }
//! ```

pub mod presets;
pub mod runner;
pub mod utils;

// Re-export commonly used types
pub use presets::{Preset, PresetTable};
pub use runner::{
    CommandRunner, ExitOutcome, OutputLine, OutputSink, OutputStream, RunError, RunHandle, RunState,
    ShellConfig,
};

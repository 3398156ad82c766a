//! Values produced by a run: output lines and the terminal outcome.

use std::fmt;
use std::process::ExitStatus;

/// Prefix that makes stderr lines visually distinguishable.
pub const STDERR_PREFIX: &str = "ERROR: ";

/// Status line delivered once after a run is killed.
pub const STOP_NOTICE: &str = "Command execution stopped.";

/// Which stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputStream {
    Stdout,
    Stderr,
    /// Generated by the runner itself, never by the child.
    Notice,
}

/// A single line of output, without its trailing newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub text: String,
    pub stream: OutputStream,
}

impl OutputLine {
    pub fn new(stream: OutputStream, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            stream,
        }
    }

    /// Text as it should be shown to a user.
    pub fn display(&self) -> String {
        match self.stream {
            OutputStream::Stderr => format!("{}{}", STDERR_PREFIX, self.text),
            OutputStream::Stdout | OutputStream::Notice => self.text.clone(),
        }
    }
}

impl fmt::Display for OutputLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Exited(i32),
    Killed,
}

impl ExitOutcome {
    /// Map a natural exit status to an outcome.
    ///
    /// On Unix a child terminated by a signal has no exit code; it is
    /// reported the way shells do, as `128 + signal`.
    pub fn from_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return ExitOutcome::Exited(code);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ExitOutcome::Exited(128 + signal);
            }
        }

        ExitOutcome::Exited(-1)
    }

    /// Exit code a front end should mirror.
    pub fn exit_code(&self) -> i32 {
        match self {
            ExitOutcome::Exited(code) => *code,
            // 128 + SIGINT, what a shell reports for an interrupted job
            ExitOutcome::Killed => 130,
        }
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitOutcome::Exited(code) => write!(f, "exited with code {}", code),
            ExitOutcome::Killed => f.write_str("killed"),
        }
    }
}

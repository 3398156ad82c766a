//! Output sinks: where a run's lines and completion notice go.
//!
//! The runner never calls a sink from more than one task. Both line readers
//! and the coordinator push [`SinkEvent`]s into a single unbounded queue and
//! one dispatcher task drains it into the sink, so sinks only need to be
//! `Send`.

use std::io::Write;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::debug;

use super::output::{ExitOutcome, OutputLine, OutputStream};

/// Consumer of streamed output.
pub trait OutputSink: Send + 'static {
    /// Called once per line, in per-stream write order.
    fn on_line(&mut self, line: OutputLine);

    /// Called exactly once, after the last line of the run.
    fn on_complete(&mut self, outcome: &ExitOutcome);
}

/// Everything a sink can observe, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Line(OutputLine),
    Complete(ExitOutcome),
}

/// Forwards sink events into a tokio channel.
///
/// Lets a UI loop receive output alongside its other event sources with
/// `tokio::select!`.
pub struct ChannelSink {
    tx: UnboundedSender<SinkEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver that observes it.
    pub fn new() -> (Self, UnboundedReceiver<SinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl OutputSink for ChannelSink {
    fn on_line(&mut self, line: OutputLine) {
        // Receiver might be dropped; output is then discarded
        self.tx.send(SinkEvent::Line(line)).ok();
    }

    fn on_complete(&mut self, outcome: &ExitOutcome) {
        self.tx.send(SinkEvent::Complete(*outcome)).ok();
    }
}

/// Writes lines to the console: child stdout to stdout, child stderr (with
/// its display prefix) and runner notices to stderr.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn on_line(&mut self, line: OutputLine) {
        let written = match line.stream {
            OutputStream::Stdout => {
                let mut out = std::io::stdout().lock();
                writeln!(out, "{}", line.display()).and_then(|_| out.flush())
            }
            OutputStream::Stderr | OutputStream::Notice => {
                writeln!(std::io::stderr().lock(), "{}", line.display())
            }
        };
        if let Err(e) = written {
            debug!(error = %e, "Console write failed");
        }
    }

    fn on_complete(&mut self, outcome: &ExitOutcome) {
        debug!(%outcome, "Run complete");
    }
}

/// Spawn the task that owns `sink` and feeds it from the returned queue.
///
/// The task ends after delivering `Complete` or when every sender is gone.
pub(crate) fn spawn_dispatcher<S: OutputSink>(
    mut sink: S,
) -> (UnboundedSender<SinkEvent>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<SinkEvent>();
    let task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                SinkEvent::Line(line) => sink.on_line(line),
                SinkEvent::Complete(outcome) => {
                    sink.on_complete(&outcome);
                    break;
                }
            }
        }
    });
    (tx, task)
}

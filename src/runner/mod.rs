//! Command execution and output streaming.
//!
//! [`CommandRunner`] owns at most one child process at a time. A run is
//! driven by four tasks:
//!
//! - two line readers, one per redirected stream, pushing lines into the
//!   run's event queue
//! - a dispatcher that drains the queue into the caller's [`OutputSink`]
//! - a coordinator that waits for process exit or a kill request, joins
//!   both readers, delivers the completion notice and publishes the outcome
//!
//! The process slot is shared between the runner and the coordinator behind
//! a mutex, so `kill` can reach a run from any task.

mod error;
mod output;
mod shell;
mod sink;

#[cfg(test)]
mod scenarios;

use std::fmt;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub use error::RunError;
pub use output::{ExitOutcome, OutputLine, OutputStream, STDERR_PREFIX, STOP_NOTICE};
pub use shell::{SHELL_ENV_VAR, ShellConfig};
pub use sink::{ChannelSink, ConsoleSink, OutputSink, SinkEvent};

use sink::spawn_dispatcher;

/// Identifies one run of a [`CommandRunner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId(u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

/// Observable lifecycle of a runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running(RunId),
    Completed(i32),
    Killed,
    Failed(RunError),
}

/// Bookkeeping for the run that currently owns the process slot.
struct ActiveRun {
    id: RunId,
    /// Taken by the first kill request.
    kill_tx: Option<oneshot::Sender<()>>,
    /// Set once the coordinator has observed process exit.
    exited: bool,
}

struct Slot {
    active: Option<ActiveRun>,
    last: RunState,
}

type SharedSlot = Arc<Mutex<Slot>>;

fn lock(slot: &SharedSlot) -> MutexGuard<'_, Slot> {
    // Slot data stays consistent even if a holder panicked
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to one in-flight run.
///
/// Cheap to clone; every clone observes the same completion.
#[derive(Debug, Clone)]
pub struct RunHandle {
    id: RunId,
    done: watch::Receiver<Option<ExitOutcome>>,
}

impl RunHandle {
    pub fn id(&self) -> RunId {
        self.id
    }

    /// Outcome of the run if it has already settled.
    pub fn outcome(&self) -> Option<ExitOutcome> {
        *self.done.borrow()
    }

    /// Wait for the process to exit, both readers to drain and the sink to
    /// receive its completion notice.
    pub async fn wait(&self) -> Result<ExitOutcome, RunError> {
        let mut done = self.done.clone();
        match done.wait_for(Option::is_some).await.map(|outcome| *outcome) {
            Ok(Some(outcome)) => Ok(outcome),
            // Coordinator vanished without publishing (runtime shut down)
            _ => Err(RunError::NoActiveRun),
        }
    }
}

/// Runs shell command lines one at a time, streaming their output.
pub struct CommandRunner {
    shell: ShellConfig,
    slot: SharedSlot,
    next_id: AtomicU64,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new(ShellConfig::from_env())
    }
}

impl CommandRunner {
    pub fn new(shell: ShellConfig) -> Self {
        Self {
            shell,
            slot: Arc::new(Mutex::new(Slot {
                active: None,
                last: RunState::Idle,
            })),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn shell(&self) -> &ShellConfig {
        &self.shell
    }

    pub fn state(&self) -> RunState {
        let slot = lock(&self.slot);
        match &slot.active {
            Some(run) => RunState::Running(run.id),
            None => slot.last.clone(),
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.slot).active.is_some()
    }

    /// Start `command_line` through the configured shell.
    ///
    /// Returns as soon as the process is spawned. Lines and the completion
    /// notice are delivered to `sink` from a background task. Must be called
    /// from within a tokio runtime.
    ///
    /// # Errors
    /// - [`RunError::EmptyCommand`] if the trimmed line is empty
    /// - [`RunError::AlreadyRunning`] if the previous run has not settled
    /// - [`RunError::SpawnFailed`] if the interpreter could not be started
    pub fn start<S: OutputSink>(&self, command_line: &str, sink: S) -> Result<RunHandle, RunError> {
        let command_line = command_line.trim();
        if command_line.is_empty() {
            warn!("Rejected empty command");
            return Err(RunError::EmptyCommand);
        }

        let mut slot = lock(&self.slot);
        if let Some(run) = &slot.active {
            warn!(active = %run.id, "Rejected start while a run is active");
            return Err(RunError::AlreadyRunning);
        }

        let id = RunId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        info!(run = %id, shell = %self.shell.program, command = %command_line, "Starting command");

        let mut child = match self.shell.command(command_line).spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(run = %id, error = %e, "Failed to spawn command");
                let err = RunError::SpawnFailed(e.to_string());
                slot.last = RunState::Failed(err.clone());
                return Err(err);
            }
        };

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => {
                // Dropping the child kills it
                error!(run = %id, "Child output streams were not captured");
                let err = RunError::SpawnFailed("output streams were not captured".to_string());
                slot.last = RunState::Failed(err.clone());
                return Err(err);
            }
        };

        let (kill_tx, kill_rx) = oneshot::channel();
        let (done_tx, done_rx) = watch::channel(None);
        slot.active = Some(ActiveRun {
            id,
            kill_tx: Some(kill_tx),
            exited: false,
        });
        drop(slot);

        let (events, dispatcher) = spawn_dispatcher(sink);
        let stdout_reader = tokio::spawn(read_lines(
            BufReader::new(stdout),
            OutputStream::Stdout,
            events.clone(),
        ));
        let stderr_reader = tokio::spawn(read_lines(
            BufReader::new(stderr),
            OutputStream::Stderr,
            events.clone(),
        ));

        tokio::spawn(supervise(Supervision {
            id,
            child,
            kill_rx,
            readers: [stdout_reader, stderr_reader],
            events,
            dispatcher,
            slot: self.slot.clone(),
            done_tx,
        }));

        Ok(RunHandle { id, done: done_rx })
    }

    /// Forcibly terminate the run behind `handle`.
    ///
    /// A handle whose process has already exited, or that belongs to an
    /// earlier run, is a no-op. Repeated kills are no-ops.
    ///
    /// # Errors
    /// [`RunError::NoActiveRun`] if nothing is running.
    pub fn kill(&self, handle: &RunHandle) -> Result<(), RunError> {
        let mut slot = lock(&self.slot);
        let Some(run) = slot.active.as_mut() else {
            debug!(run = %handle.id, "Kill requested with no active run");
            return Err(RunError::NoActiveRun);
        };

        if run.id != handle.id || run.exited {
            debug!(run = %handle.id, active = %run.id, "Kill ignored, process already exited");
            return Ok(());
        }

        match run.kill_tx.take() {
            Some(tx) => {
                info!(run = %run.id, "Kill requested");
                if tx.send(()).is_err() {
                    debug!(run = %run.id, "Coordinator already settled");
                }
            }
            None => debug!(run = %run.id, "Kill already requested"),
        }
        Ok(())
    }

    /// Wait for the run behind `handle` to settle.
    pub async fn wait(&self, handle: &RunHandle) -> Result<ExitOutcome, RunError> {
        handle.wait().await
    }
}

/// Everything the coordinator task owns.
struct Supervision {
    id: RunId,
    child: Child,
    kill_rx: oneshot::Receiver<()>,
    readers: [JoinHandle<usize>; 2],
    events: UnboundedSender<SinkEvent>,
    dispatcher: JoinHandle<()>,
    slot: SharedSlot,
    done_tx: watch::Sender<Option<ExitOutcome>>,
}

async fn supervise(run: Supervision) {
    let Supervision {
        id,
        mut child,
        kill_rx,
        readers: [stdout_reader, stderr_reader],
        events,
        dispatcher,
        slot,
        done_tx,
    } = run;

    let outcome = tokio::select! {
        status = child.wait() => {
            mark_exited(&slot, id);
            match status {
                Ok(status) => ExitOutcome::from_status(status),
                Err(e) => {
                    warn!(run = %id, error = %e, "Failed to collect exit status");
                    ExitOutcome::Exited(-1)
                }
            }
        }
        Ok(()) = kill_rx => {
            match try_start_kill(&mut child) {
                KillAttempt::Signalled => {
                    mark_exited(&slot, id);
                    events
                        .send(SinkEvent::Line(OutputLine::new(OutputStream::Notice, STOP_NOTICE)))
                        .ok();
                    // Whatever is still buffered in the pipes is dropped
                    stdout_reader.abort();
                    stderr_reader.abort();
                    if let Err(e) = child.wait().await {
                        warn!(run = %id, error = %e, "Failed to reap killed process");
                    }
                    ExitOutcome::Killed
                }
                KillAttempt::AlreadyExited(status) => {
                    // Exited before the kill landed; report it as a natural exit
                    debug!(run = %id, "Kill ignored, process had already exited");
                    mark_exited(&slot, id);
                    ExitOutcome::from_status(status)
                }
                KillAttempt::Failed(e) => {
                    debug!(run = %id, error = %e, "Kill found the process already exiting");
                    let status = child.wait().await;
                    mark_exited(&slot, id);
                    status.map(ExitOutcome::from_status).unwrap_or(ExitOutcome::Exited(-1))
                }
            }
        }
    };

    // Barrier: both readers must be finished (or cancelled) before completion
    let (stdout_lines, stderr_lines) = tokio::join!(stdout_reader, stderr_reader);
    info!(
        run = %id,
        %outcome,
        stdout_lines = stdout_lines.unwrap_or_default(),
        stderr_lines = stderr_lines.unwrap_or_default(),
        "Command finished"
    );

    events.send(SinkEvent::Complete(outcome)).ok();
    drop(events);
    if let Err(e) = dispatcher.await {
        error!(run = %id, error = %e, "Sink dispatcher failed");
    }

    {
        let mut slot = lock(&slot);
        if slot.active.as_ref().is_some_and(|run| run.id == id) {
            slot.active = None;
        }
        slot.last = match outcome {
            ExitOutcome::Exited(code) => RunState::Completed(code),
            ExitOutcome::Killed => RunState::Killed,
        };
    }

    // No receivers left is fine; nobody is waiting
    done_tx.send(Some(outcome)).ok();
}

enum KillAttempt {
    Signalled,
    AlreadyExited(ExitStatus),
    Failed(std::io::Error),
}

/// Send the kill signal unless the child has already exited.
///
/// An exited but unreaped child would still accept the signal, so its
/// status is collected first.
fn try_start_kill(child: &mut Child) -> KillAttempt {
    match child.try_wait() {
        Ok(Some(status)) => return KillAttempt::AlreadyExited(status),
        Ok(None) => {}
        Err(e) => debug!(error = %e, "Could not poll process status before kill"),
    }
    match child.start_kill() {
        Ok(()) => KillAttempt::Signalled,
        Err(e) => KillAttempt::Failed(e),
    }
}

fn mark_exited(slot: &SharedSlot, id: RunId) {
    if let Some(run) = lock(slot).active.as_mut().filter(|run| run.id == id) {
        run.exited = true;
    }
}

/// Drain `reader` line by line into `events`.
///
/// Read errors end the stream like EOF. Returns the number of lines read.
async fn read_lines<R>(mut reader: R, stream: OutputStream, events: UnboundedSender<SinkEvent>) -> usize
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut count = 0usize;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                debug!(?stream, lines = count, "Stream closed (EOF)");
                break;
            }
            Ok(_) => {
                count += 1;
                let line = String::from_utf8_lossy(trim_line_ending(&buf)).into_owned();
                if events.send(SinkEvent::Line(OutputLine::new(stream, line))).is_err() {
                    // Dispatcher is gone, nothing left to deliver to
                    break;
                }
            }
            Err(e) => {
                warn!(?stream, error = %e, "Error reading output, treating as end of stream");
                break;
            }
        }
    }

    count
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

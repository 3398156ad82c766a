//! End-to-end runs against a real `/bin/sh`.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

use super::*;

const BUDGET: Duration = Duration::from_secs(10);

fn drain(rx: &mut UnboundedReceiver<SinkEvent>) -> Vec<SinkEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn lines_of(events: &[SinkEvent], stream: OutputStream) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            SinkEvent::Line(line) if line.stream == stream => Some(line.text.clone()),
            _ => None,
        })
        .collect()
}

async fn settle(runner: &CommandRunner, handle: &RunHandle) -> ExitOutcome {
    timeout(BUDGET, runner.wait(handle))
        .await
        .expect("run did not settle in time")
        .expect("wait failed")
}

#[test]
fn test_empty_command_is_rejected_without_runtime() {
    // No runtime: proves nothing is spawned before validation
    let runner = CommandRunner::new(ShellConfig::posix());
    for line in ["", "   ", "\t\n"] {
        let (sink, _rx) = ChannelSink::new();
        assert_eq!(runner.start(line, sink).unwrap_err(), RunError::EmptyCommand);
    }
    assert_eq!(runner.state(), RunState::Idle);
}

#[cfg(unix)]
mod unix {
    use super::*;

    #[tokio::test]
    async fn test_kill_without_active_run() {
        let runner = CommandRunner::new(ShellConfig::posix());
        let (sink, _rx) = ChannelSink::new();
        let handle = runner.start("true", sink).unwrap();

        // A runner that never started anything
        let idle = CommandRunner::new(ShellConfig::posix());
        assert_eq!(idle.kill(&handle), Err(RunError::NoActiveRun));

        // Same runner, after the run has settled
        settle(&runner, &handle).await;
        assert_eq!(runner.kill(&handle), Err(RunError::NoActiveRun));
    }

    #[tokio::test]
    async fn test_echo_hello() {
        let runner = CommandRunner::new(ShellConfig::posix());
        let (sink, mut rx) = ChannelSink::new();

        let handle = runner.start("echo hello", sink).unwrap();
        assert_eq!(runner.state(), RunState::Running(handle.id()));

        let outcome = settle(&runner, &handle).await;
        assert_eq!(outcome, ExitOutcome::Exited(0));
        assert_eq!(handle.outcome(), Some(ExitOutcome::Exited(0)));

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                SinkEvent::Line(OutputLine::new(OutputStream::Stdout, "hello")),
                SinkEvent::Complete(ExitOutcome::Exited(0)),
            ]
        );
        assert_eq!(runner.state(), RunState::Completed(0));
    }

    #[tokio::test]
    async fn test_stream_counts_and_order() {
        let runner = CommandRunner::new(ShellConfig::posix());
        let (sink, mut rx) = ChannelSink::new();

        let script = "for i in 1 2 3 4 5; do echo out$i; echo err$i >&2; done; echo out6";
        let handle = runner.start(script, sink).unwrap();
        assert_eq!(settle(&runner, &handle).await, ExitOutcome::Exited(0));

        let events = drain(&mut rx);
        assert_eq!(
            lines_of(&events, OutputStream::Stdout),
            vec!["out1", "out2", "out3", "out4", "out5", "out6"]
        );
        assert_eq!(
            lines_of(&events, OutputStream::Stderr),
            vec!["err1", "err2", "err3", "err4", "err5"]
        );
        assert!(lines_of(&events, OutputStream::Notice).is_empty());
        assert_eq!(events.last(), Some(&SinkEvent::Complete(ExitOutcome::Exited(0))));
    }

    #[tokio::test]
    async fn test_exit_code_is_reported() {
        let runner = CommandRunner::new(ShellConfig::posix());
        let (sink, mut rx) = ChannelSink::new();

        let handle = runner.start("echo failing >&2; exit 3", sink).unwrap();
        assert_eq!(settle(&runner, &handle).await, ExitOutcome::Exited(3));

        let events = drain(&mut rx);
        assert_eq!(lines_of(&events, OutputStream::Stderr), vec!["failing"]);
        assert_eq!(runner.state(), RunState::Completed(3));
    }

    #[tokio::test]
    async fn test_start_while_running_is_rejected() {
        let runner = CommandRunner::new(ShellConfig::posix());
        let (sink, mut rx) = ChannelSink::new();
        let first = runner.start("sleep 0.3; echo first-done", sink).unwrap();

        let (other_sink, mut other_rx) = ChannelSink::new();
        assert_eq!(
            runner.start("echo second", other_sink).unwrap_err(),
            RunError::AlreadyRunning
        );

        assert_eq!(settle(&runner, &first).await, ExitOutcome::Exited(0));
        assert_eq!(lines_of(&drain(&mut rx), OutputStream::Stdout), vec!["first-done"]);
        assert!(drain(&mut other_rx).is_empty());
    }

    #[tokio::test]
    async fn test_kill_infinite_loop() {
        let runner = CommandRunner::new(ShellConfig::posix());
        let (sink, mut rx) = ChannelSink::new();

        let handle = runner
            .start("echo started; while true; do sleep 0.05; done", sink)
            .unwrap();

        // Let the loop produce its first line before killing
        let first = timeout(BUDGET, rx.recv()).await.unwrap();
        assert_eq!(
            first,
            Some(SinkEvent::Line(OutputLine::new(OutputStream::Stdout, "started")))
        );

        runner.kill(&handle).unwrap();
        // Second kill is a no-op, not a second notice
        runner.kill(&handle).unwrap();

        assert_eq!(settle(&runner, &handle).await, ExitOutcome::Killed);

        let events = drain(&mut rx);
        assert_eq!(lines_of(&events, OutputStream::Notice), vec![STOP_NOTICE]);
        assert_eq!(events.last(), Some(&SinkEvent::Complete(ExitOutcome::Killed)));
        assert_eq!(runner.state(), RunState::Killed);
    }

    #[tokio::test]
    async fn test_runner_is_reusable_after_kill() {
        let runner = CommandRunner::new(ShellConfig::posix());
        let (sink, _rx) = ChannelSink::new();
        let killed = runner.start("sleep 30", sink).unwrap();
        runner.kill(&killed).unwrap();
        assert_eq!(settle(&runner, &killed).await, ExitOutcome::Killed);

        let (sink, mut rx) = ChannelSink::new();
        let next = runner.start("echo again", sink).unwrap();
        assert_ne!(next.id(), killed.id());
        assert_eq!(settle(&runner, &next).await, ExitOutcome::Exited(0));
        assert_eq!(lines_of(&drain(&mut rx), OutputStream::Stdout), vec!["again"]);

        // Stale handle from the first run
        assert_eq!(runner.kill(&killed), Err(RunError::NoActiveRun));
    }

    #[tokio::test]
    async fn test_stale_handle_does_not_kill_new_run() {
        let runner = CommandRunner::new(ShellConfig::posix());
        let (sink, _rx) = ChannelSink::new();
        let old = runner.start("true", sink).unwrap();
        settle(&runner, &old).await;

        let (sink, mut rx) = ChannelSink::new();
        let current = runner.start("sleep 0.2; echo survived", sink).unwrap();
        runner.kill(&old).unwrap();

        assert_eq!(settle(&runner, &current).await, ExitOutcome::Exited(0));
        assert_eq!(lines_of(&drain(&mut rx), OutputStream::Stdout), vec!["survived"]);
    }

    #[tokio::test]
    async fn test_missing_interpreter_fails_to_spawn() {
        let runner = CommandRunner::new(ShellConfig::new("nonexistent-binary-xyz", ["-c"]));
        let (sink, mut rx) = ChannelSink::new();

        let err = runner.start("echo hello", sink).unwrap_err();
        assert!(matches!(err, RunError::SpawnFailed(_)));
        assert_eq!(runner.state(), RunState::Failed(err));
        assert!(!runner.is_running());
        // Sink was never handed to a dispatcher
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_handle_clones_share_completion() {
        let runner = CommandRunner::new(ShellConfig::posix());
        let (sink, _rx) = ChannelSink::new();
        let handle = runner.start("exit 7", sink).unwrap();
        let clone = handle.clone();

        let (a, b) = tokio::join!(handle.wait(), clone.wait());
        assert_eq!(a, Ok(ExitOutcome::Exited(7)));
        assert_eq!(b, Ok(ExitOutcome::Exited(7)));
    }
}

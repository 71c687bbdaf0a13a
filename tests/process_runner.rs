//! Process lifecycle tests using plain shell fixtures, so they run
//! without ffmpeg installed. Unix-only: they rely on SIGTERM semantics.
#![cfg(unix)]

use std::io::Read;
use std::process::Command;
use std::time::{Duration, Instant};

use vcrush::engine::{ExitState, ProcessRunner};

fn sh(script: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(script);
    cmd
}

#[test]
fn test_clean_exit_reports_completed() {
    let mut runner = ProcessRunner::start(sh("exit 0")).unwrap();
    assert_eq!(runner.wait().unwrap(), ExitState::Completed(0));
}

#[test]
fn test_nonzero_exit_reports_failed_with_stderr_tail() {
    let mut runner = ProcessRunner::start(sh("echo boom >&2; exit 3")).unwrap();
    match runner.wait().unwrap() {
        ExitState::Failed { code, stderr_tail } => {
            assert_eq!(code, 3);
            assert!(stderr_tail.contains("boom"), "tail was: {stderr_tail}");
        }
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[test]
fn test_spawn_error_for_missing_executable() {
    let cmd = Command::new("/definitely/not/an/executable");
    assert!(ProcessRunner::start(cmd).is_err());
}

#[test]
fn test_stdout_is_readable_by_the_caller() {
    let mut runner = ProcessRunner::start(sh("printf 'out_time_ms=1000\\n'")).unwrap();
    let mut stdout = runner.take_stdout().unwrap();
    let mut text = String::new();
    stdout.read_to_string(&mut text).unwrap();
    assert_eq!(text.trim(), "out_time_ms=1000");
    assert_eq!(runner.wait().unwrap(), ExitState::Completed(0));
}

#[test]
fn test_graceful_stop_reports_killed() {
    let mut runner = ProcessRunner::start(sh("sleep 30")).unwrap();
    let state = runner.stop(Duration::from_secs(2)).unwrap();
    assert_eq!(state, ExitState::Killed);
}

#[test]
fn test_stop_escalates_when_sigterm_is_ignored() {
    // The shell traps TERM, so only the forceful kill can end it.
    let mut runner = ProcessRunner::start(sh("trap '' TERM; sleep 30")).unwrap();
    let started = Instant::now();
    let state = runner.stop(Duration::from_millis(300)).unwrap();
    assert_eq!(state, ExitState::Killed);
    // stop() must not return before the process is actually gone, and the
    // escalation happens promptly after the grace period.
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn test_stop_does_not_wait_for_lingering_grandchildren() {
    // The shell forks a background sleep that inherits the output pipes,
    // then replaces itself with another sleep. Stopping must take down
    // the whole group, or wait() would block on the drain threads until
    // the background sleep exits on its own.
    let mut runner = ProcessRunner::start(sh("sleep 30 & exec sleep 30")).unwrap();
    let started = Instant::now();
    let state = runner.stop(Duration::from_millis(300)).unwrap();
    assert_eq!(state, ExitState::Killed);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_stop_after_natural_exit_keeps_completed_state() {
    let mut runner = ProcessRunner::start(sh("exit 0")).unwrap();
    // Give the process time to exit on its own.
    std::thread::sleep(Duration::from_millis(200));
    let state = runner.stop(Duration::from_secs(1)).unwrap();
    assert_eq!(state, ExitState::Completed(0));
}

#[test]
fn test_stop_handle_cancels_from_another_thread() {
    let mut runner = ProcessRunner::start(sh("sleep 30")).unwrap();
    let handle = runner.stop_handle();

    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        handle.stop(Duration::from_secs(2)).unwrap();
    });

    // wait() blocks the worker side until the concurrent stop lands.
    assert_eq!(runner.wait().unwrap(), ExitState::Killed);
    canceller.join().unwrap();
}

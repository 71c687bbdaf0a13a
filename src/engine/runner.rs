// Lifecycle management for one spawned encoder process

use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::error::EncodeError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Lines of stderr retained for failure diagnostics.
const STDERR_TAIL_LINES: usize = 20;

/// Terminal states of a spawned process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitState {
    Completed(i32),
    Failed { code: i32, stderr_tail: String },
    Killed,
}

#[derive(Debug)]
struct ChildState {
    child: Child,
    status: Option<ExitStatus>,
    killed: bool,
}

impl ChildState {
    fn poll(&mut self) -> std::io::Result<Option<ExitStatus>> {
        if self.status.is_none() {
            self.status = self.child.try_wait()?;
        }
        Ok(self.status)
    }

    fn reap(&mut self) -> std::io::Result<ExitStatus> {
        if let Some(status) = self.status {
            return Ok(status);
        }
        let status = self.child.wait()?;
        self.status = Some(status);
        Ok(status)
    }
}

/// Owns exactly one OS process plus its output streams. The handle is
/// only dropped after the process is confirmed terminated; `Drop` kills
/// and reaps as a last resort so no call path leaks a process.
pub struct ProcessRunner {
    state: Arc<Mutex<ChildState>>,
    pid: u32,
    stdout: Option<ChildStdout>,
    stderr_thread: Option<JoinHandle<String>>,
}

/// Cloneable handle that can stop the process from another thread. Safe
/// to invoke concurrently with the monitoring loop: it only touches the
/// shared child state, never the streams.
#[derive(Clone)]
pub struct StopHandle {
    state: Arc<Mutex<ChildState>>,
    pid: u32,
}

impl ProcessRunner {
    /// Spawn the process with both output streams captured. stderr is
    /// drained on a background thread so the process can never block on
    /// a full pipe.
    ///
    /// On unix the process gets its own process group: termination
    /// signals reach any helpers it forks, so they cannot hold the
    /// output pipes open after the process itself is gone.
    pub fn start(mut cmd: Command) -> Result<Self, EncodeError> {
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        isolate_process_group(&mut cmd);

        let mut child = cmd.spawn().map_err(EncodeError::Spawn)?;
        let pid = child.id();
        debug!(pid, program = %cmd.get_program().to_string_lossy(), "spawned process");

        let stderr_thread = child.stderr.take().map(|stderr| {
            thread::spawn(move || {
                let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
                for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                tail.into_iter().collect::<Vec<_>>().join("\n")
            })
        });

        let stdout = child.stdout.take();

        Ok(Self {
            state: Arc::new(Mutex::new(ChildState {
                child,
                status: None,
                killed: false,
            })),
            pid,
            stdout,
            stderr_thread,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Take the progress stream. The caller owns reading it to EOF.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            state: Arc::clone(&self.state),
            pid: self.pid,
        }
    }

    /// Block until the process exits and return its terminal state.
    ///
    /// Polls instead of holding a blocking `wait`, so a concurrent
    /// `StopHandle::stop` can take the child lock at any time.
    pub fn wait(&mut self) -> Result<ExitState, EncodeError> {
        // If nobody claimed stdout, drain it; a full pipe would stall
        // the process forever.
        if let Some(stdout) = self.stdout.take() {
            thread::spawn(move || {
                for _ in BufReader::new(stdout).lines().map_while(Result::ok) {}
            });
        }

        let (status, killed) = loop {
            {
                let mut state = self.state.lock().unwrap();
                if let Some(status) = state.poll().map_err(EncodeError::Process)? {
                    break (status, state.killed);
                }
            }
            thread::sleep(POLL_INTERVAL);
        };

        let stderr_tail = self
            .stderr_thread
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default();

        Ok(exit_state(status, killed, stderr_tail))
    }

    /// Graceful-then-forceful termination; see [`StopHandle::stop`].
    pub fn stop(&mut self, grace: Duration) -> Result<ExitState, EncodeError> {
        self.stop_handle().stop(grace)?;
        self.wait()
    }
}

impl Drop for ProcessRunner {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap();
        if state.status.is_none() {
            warn!(pid = self.pid, "process still alive at handle drop, killing");
            force_kill(self.pid, &mut state.child);
            let _ = state.reap();
        }
    }
}

impl StopHandle {
    /// Request graceful termination, wait up to `grace`, then kill.
    /// Never returns while the OS process is still alive.
    pub fn stop(&self, grace: Duration) -> Result<(), EncodeError> {
        let mut state = self.state.lock().unwrap();
        if state.poll().map_err(EncodeError::Process)?.is_some() {
            // Already exited; nothing to terminate.
            return Ok(());
        }

        debug!(pid = self.pid, "requesting graceful termination");
        terminate_gracefully(self.pid);

        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            if state.poll().map_err(EncodeError::Process)?.is_some() {
                state.killed = true;
                return Ok(());
            }
            thread::sleep(POLL_INTERVAL);
        }

        // Grace period exceeded; escalate. Not a user-facing error.
        warn!(pid = self.pid, "graceful stop timed out, sending kill");
        force_kill(self.pid, &mut state.child);
        state.killed = true;
        state.reap().map_err(EncodeError::Process)?;
        Ok(())
    }
}

#[cfg(unix)]
fn isolate_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn isolate_process_group(_cmd: &mut Command) {}

#[cfg(unix)]
fn terminate_gracefully(pid: u32) {
    // SAFETY: plain kill(2) aimed at a process group we created.
    unsafe {
        libc::kill(-(pid as libc::pid_t), libc::SIGTERM);
    }
}

#[cfg(not(unix))]
fn terminate_gracefully(_pid: u32) {
    // No graceful signal on this platform; stop() escalates to kill.
}

#[cfg(unix)]
fn force_kill(pid: u32, _child: &mut Child) {
    // SAFETY: plain kill(2) aimed at a process group we created.
    unsafe {
        libc::kill(-(pid as libc::pid_t), libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn force_kill(_pid: u32, child: &mut Child) {
    let _ = child.kill();
}

fn exit_state(status: ExitStatus, killed: bool, stderr_tail: String) -> ExitState {
    if killed {
        return ExitState::Killed;
    }
    match status.code() {
        Some(0) => ExitState::Completed(0),
        Some(code) => ExitState::Failed { code, stderr_tail },
        // Terminated by a signal we did not send.
        None => ExitState::Killed,
    }
}

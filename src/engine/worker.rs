// Sequential job execution on a dedicated worker thread

use serde::Serialize;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::core::{BatchPlan, BatchReport, Job, JobStatus, ProgressSnapshot};
use super::core::{ProgressMonitor, build_ffmpeg_cmd};
use super::error::EncodeError;
use super::probe;
use super::runner::{ExitState, ProcessRunner, StopHandle};

pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);

/// Asynchronous notification from the worker thread to the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkerMessage {
    JobStarted {
        job_id: Uuid,
        label: String,
    },
    Progress(ProgressSnapshot),
    JobCompleted {
        job_id: Uuid,
        completed: usize,
        total: usize,
    },
    BatchCompleted(BatchReport),
    BatchFailed {
        error: String,
        report: BatchReport,
    },
}

#[derive(Debug, Clone)]
pub struct EncodeOptions {
    /// Grace period before a stop request escalates to a forceful kill.
    pub stop_grace: Duration,
    /// Extra ffmpeg arguments appended verbatim (shell-style parsed).
    pub extra_args: String,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            stop_grace: DEFAULT_STOP_GRACE,
            extra_args: String::new(),
        }
    }
}

type KillSlot = Arc<Mutex<Option<StopHandle>>>;

/// Handle to a single in-flight job. `cancel` forcibly terminates the
/// running encoder process.
pub struct JobHandle {
    pub events: Receiver<WorkerMessage>,
    kill: KillSlot,
    stop_grace: Duration,
    join: JoinHandle<Result<(), EncodeError>>,
}

impl JobHandle {
    pub fn cancel(&self) {
        let handle = self.kill.lock().unwrap().clone();
        if let Some(handle) = handle {
            let _ = handle.stop(self.stop_grace);
        }
    }

    pub fn join(self) -> Result<(), EncodeError> {
        self.join
            .join()
            .unwrap_or_else(|_| Err(EncodeError::Process(std::io::Error::other("worker panicked"))))
    }
}

/// Handle to a running batch. `cancel` only prevents further jobs from
/// starting; the job already running is allowed to finish. This
/// asymmetry with single-job cancellation is intentional.
pub struct BatchHandle {
    pub events: Receiver<WorkerMessage>,
    cancel: Arc<AtomicBool>,
    join: JoinHandle<Result<BatchReport, EncodeError>>,
}

impl BatchHandle {
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn join(self) -> Result<BatchReport, EncodeError> {
        self.join
            .join()
            .unwrap_or_else(|_| Err(EncodeError::Process(std::io::Error::other("worker panicked"))))
    }
}

/// Overall batch percent from the completed count and the live item.
pub fn overall_percent(completed: usize, total: usize, item_pct: u8) -> u8 {
    if total == 0 {
        return 100;
    }
    let fraction = (completed as f64 + item_pct as f64 / 100.0) / total as f64;
    (fraction * 100.0).floor().min(100.0) as u8
}

/// Remaining time extrapolated from elapsed time; undefined at 0%.
pub fn eta_secs(elapsed: Duration, overall_pct: u8) -> Option<f64> {
    if overall_pct == 0 {
        return None;
    }
    let pct = overall_pct as f64;
    Some(elapsed.as_secs_f64() * (100.0 - pct) / pct)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn snapshot(
    started: Instant,
    completed: usize,
    total: usize,
    item_pct: u8,
    label: String,
) -> ProgressSnapshot {
    let overall = overall_percent(completed, total, item_pct);
    let elapsed = started.elapsed();
    ProgressSnapshot {
        overall_pct: overall,
        item_pct,
        current_label: label,
        elapsed_secs: elapsed.as_secs_f64(),
        eta_secs: eta_secs(elapsed, overall),
    }
}

/// Run one job to completion: probe, build the command, spawn, monitor
/// the progress stream, reap. The worker thread is the exclusive owner
/// of the process handle and its streams for the duration of the job.
fn encode_job(
    job: &mut Job,
    opts: &EncodeOptions,
    kill: &KillSlot,
    mut on_pct: impl FnMut(u8),
) -> Result<(), EncodeError> {
    let duration = probe::duration_secs(&job.input_path)?;
    let cmd = build_ffmpeg_cmd(job, &opts.extra_args);

    debug!(input = %job.input_path.display(), codec = %job.codec, crf = job.crf, "starting encode");
    let mut runner = ProcessRunner::start(cmd)?;
    *kill.lock().unwrap() = Some(runner.stop_handle());
    job.status = JobStatus::Running;

    let mut monitor = ProgressMonitor::new(duration);
    if let Some(stdout) = runner.take_stdout() {
        for line in BufReader::new(stdout).lines().map_while(Result::ok) {
            if let Some(pct) = monitor.observe(&line) {
                on_pct(pct);
            }
        }
        // Stream end before exit is not an error; defer to the status.
    }

    let state = runner.wait();
    *kill.lock().unwrap() = None;

    match state? {
        ExitState::Completed(_) => {
            if let Some(pct) = monitor.finish() {
                on_pct(pct);
            }
            job.status = JobStatus::Done;
            Ok(())
        }
        ExitState::Failed { code, stderr_tail } => {
            job.status = JobStatus::Failed;
            Err(EncodeError::EncodeFailed { code, stderr_tail })
        }
        ExitState::Killed => {
            job.status = JobStatus::Failed;
            Err(EncodeError::Cancelled)
        }
    }
}

/// Spawn a worker thread for a single job. Progress and completion are
/// delivered on the returned handle's channel.
pub fn spawn_job(mut job: Job, opts: EncodeOptions) -> JobHandle {
    let (tx, rx) = mpsc::channel();
    let kill: KillSlot = Arc::new(Mutex::new(None));
    let kill_worker = Arc::clone(&kill);
    let stop_grace = opts.stop_grace;

    let join = thread::spawn(move || {
        let started = Instant::now();
        let label = file_label(&job.input_path);
        let _ = tx.send(WorkerMessage::JobStarted {
            job_id: job.id,
            label: label.clone(),
        });

        let result = {
            let tx = &tx;
            let label = &label;
            encode_job(&mut job, &opts, &kill_worker, |pct| {
                let _ = tx.send(WorkerMessage::Progress(snapshot(
                    started,
                    0,
                    1,
                    pct,
                    label.clone(),
                )));
            })
        };

        match result {
            Ok(()) => {
                let report = BatchReport {
                    completed: 1,
                    total: 1,
                    elapsed_secs: started.elapsed().as_secs_f64(),
                    input_bytes: file_size(&job.input_path),
                    output_bytes: file_size(&job.output_path),
                };
                let _ = tx.send(WorkerMessage::JobCompleted {
                    job_id: job.id,
                    completed: 1,
                    total: 1,
                });
                let _ = tx.send(WorkerMessage::BatchCompleted(report));
                Ok(())
            }
            Err(err) => {
                let report = BatchReport {
                    completed: 0,
                    total: 1,
                    elapsed_secs: started.elapsed().as_secs_f64(),
                    ..BatchReport::default()
                };
                let _ = tx.send(WorkerMessage::BatchFailed {
                    error: err.to_string(),
                    report,
                });
                Err(err)
            }
        }
    });

    JobHandle {
        events: rx,
        kill,
        stop_grace,
        join,
    }
}

/// Spawn the batch scheduler thread. Jobs run strictly sequentially so
/// only one encoding process is ever live.
pub fn spawn_batch(plan: BatchPlan, opts: EncodeOptions) -> BatchHandle {
    let (tx, rx) = mpsc::channel();
    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_worker = Arc::clone(&cancel);

    let join = thread::spawn(move || run_batch(plan, opts, tx, cancel_worker));

    BatchHandle {
        events: rx,
        cancel,
        join,
    }
}

fn run_batch(
    mut plan: BatchPlan,
    opts: EncodeOptions,
    tx: Sender<WorkerMessage>,
    cancel: Arc<AtomicBool>,
) -> Result<BatchReport, EncodeError> {
    let started = Instant::now();
    let total = plan.jobs.len();
    let kill: KillSlot = Arc::new(Mutex::new(None));

    let mut report = BatchReport {
        total,
        ..BatchReport::default()
    };

    for (index, job) in plan.jobs.iter_mut().enumerate() {
        // Batch-level cancellation only prevents future jobs from starting.
        if cancel.load(Ordering::SeqCst) {
            info!(completed = report.completed, total, "batch cancelled");
            break;
        }

        let label = file_label(&job.input_path);
        let _ = tx.send(WorkerMessage::JobStarted {
            job_id: job.id,
            label: label.clone(),
        });
        debug!(item = index + 1, total, file = %label, "batch item starting");

        let completed = report.completed;
        let result = {
            let tx = &tx;
            let label = &label;
            encode_job(job, &opts, &kill, |pct| {
                let _ = tx.send(WorkerMessage::Progress(snapshot(
                    started,
                    completed,
                    total,
                    pct,
                    label.clone(),
                )));
            })
        };

        match result {
            Ok(()) => {
                report.completed += 1;
                report.input_bytes += file_size(&job.input_path);
                report.output_bytes += file_size(&job.output_path);
                report.elapsed_secs = started.elapsed().as_secs_f64();

                // Item boundary: overall percent moves to the completed
                // count, label switches to the completion marker.
                let _ = tx.send(WorkerMessage::Progress(snapshot(
                    started,
                    report.completed,
                    total,
                    0,
                    format!("completed {}/{}", report.completed, total),
                )));
                let _ = tx.send(WorkerMessage::JobCompleted {
                    job_id: job.id,
                    completed: report.completed,
                    total,
                });
            }
            Err(err) => {
                // One failure aborts the batch; surface what accumulated.
                report.elapsed_secs = started.elapsed().as_secs_f64();
                warn!(file = %label, %err, "batch aborted by job failure");
                let _ = tx.send(WorkerMessage::BatchFailed {
                    error: err.to_string(),
                    report: report.clone(),
                });
                return Err(err);
            }
        }
    }

    report.elapsed_secs = started.elapsed().as_secs_f64();
    let _ = tx.send(WorkerMessage::BatchCompleted(report.clone()));
    Ok(report)
}

fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

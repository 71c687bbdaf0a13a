//! Tests for batch aggregation math and the worker event stream.
use std::path::PathBuf;
use std::time::Duration;

use vcrush::engine::{
    BatchPlan, BatchReport, Codec, EncodeOptions, HwAccel, Job, WorkerMessage, eta_secs,
    overall_percent, spawn_batch, spawn_job,
};

#[test]
fn test_overall_percent_folds_item_progress() {
    // Job 1 done, job 2 at 50%: floor((1 + 0.5) / 3 * 100) = 50.
    assert_eq!(overall_percent(1, 3, 50), 50);

    assert_eq!(overall_percent(0, 1, 37), 37);
    assert_eq!(overall_percent(2, 3, 0), 66);
    assert_eq!(overall_percent(3, 3, 0), 100);
    assert_eq!(overall_percent(0, 0, 0), 100);
}

#[test]
fn test_overall_percent_is_monotone() {
    let total = 4;
    let mut last = 0;
    for completed in 0..total {
        for item in 0..=100u8 {
            let pct = overall_percent(completed, total, item);
            assert!(pct >= last, "regressed at {completed}/{item}");
            last = pct;
        }
    }
    assert_eq!(overall_percent(total, total, 0), 100);
}

#[test]
fn test_eta_undefined_at_zero_percent() {
    assert_eq!(eta_secs(Duration::from_secs(10), 0), None);
}

#[test]
fn test_eta_extrapolates_from_elapsed() {
    // 30s elapsed at 50% leaves 30s.
    let eta = eta_secs(Duration::from_secs(30), 50).unwrap();
    assert!((eta - 30.0).abs() < 1e-9);

    // 90s elapsed at 75% leaves 30s.
    let eta = eta_secs(Duration::from_secs(90), 75).unwrap();
    assert!((eta - 30.0).abs() < 1e-9);

    // Done means nothing remains.
    assert_eq!(eta_secs(Duration::from_secs(120), 100), Some(0.0));
}

#[test]
fn test_compression_ratio() {
    let report = BatchReport {
        completed: 2,
        total: 2,
        elapsed_secs: 10.0,
        input_bytes: 1000,
        output_bytes: 250,
    };
    assert_eq!(report.compression_ratio(), Some(0.25));

    let empty = BatchReport::default();
    assert_eq!(empty.compression_ratio(), None);
}

#[test]
fn test_single_job_failure_surfaces_through_events() {
    // A missing input fails during the probe, before ffmpeg is needed.
    let job = Job::new(
        PathBuf::from("/definitely/not/here.mp4"),
        None,
        Codec::H264,
        23,
        HwAccel::None,
    );
    let handle = spawn_job(job, EncodeOptions::default());

    let messages: Vec<WorkerMessage> = handle.events.iter().collect();
    assert!(matches!(messages.first(), Some(WorkerMessage::JobStarted { .. })));
    let Some(WorkerMessage::BatchFailed { error, report }) = messages.last() else {
        panic!("expected BatchFailed, got {:?}", messages.last());
    };
    assert!(error.contains("not found"), "unexpected error: {error}");
    assert_eq!(report.completed, 0);
    assert_eq!(report.total, 1);

    assert!(handle.join().is_err());
}

#[test]
fn test_batch_aborts_on_first_failure() {
    let files = vec![
        PathBuf::from("/missing/a.mp4"),
        PathBuf::from("/missing/b.mp4"),
        PathBuf::from("/missing/c.mp4"),
    ];
    let plan = BatchPlan::new(files, Codec::H265, 28, HwAccel::None, None);
    let handle = spawn_batch(plan, EncodeOptions::default());

    let messages: Vec<WorkerMessage> = handle.events.iter().collect();

    // Exactly one job is attempted; the failure aborts the rest.
    let started = messages
        .iter()
        .filter(|m| matches!(m, WorkerMessage::JobStarted { .. }))
        .count();
    assert_eq!(started, 1);

    let Some(WorkerMessage::BatchFailed { report, .. }) = messages.last() else {
        panic!("expected BatchFailed, got {:?}", messages.last());
    };
    assert_eq!(report.completed, 0);
    assert_eq!(report.total, 3);

    assert!(handle.join().is_err());
}

#[test]
fn test_events_serialize_as_tagged_json() {
    let job = Job::new(
        PathBuf::from("/missing/x.mp4"),
        None,
        Codec::H264,
        23,
        HwAccel::None,
    );
    let handle = spawn_job(job, EncodeOptions::default());
    for msg in handle.events.iter() {
        let value = serde_json::to_value(&msg).unwrap();
        let event = value.get("event").and_then(|v| v.as_str()).unwrap();
        assert!(
            ["job_started", "progress", "job_completed", "batch_completed", "batch_failed"]
                .contains(&event),
            "unexpected event tag {event}"
        );
    }
    let _ = handle.join();
}

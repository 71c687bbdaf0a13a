use std::time::{Duration, Instant};

/// Minimum wall-clock gap between emitted percentage updates.
pub const PROGRESS_THROTTLE: Duration = Duration::from_millis(500);

/// Extract the encoded time offset from one line of ffmpeg `-progress`
/// output. The `out_time_ms` field is a legacy misnomer: its value is in
/// microseconds, so callers divide by 1,000,000 to get seconds.
pub fn parse_out_time(line: &str) -> Option<u64> {
    let (key, value) = line.split_once('=')?;
    if key.trim() != "out_time_ms" {
        return None;
    }
    value.trim().parse().ok()
}

/// Converts raw time-offset telemetry into a throttled, monotonically
/// non-decreasing stream of integer percentages.
///
/// A percent is emitted only when it differs from the last emitted value
/// and the throttle interval has elapsed. Malformed lines are skipped.
/// [`finish`](Self::finish) covers telemetry gaps near the end: on
/// successful exit the caller uses it to force a final 100.
#[derive(Debug)]
pub struct ProgressMonitor {
    total_secs: f64,
    throttle: Duration,
    last_pct: Option<u8>,
    last_emit: Option<Instant>,
}

impl ProgressMonitor {
    pub fn new(total_secs: f64) -> Self {
        Self::with_throttle(total_secs, PROGRESS_THROTTLE)
    }

    pub fn with_throttle(total_secs: f64, throttle: Duration) -> Self {
        Self {
            total_secs,
            throttle,
            last_pct: None,
            last_emit: None,
        }
    }

    fn percent(&self, out_time_us: u64) -> u8 {
        if self.total_secs <= 0.0 {
            return 0;
        }
        let secs = out_time_us as f64 / 1_000_000.0;
        (secs / self.total_secs * 100.0).floor().min(100.0) as u8
    }

    /// Feed one line of progress output; returns a percent to emit, if any.
    /// Without a known duration there is no percentage to report.
    pub fn observe(&mut self, line: &str) -> Option<u8> {
        if self.total_secs <= 0.0 {
            return None;
        }
        let pct = self.percent(parse_out_time(line)?);
        if let Some(last) = self.last_pct {
            // Never regress, never repeat.
            if pct <= last {
                return None;
            }
        }
        if let Some(at) = self.last_emit {
            if at.elapsed() < self.throttle {
                return None;
            }
        }
        self.last_pct = Some(pct);
        self.last_emit = Some(Instant::now());
        Some(pct)
    }

    /// Final update after a successful exit: returns `Some(100)` unless
    /// the stream already reached it.
    pub fn finish(&mut self) -> Option<u8> {
        if self.last_pct == Some(100) {
            return None;
        }
        self.last_pct = Some(100);
        Some(100)
    }
}

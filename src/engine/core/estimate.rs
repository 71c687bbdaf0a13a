use std::path::{Path, PathBuf};
use tracing::debug;

use super::types::Codec;
use crate::engine::probe;

/// CRF at which the per-codec reduction factors were measured.
const REFERENCE_CRF: f64 = 23.0;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Estimates never report below this, to avoid degenerate near-zero values.
const MIN_ESTIMATE_MB: f64 = 0.1;

/// Size multiplier relative to the reference CRF: roughly doubles or
/// halves every 6 quality steps.
pub fn quality_factor(crf: u8) -> f64 {
    2f64.powf((REFERENCE_CRF - crf as f64) / 6.0)
}

/// Bitrate-based estimate: predicted output bitrate times duration.
pub fn estimate_from_bitrate(bitrate_bps: u64, duration_secs: f64, codec: Codec, crf: u8) -> f64 {
    let predicted_bps = bitrate_bps as f64 * codec.reduction_factor() * quality_factor(crf);
    (predicted_bps * duration_secs / 8.0 / BYTES_PER_MB).max(MIN_ESTIMATE_MB)
}

/// Ratio-based fallback when probing is unavailable. The ratio is capped
/// at 1.0 so the estimate never exceeds the input size.
pub fn estimate_from_input_size(input_mb: f64, codec: Codec, crf: u8) -> f64 {
    let ratio = (codec.reduction_factor() * quality_factor(crf)).min(1.0);
    (input_mb * ratio).max(MIN_ESTIMATE_MB)
}

/// Predict the compressed size of `path` in MB. Never fails: degrades to
/// the ratio heuristic when probing fails, and returns 0.0 only when the
/// input file does not exist.
pub fn estimate_mb(path: &Path, codec: Codec, crf: u8) -> f64 {
    let Ok(meta) = std::fs::metadata(path) else {
        return 0.0;
    };

    match probe::duration_secs(path) {
        Ok(duration) => {
            let bitrate = probe::video_bitrate(path);
            if bitrate > 0 {
                return estimate_from_bitrate(bitrate, duration, codec, crf);
            }
        }
        Err(err) => {
            debug!(path = %path.display(), %err, "probe failed, using ratio heuristic");
        }
    }

    estimate_from_input_size(meta.len() as f64 / BYTES_PER_MB, codec, crf)
}

/// Batch estimate is the sum of per-item estimates; no shortcut formula.
pub fn estimate_batch_mb(paths: &[PathBuf], codec: Codec, crf: u8) -> f64 {
    paths.iter().map(|p| estimate_mb(p, codec, crf)).sum()
}

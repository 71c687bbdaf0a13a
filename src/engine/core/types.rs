use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

use crate::engine::error::EncodeError;

/// Marker appended to output file stems; files carrying it are skipped
/// during batch discovery so prior outputs are never re-compressed.
pub const COMPRESSED_MARKER: &str = "_compressed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    H264,
    H265,
    Vp9,
    Av1,
}

impl Codec {
    /// Container extension implied by the codec (no leading dot).
    pub fn container_ext(self) -> &'static str {
        match self {
            Codec::H264 | Codec::H265 => "mp4",
            Codec::Vp9 => "webm",
            Codec::Av1 => "mkv",
        }
    }

    /// Typical bitrate reduction vs. the source, used by the size estimator.
    pub fn reduction_factor(self) -> f64 {
        match self {
            Codec::H264 => 0.35,
            Codec::H265 => 0.25,
            Codec::Vp9 => 0.22,
            Codec::Av1 => 0.18,
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Codec::H264 => "h264",
            Codec::H265 => "h265",
            Codec::Vp9 => "vp9",
            Codec::Av1 => "av1",
        };
        f.write_str(name)
    }
}

impl FromStr for Codec {
    type Err = EncodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "h264" => Ok(Codec::H264),
            "h265" | "hevc" => Ok(Codec::H265),
            "vp9" => Ok(Codec::Vp9),
            "av1" => Ok(Codec::Av1),
            other => Err(EncodeError::UnsupportedCodec(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HwAccel {
    #[default]
    None,
    Nvidia,
    Amd,
    Intel,
}

impl fmt::Display for HwAccel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HwAccel::None => "none",
            HwAccel::Nvidia => "nvidia",
            HwAccel::Amd => "amd",
            HwAccel::Intel => "intel",
        };
        f.write_str(name)
    }
}

impl FromStr for HwAccel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "" => Ok(HwAccel::None),
            "nvidia" => Ok(HwAccel::Nvidia),
            "amd" => Ok(HwAccel::Amd),
            "intel" => Ok(HwAccel::Intel),
            other => Err(format!("unknown hardware acceleration: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Failed,
}

/// One transcode unit. Immutable settings once handed to the runner;
/// only `status` changes during execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub codec: Codec,
    pub crf: u8,
    pub hw_accel: HwAccel,
    pub status: JobStatus,
}

impl Job {
    /// Create a pending job. When `output` is `None` the path is derived as
    /// `{basename}_compressed{ext}` next to the input; when it is given
    /// without an extension, the codec's container extension is appended.
    pub fn new(
        input_path: PathBuf,
        output: Option<PathBuf>,
        codec: Codec,
        crf: u8,
        hw_accel: HwAccel,
    ) -> Self {
        let output_path = match output {
            Some(path) => ensure_extension(path, codec),
            None => derive_output_path(&input_path, codec, None),
        };
        Self {
            id: Uuid::new_v4(),
            input_path,
            output_path,
            codec,
            crf,
            hw_accel,
            status: JobStatus::Pending,
        }
    }
}

/// Append the codec's container extension if the path has none.
pub fn ensure_extension(mut path: PathBuf, codec: Codec) -> PathBuf {
    if path.extension().is_none() {
        path.set_extension(codec.container_ext());
    }
    path
}

/// Default output path: `{basename}_compressed{ext}`, placed in
/// `output_dir` when given, otherwise next to the input.
pub fn derive_output_path(input: &Path, codec: Codec, output_dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let file_name = format!("{stem}{COMPRESSED_MARKER}.{}", codec.container_ext());
    let dir = output_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    dir.join(file_name)
}

/// An ordered batch of jobs sharing codec, quality, and hardware settings.
/// Job order is fixed at creation and defines completion-counting order.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    pub jobs: Vec<Job>,
    pub codec: Codec,
    pub crf: u8,
    pub hw_accel: HwAccel,
    pub output_dir: Option<PathBuf>,
}

impl BatchPlan {
    pub fn new(
        files: Vec<PathBuf>,
        codec: Codec,
        crf: u8,
        hw_accel: HwAccel,
        output_dir: Option<PathBuf>,
    ) -> Self {
        let jobs = files
            .into_iter()
            .map(|input| {
                let output = derive_output_path(&input, codec, output_dir.as_deref());
                Job::new(input, Some(output), codec, crf, hw_accel)
            })
            .collect();
        Self {
            jobs,
            codec,
            crf,
            hw_accel,
            output_dir,
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Transient progress state, recomputed on every throttled update.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressSnapshot {
    pub overall_pct: u8,
    pub item_pct: u8,
    pub current_label: String,
    pub elapsed_secs: f64,
    pub eta_secs: Option<f64>,
}

/// Aggregate totals reported when a batch finishes or aborts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub completed: usize,
    pub total: usize,
    pub elapsed_secs: f64,
    pub input_bytes: u64,
    pub output_bytes: u64,
}

impl BatchReport {
    /// Output size as a fraction of input size, if any input was consumed.
    pub fn compression_ratio(&self) -> Option<f64> {
        if self.input_bytes == 0 {
            return None;
        }
        Some(self.output_bytes as f64 / self.input_bytes as f64)
    }
}

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vcrush")]
#[command(about = "FFmpeg transcode orchestrator with batch encoding", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Encoding settings shared by the encode/batch/dry-run subcommands.
/// Unset values fall back to the config file.
#[derive(Args, Clone)]
pub struct EncodeArgs {
    /// Codec: h264, h265, vp9, av1
    #[arg(long)]
    pub codec: Option<String>,

    /// CRF quality, 0-51 (lower = better quality, larger output)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=51))]
    pub crf: Option<u8>,

    /// Hardware acceleration: none, nvidia, amd, intel
    #[arg(long)]
    pub hw_accel: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check that ffmpeg and ffprobe are installed
    CheckTools,

    /// Probe a video file for duration and bitrate
    Probe {
        /// Path to the video file
        file: PathBuf,
    },

    /// Estimate compressed output size without encoding
    Estimate {
        /// Path to the video file
        file: PathBuf,

        #[command(flatten)]
        encode: EncodeArgs,
    },

    /// Print the ffmpeg command for a file without executing it
    DryRun {
        /// Input video file
        input: PathBuf,

        /// Output path (derived from the input when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        encode: EncodeArgs,
    },

    /// Compress a single video file
    Encode {
        /// Input video file
        input: PathBuf,

        /// Output path (derived from the input when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        encode: EncodeArgs,

        /// Emit progress events as JSON lines instead of plain text
        #[arg(long)]
        json: bool,
    },

    /// Compress every video file under a directory, one at a time
    Batch {
        /// Directory to scan for video files
        directory: PathBuf,

        /// Directory for outputs (defaults to next to each input)
        #[arg(long)]
        output_dir: Option<PathBuf>,

        #[command(flatten)]
        encode: EncodeArgs,

        /// Emit progress events as JSON lines instead of plain text
        #[arg(long)]
        json: bool,
    },

    /// Write a default config file
    InitConfig,
}

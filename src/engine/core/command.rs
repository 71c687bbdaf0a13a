use std::process::Command;

use super::types::{Codec, HwAccel, Job};

const NO_EXTRA: &[&str] = &[];

/// libvpx-vp9 uses a 0-63 CRF range instead of the x264/x265 0-51 range.
pub fn vp9_crf(crf: u8) -> u8 {
    std::cmp::min(63, (crf as f64 * 1.23).round() as u8)
}

/// Static encoding policy: (codec, hw-accel) -> vendor encoder + flags.
/// Hardware paths exist only for h264/h265; everything else falls back
/// to the software encoder, which is intentional policy, not an error.
fn hardware_encoder(codec: Codec, hw: HwAccel) -> Option<(&'static str, &'static [&'static str])> {
    match (hw, codec) {
        (HwAccel::Nvidia, Codec::H264) => Some(("h264_nvenc", &["-preset", "slow"])),
        (HwAccel::Nvidia, Codec::H265) => Some(("hevc_nvenc", &["-preset", "slow"])),
        (HwAccel::Amd, Codec::H264) => Some(("h264_amf", NO_EXTRA)),
        (HwAccel::Amd, Codec::H265) => Some(("hevc_amf", NO_EXTRA)),
        (HwAccel::Intel, Codec::H264) => Some(("h264_qsv", NO_EXTRA)),
        (HwAccel::Intel, Codec::H265) => Some(("hevc_qsv", NO_EXTRA)),
        _ => None,
    }
}

fn software_encoder(codec: Codec) -> &'static str {
    match codec {
        Codec::H264 => "libx264",
        Codec::H265 => "libx265",
        Codec::Vp9 => "libvpx-vp9",
        Codec::Av1 => "libaom-av1",
    }
}

/// Name of the encoder the policy will actually select, so callers can
/// surface a hardware-to-software downgrade before encoding starts.
pub fn selected_encoder(codec: Codec, hw: HwAccel) -> &'static str {
    hardware_encoder(codec, hw)
        .map(|(name, _)| name)
        .unwrap_or_else(|| software_encoder(codec))
}

fn software_args(codec: Codec, crf: u8) -> Vec<String> {
    let mut args: Vec<String> = vec!["-c:v".into(), software_encoder(codec).into()];
    match codec {
        Codec::H264 | Codec::H265 => {
            args.extend(["-preset".into(), "medium".into()]);
            args.extend(["-crf".into(), crf.to_string()]);
        }
        Codec::Vp9 => {
            args.extend(["-b:v".into(), "0".into()]);
            args.extend(["-crf".into(), vp9_crf(crf).to_string()]);
        }
        Codec::Av1 => {
            args.extend(["-crf".into(), crf.to_string()]);
            args.extend(["-b:v".into(), "0".into()]);
            args.extend(["-strict".into(), "experimental".into()]);
        }
    }
    args
}

/// Pure policy mapping (codec, quality, hw-accel) -> video encoder args.
/// Never fails for any enum value.
pub fn encoder_args(codec: Codec, crf: u8, hw: HwAccel) -> Vec<String> {
    match hardware_encoder(codec, hw) {
        Some((encoder, flags)) => {
            let mut args: Vec<String> = vec!["-c:v".into(), encoder.into()];
            args.extend(flags.iter().map(|f| f.to_string()));
            // CRF applies to the hardware paths too (h264/h265 only).
            args.extend(["-crf".into(), crf.to_string()]);
            args
        }
        None => software_args(codec, crf),
    }
}

/// Apply additional user-provided ffmpeg arguments, shell-style parsed so
/// quoted strings with spaces survive.
fn apply_extra_args(cmd: &mut Command, extra_args: &str) {
    if extra_args.is_empty() {
        return;
    }
    if let Some(args) = shlex::split(extra_args) {
        for arg in args {
            cmd.arg(arg);
        }
    } else {
        // Unbalanced quotes; fall back to whitespace splitting.
        for arg in extra_args.split_whitespace() {
            cmd.arg(arg);
        }
    }
}

/// Assemble the full ffmpeg invocation for one job: input, encoder
/// selection, audio stream copy, machine-readable progress on stdout,
/// and unconditional overwrite of the output path.
pub fn build_ffmpeg_cmd(job: &Job, extra_args: &str) -> Command {
    let mut cmd = Command::new("ffmpeg");
    cmd.arg("-i").arg(&job.input_path);
    cmd.args(encoder_args(job.codec, job.crf, job.hw_accel));

    // Audio is never re-encoded; that is a deliberate scope boundary.
    cmd.arg("-c:a").arg("copy");

    // key=value progress telemetry on stdout, no tty stats on stderr.
    cmd.arg("-progress").arg("-").arg("-nostats");

    apply_extra_args(&mut cmd, extra_args);

    cmd.arg("-y").arg(&job.output_path);
    cmd
}

/// Render a command as a copy-pasteable shell line (dry-run output).
pub fn format_cmd(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().to_string()];
    parts.extend(cmd.get_args().map(|arg| {
        let s = arg.to_string_lossy();
        if s.contains(' ') {
            format!("\"{s}\"")
        } else {
            s.to_string()
        }
    }));
    parts.join(" ")
}

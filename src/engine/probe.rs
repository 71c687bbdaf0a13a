// Media metadata queries using ffprobe

use std::path::Path;
use std::process::Command;
use tracing::debug;

use super::error::EncodeError;

/// Check that ffmpeg is available and return its version line.
pub fn ffmpeg_version() -> Result<String, EncodeError> {
    tool_version("ffmpeg")
}

/// Check that ffprobe is available and return its version line.
pub fn ffprobe_version() -> Result<String, EncodeError> {
    tool_version("ffprobe")
}

/// One-shot precondition check for both external tools.
pub fn check_tools() -> Result<(), EncodeError> {
    ffmpeg_version()?;
    ffprobe_version()?;
    Ok(())
}

fn tool_version(tool: &'static str) -> Result<String, EncodeError> {
    let output = Command::new(tool)
        .arg("-version")
        .output()
        .map_err(|_| EncodeError::ToolUnavailable(tool))?;
    if !output.status.success() {
        return Err(EncodeError::ToolUnavailable(tool));
    }
    let version = String::from_utf8_lossy(&output.stdout);
    Ok(version.lines().next().unwrap_or("unknown version").to_string())
}

/// Parse an ffprobe duration value; only positive values count.
pub fn parse_duration(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|d| d.is_finite() && *d > 0.0)
}

/// Run ffprobe requesting a single field in plain key-stripped output.
fn probe_field(path: &Path, args: &[&str]) -> Result<String, EncodeError> {
    let output = Command::new("ffprobe")
        .args(["-v", "error"])
        .args(args)
        .args(["-of", "default=noprint_wrappers=1:nokey=1"])
        .arg(path)
        .output()
        .map_err(|_| EncodeError::ToolUnavailable("ffprobe"))?;

    if !output.status.success() {
        return Err(EncodeError::ProbeFailed {
            path: path.to_path_buf(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Container duration of `path` in seconds.
pub fn duration_secs(path: &Path) -> Result<f64, EncodeError> {
    if !path.exists() {
        return Err(EncodeError::InputNotFound(path.to_path_buf()));
    }

    let text = probe_field(path, &["-show_entries", "format=duration"])?;
    parse_duration(&text).ok_or_else(|| EncodeError::ProbeFailed {
        path: path.to_path_buf(),
        reason: format!("duration not a positive number: `{text}`"),
    })
}

/// Bitrate of the primary video stream in bits per second.
///
/// Falls back to `fileSizeBits / duration` when the stream field is
/// absent or unparsable (common for mkv/webm). Returns 0 when the
/// duration is also unavailable; callers must treat 0 as "unknown".
pub fn video_bitrate(path: &Path) -> u64 {
    if let Ok(text) = probe_field(
        path,
        &["-select_streams", "v:0", "-show_entries", "stream=bit_rate"],
    ) {
        if let Ok(bitrate) = text.parse::<u64>() {
            if bitrate > 0 {
                return bitrate;
            }
        }
    }

    debug!(path = %path.display(), "stream bit_rate unavailable, approximating from file size");

    let Ok(meta) = std::fs::metadata(path) else {
        return 0;
    };
    match duration_secs(path) {
        Ok(duration) => (meta.len() as f64 * 8.0 / duration) as u64,
        Err(_) => 0,
    }
}

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::types::COMPRESSED_MARKER;

/// Video file extensions considered for batch input.
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "mov", "avi", "flv", "m4v", "wmv"];

pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// True when the file name carries the compressed-output marker, meaning
/// it is the output of a previous run and must not be re-processed.
pub fn is_prior_output(path: &Path) -> bool {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| stem.contains(COMPRESSED_MARKER))
        .unwrap_or(false)
}

/// Scan a directory recursively, invoking the callback for each video
/// file that is not a prior output.
pub fn scan_streaming<F>(root: &Path, mut on_file: F)
where
    F: FnMut(PathBuf),
{
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_file() && is_video_file(path) && !is_prior_output(path) {
            on_file(path.to_path_buf());
        }
    }
}

/// Collect batch input files in a deterministic (sorted) order.
pub fn scan(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    scan_streaming(root, |path| files.push(path));
    files.sort();
    files
}

use std::path::PathBuf;
use thiserror::Error;

/// Error taxonomy for the orchestration engine.
///
/// Stream-read errors during progress monitoring are deliberately absent:
/// they are recovered locally (treated as end of stream) and the process
/// exit status decides the outcome.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("`{0}` not found. Is it installed and in PATH?")]
    ToolUnavailable(&'static str),

    #[error("input file not found: {0}")]
    InputNotFound(PathBuf),

    #[error("could not determine duration of {path}: {reason}")]
    ProbeFailed { path: PathBuf, reason: String },

    #[error("unsupported codec: {0}")]
    UnsupportedCodec(String),

    #[error("failed to spawn encoder process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("encoder exited with code {code}: {stderr_tail}")]
    EncodeFailed { code: i32, stderr_tail: String },

    #[error("encoding was cancelled")]
    Cancelled,

    #[error("process error: {0}")]
    Process(#[source] std::io::Error),
}

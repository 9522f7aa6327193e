// Error types for the extraction pipeline stages

use std::time::Duration;

use thiserror::Error;

use super::diagnostics::ProbeFailureReason;

pub type Result<T> = std::result::Result<T, MediaInfoError>;

#[derive(Debug, Error)]
pub enum MediaInfoError {
    /// Remote transport failed while opening or streaming the file
    #[error("Transport error: {0}")]
    Transport(String),

    /// Remote object yielded no bytes at all
    #[error("Remote file yielded no data")]
    EmptySource,

    /// Too little data to be worth probing
    #[error("Insufficient data: received {received} bytes, need at least {required}")]
    InsufficientData { received: u64, required: u64 },

    /// A stage exceeded its wall-clock budget
    #[error("{stage} timed out after {}s", .after.as_secs())]
    Timeout { stage: &'static str, after: Duration },

    /// ffprobe binary not found
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// ffprobe ran but exited unsuccessfully
    #[error("ffprobe exited with {status}: {reason:?}")]
    ProbeFailed {
        status: String,
        reason: ProbeFailureReason,
    },

    /// ffprobe output did not match the expected schema
    #[error("Parse error: {0}")]
    Parse(String),

    /// Catalog lookup failed
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// No static ffprobe build for this platform
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// HTTP failure while downloading the probe binary
    #[error("Download error: {0}")]
    Download(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MediaInfoError {
    /// Short stage-independent label used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::EmptySource => "empty_source",
            Self::InsufficientData { .. } => "insufficient_data",
            Self::Timeout { .. } => "timeout",
            Self::ToolNotFound(_) => "tool_not_found",
            Self::ProbeFailed { .. } => "probe_failed",
            Self::Parse(_) | Self::Json(_) => "parse",
            Self::Catalog(_) => "catalog",
            Self::UnsupportedPlatform(_) => "unsupported_platform",
            Self::Download(_) => "download",
            Self::Io(_) => "io",
        }
    }
}

// Probe diagnostics - identifies why ffprobe rejected a scratch file
//
// Only used to enrich log lines; every reason leads to the same heuristic
// fallback.

use serde::{Deserialize, Serialize};

/// Reasons why ffprobe might fail on a prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeFailureReason {
    /// Index/header lives past the downloaded prefix (e.g. MP4 with trailing moov)
    TruncatedInput,

    /// Bytes are not a recognizable container
    InvalidData,

    /// Container recognized but not supported by this ffprobe build
    UnsupportedFormat,

    /// Scratch file or binary not accessible
    PermissionDenied,

    /// Killed by a signal or timed out (no exit code)
    Terminated,

    /// Generic/unknown failure
    Unknown,
}

impl ProbeFailureReason {
    /// Whether a larger prefix might let ffprobe succeed
    pub fn larger_prefix_might_help(&self) -> bool {
        matches!(self, Self::TruncatedInput)
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::TruncatedInput => "Container index lies beyond the downloaded prefix",
            Self::InvalidData => "Data is not a recognizable media container",
            Self::UnsupportedFormat => "Format not supported by ffprobe",
            Self::PermissionDenied => "Permission denied",
            Self::Terminated => "ffprobe was terminated",
            Self::Unknown => "Unknown ffprobe failure",
        }
    }
}

/// Analyze ffprobe stderr and return the most specific reason
pub fn diagnose_probe_error(stderr: &str) -> ProbeFailureReason {
    let lower = stderr.to_lowercase();

    // Check patterns in order of specificity

    if lower.contains("moov atom not found")
        || lower.contains("end of file")
        || lower.contains("truncat")
        || lower.contains("partial file")
        || lower.contains("stream ends prematurely")
    {
        return ProbeFailureReason::TruncatedInput;
    }

    if lower.contains("permission denied") || lower.contains("operation not permitted") {
        return ProbeFailureReason::PermissionDenied;
    }

    if lower.contains("unknown format")
        || lower.contains("not supported")
        || lower.contains("unsupported")
        || lower.contains("no decoder")
    {
        return ProbeFailureReason::UnsupportedFormat;
    }

    if lower.contains("invalid data found")
        || lower.contains("could not find codec parameters")
        || lower.contains("ebml header parsing failed")
    {
        return ProbeFailureReason::InvalidData;
    }

    ProbeFailureReason::Unknown
}

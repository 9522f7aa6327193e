// Common data models for media info extraction

use serde::{Deserialize, Serialize};

/// Sentinel for a value the precise path could not determine
pub const UNKNOWN: &str = "Unknown";

/// Sentinel for a value the heuristic path never attempts to estimate
pub const NOT_AVAILABLE: &str = "Not Available";

/// Language tag used when a stream carries none
pub const UNDETERMINED_LANGUAGE: &str = "und";

/// Where a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provenance {
    /// Probed with ffprobe
    Precise,
    /// Estimated from name, declared size and MIME type
    Heuristic,
}

impl Provenance {
    pub fn is_precise(&self) -> bool {
        matches!(self, Self::Precise)
    }
}

/// First video stream of a file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoTrack {
    pub codec: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Raw rational as reported by ffprobe (e.g. "24000/1001")
    pub frame_rate: String,
}

impl VideoTrack {
    /// "1920x1080", or "Unknown" when either side is missing
    pub fn resolution(&self) -> String {
        match (self.width, self.height) {
            (Some(w), Some(h)) => format!("{}x{}", w, h),
            _ => UNKNOWN.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrack {
    pub codec: String,
    pub language: String,
    pub title: String,
    pub channels: Option<u32>,
    pub sample_rate: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub codec: String,
    pub language: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
}

/// Normalized result of one extraction.
///
/// Every `String` field holds either a real value or one of the sentinels
/// above, never an empty string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub format: String,
    pub duration: String,
    pub size: String,
    pub bitrate: String,
    pub video: Option<VideoTrack>,
    pub audio_tracks: Vec<AudioTrack>,
    pub subtitle_tracks: Vec<SubtitleTrack>,
    pub chapters: Vec<Chapter>,
    pub provenance: Provenance,
}

impl MediaRecord {
    /// All display strings, in a stable order (used by totality checks)
    pub fn display_fields(&self) -> Vec<&str> {
        let mut fields = vec![
            self.format.as_str(),
            self.duration.as_str(),
            self.size.as_str(),
            self.bitrate.as_str(),
        ];
        if let Some(video) = &self.video {
            fields.push(video.codec.as_str());
            fields.push(video.frame_rate.as_str());
        }
        for audio in &self.audio_tracks {
            fields.extend([
                audio.codec.as_str(),
                audio.language.as_str(),
                audio.title.as_str(),
            ]);
        }
        for sub in &self.subtitle_tracks {
            fields.extend([sub.codec.as_str(), sub.language.as_str(), sub.title.as_str()]);
        }
        for chapter in &self.chapters {
            fields.push(chapter.title.as_str());
        }
        fields
    }
}

/// File details as stored by the bot's catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub file_name: String,
    pub file_size: Option<u64>,
    pub mime_type: Option<String>,
}

/// Returns `value` unless it is blank, in which case the sentinel
pub(crate) fn or_sentinel(value: Option<&str>, sentinel: &str) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => sentinel.to_string(),
    }
}

/// Lowercased extension of a file name ("Movie.1080p.MKV" -> "mkv")
pub(crate) fn file_extension(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.contains(char::is_whitespace) {
        return None;
    }
    Some(ext.to_lowercase())
}

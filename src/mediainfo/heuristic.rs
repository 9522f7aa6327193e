// Heuristic analyzer - filename/MIME based estimation, the last fallback
//
// Token lists and their precedence are fixed; they are approximate by
// nature and kept stable so the reports users see do not drift.

use lazy_static::lazy_static;
use std::collections::HashMap;
use tracing::debug;

use super::display::format_size;
use super::models::{
    file_extension, AudioTrack, MediaRecord, Provenance, SubtitleTrack, VideoTrack,
    NOT_AVAILABLE, UNDETERMINED_LANGUAGE, UNKNOWN,
};

lazy_static! {
    static ref MIME_FORMATS: HashMap<&'static str, &'static str> = HashMap::from([
        ("video/mp4", "MP4"),
        ("video/x-matroska", "MKV"),
        ("video/x-msvideo", "AVI"),
        ("video/quicktime", "MOV"),
        ("video/webm", "WEBM"),
        ("video/x-flv", "FLV"),
        ("video/x-ms-wmv", "WMV"),
        ("video/3gpp", "3GP"),
        ("video/mp2t", "TS"),
        ("audio/mpeg", "MP3"),
        ("audio/mp4", "M4A"),
        ("audio/aac", "AAC"),
        ("audio/flac", "FLAC"),
        ("audio/ogg", "OGG"),
        ("audio/opus", "OPUS"),
        ("audio/wav", "WAV"),
        ("audio/x-wav", "WAV"),
        ("audio/x-ms-wma", "WMA"),
    ]);

    static ref EXTENSION_FORMATS: HashMap<&'static str, &'static str> = HashMap::from([
        ("mp4", "MP4"),
        ("mkv", "MKV"),
        ("avi", "AVI"),
        ("mov", "MOV"),
        ("wmv", "WMV"),
        ("flv", "FLV"),
        ("webm", "WEBM"),
        ("m4v", "M4V"),
        ("3gp", "3GP"),
        ("ts", "TS"),
        ("mp3", "MP3"),
        ("flac", "FLAC"),
        ("aac", "AAC"),
        ("ogg", "OGG"),
        ("wma", "WMA"),
        ("wav", "WAV"),
        ("m4a", "M4A"),
        ("opus", "OPUS"),
    ]);
}

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v", "3gp", "ts"];

/// Checked in order; the first hit wins
const RESOLUTION_TOKENS: &[(&[&str], u32, u32)] = &[
    (&["4k", "2160p"], 3840, 2160),
    (&["1080p"], 1920, 1080),
    (&["720p"], 1280, 720),
    (&["480p"], 854, 480),
];

/// (token, track title, language tag); every hit adds a track
const AUDIO_TOKENS: &[(&str, &str, &str)] = &[
    ("hindi", "Hindi", "hin"),
    ("english", "English", "eng"),
    ("tamil", "Tamil", "tam"),
    ("telugu", "Telugu", "tel"),
    ("dual", "Dual Audio", "mul"),
    ("multi", "Multi Audio", "mul"),
];

const SUBTITLE_TOKENS: &[&str] = &["subtitle", "sub", "srt"];

/// True for extensions the pipeline treats as audio/video containers
pub fn is_media_extension(ext: &str) -> bool {
    EXTENSION_FORMATS.contains_key(ext)
}

fn is_media_mime(mime: &str) -> bool {
    mime.starts_with("video/") || mime.starts_with("audio/")
}

/// Positive evidence that a file is *not* media: a known non-media
/// extension with no audio/video MIME to contradict it.
pub fn is_known_non_media(file_name: &str, declared_mime: Option<&str>) -> bool {
    let mime = declared_mime.map(|m| m.trim().to_lowercase());
    if mime.as_deref().is_some_and(is_media_mime) {
        return false;
    }
    match file_extension(file_name) {
        Some(ext) => !is_media_extension(&ext),
        None => mime.is_some_and(|m| !m.is_empty()),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicAnalyzer;

impl HeuristicAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Best-effort record from catalog metadata alone. Never fails.
    pub fn estimate(
        &self,
        file_id: &str,
        file_name: &str,
        declared_size: Option<u64>,
        declared_mime: Option<&str>,
    ) -> MediaRecord {
        let name_lower = file_name.to_lowercase();
        let mime = declared_mime
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty());
        let ext = file_extension(file_name);

        let format = mime
            .as_deref()
            .and_then(|m| MIME_FORMATS.get(m))
            .or_else(|| ext.as_deref().and_then(|e| EXTENSION_FORMATS.get(e)))
            .map(|f| f.to_string())
            .or_else(|| ext.as_ref().map(|e| e.to_uppercase()))
            .unwrap_or_else(|| UNKNOWN.to_string());

        let is_video = mime.as_deref().is_some_and(|m| m.starts_with("video/"))
            || ext.as_deref().is_some_and(|e| VIDEO_EXTENSIONS.contains(&e));
        let plausibly_media = mime.as_deref().is_some_and(is_media_mime)
            || ext.as_deref().is_some_and(is_media_extension)
            || (mime.is_none() && ext.is_none());

        let video = is_video.then(|| {
            let (width, height) = guess_resolution(&name_lower)
                .map(|(w, h)| (Some(w), Some(h)))
                .unwrap_or((None, None));
            VideoTrack {
                codec: UNKNOWN.to_string(),
                width,
                height,
                frame_rate: UNKNOWN.to_string(),
            }
        });

        let mut audio_tracks: Vec<AudioTrack> = AUDIO_TOKENS
            .iter()
            .filter(|(token, _, _)| name_lower.contains(token))
            .map(|(_, title, language)| AudioTrack {
                codec: UNKNOWN.to_string(),
                language: language.to_string(),
                title: title.to_string(),
                channels: None,
                sample_rate: None,
            })
            .collect();
        if audio_tracks.is_empty() && plausibly_media {
            audio_tracks.push(AudioTrack {
                codec: UNKNOWN.to_string(),
                language: UNDETERMINED_LANGUAGE.to_string(),
                title: "Audio Track".to_string(),
                channels: None,
                sample_rate: None,
            });
        }

        let subtitle_tracks = if SUBTITLE_TOKENS.iter().any(|t| name_lower.contains(t)) {
            vec![SubtitleTrack {
                codec: UNKNOWN.to_string(),
                language: "eng".to_string(),
                title: "English".to_string(),
            }]
        } else {
            Vec::new()
        };

        debug!(
            file_id,
            format = %format,
            video = video.is_some(),
            audio_tracks = audio_tracks.len(),
            "heuristic estimate"
        );

        MediaRecord {
            format,
            duration: NOT_AVAILABLE.to_string(),
            size: declared_size
                .map(format_size)
                .unwrap_or_else(|| UNKNOWN.to_string()),
            bitrate: NOT_AVAILABLE.to_string(),
            video,
            audio_tracks,
            subtitle_tracks,
            chapters: Vec::new(),
            provenance: Provenance::Heuristic,
        }
    }
}

fn guess_resolution(name_lower: &str) -> Option<(u32, u32)> {
    RESOLUTION_TOKENS
        .iter()
        .find(|(tokens, _, _)| tokens.iter().any(|t| name_lower.contains(t)))
        .map(|(_, w, h)| (*w, *h))
}

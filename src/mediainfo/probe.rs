// Probe runner - ffprobe against a scratch prefix
//
// Output is requested as JSON (format, streams, chapters) and normalized
// into a precise MediaRecord. Every failure (missing binary, non-zero exit,
// timeout, bad JSON) comes back as Err for the orchestrator to route.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, warn};

use super::chunk::ScratchFile;
use super::config::MediaInfoConfig;
use super::diagnostics::{diagnose_probe_error, ProbeFailureReason};
use super::display::{format_bitrate, format_duration, format_size};
use super::errors::{MediaInfoError, Result};
use super::models::{
    file_extension, or_sentinel, AudioTrack, Chapter, MediaRecord, Provenance, SubtitleTrack,
    VideoTrack, UNDETERMINED_LANGUAGE, UNKNOWN,
};
use super::tools::ProbeLocator;
use super::utils::run_output_with_timeout;

/// What the caller knows about the file beyond its bytes
#[derive(Debug, Clone, Default)]
pub struct ProbeContext {
    pub file_name: String,
    /// Catalog size; the prefix alone cannot tell the real size
    pub declared_size: Option<u64>,
}

pub struct ProbeRunner {
    binary: Option<PathBuf>,
    timeout: Duration,
    max_chapters: usize,
}

impl ProbeRunner {
    pub fn new(config: &MediaInfoConfig) -> Self {
        let binary = ProbeLocator::new(config.ffprobe_path.clone())
            .resolve()
            .map(|(path, _)| path);
        if binary.is_none() {
            warn!("ffprobe not found; media info will use filename-based estimation");
        }

        Self {
            binary,
            timeout: config.probe_timeout,
            max_chapters: config.max_chapters,
        }
    }

    /// Whether there is any binary to try
    pub fn is_available(&self) -> bool {
        self.binary.is_some()
    }

    #[cfg(test)]
    pub(crate) fn with_binary(mut self, binary: Option<PathBuf>) -> Self {
        self.binary = binary;
        self
    }

    fn build_args(scratch: &ScratchFile) -> Vec<std::ffi::OsString> {
        let mut args: Vec<std::ffi::OsString> = [
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            "-show_chapters",
        ]
        .into_iter()
        .map(std::ffi::OsString::from)
        .collect();
        args.push(scratch.path().as_os_str().to_owned());
        args
    }

    pub async fn probe(&self, scratch: &ScratchFile, ctx: &ProbeContext) -> Result<MediaRecord> {
        let binary = self
            .binary
            .as_ref()
            .ok_or_else(|| MediaInfoError::ToolNotFound("ffprobe".to_string()))?;

        let started = Instant::now();
        let output =
            run_output_with_timeout(binary.as_os_str(), Self::build_args(scratch), self.timeout)
                .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = match output.status.code() {
                Some(_) => diagnose_probe_error(&stderr),
                None => ProbeFailureReason::Terminated,
            };
            warn!(
                status = %output.status,
                reason = reason.description(),
                larger_prefix_might_help = reason.larger_prefix_might_help(),
                stderr = %stderr.trim(),
                "ffprobe failed"
            );
            return Err(MediaInfoError::ProbeFailed {
                status: output.status.to_string(),
                reason,
            });
        }

        let record = parse_probe_output(&output.stdout, ctx, self.max_chapters)?;
        debug!(
            bytes = scratch.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            format = %record.format,
            "ffprobe succeeded"
        );
        Ok(record)
    }
}

/// ffprobe prints most numbers as JSON strings, some as numbers
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Number {
    Int(u64),
    Float(f64),
    Text(String),
}

impl Number {
    fn as_f64(&self) -> Option<f64> {
        let value = match self {
            Self::Int(n) => Some(*n as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.trim().parse::<f64>().ok(),
        };
        value.filter(|f| f.is_finite())
    }

    fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Float(f) if *f >= 0.0 => Some(f.floor() as u64),
            Self::Float(_) => None,
            Self::Text(s) => {
                let s = s.trim();
                s.parse::<u64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().filter(|f| *f >= 0.0).map(|f| f.floor() as u64))
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Tags {
    language: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    format_name: Option<String>,
    duration: Option<Number>,
    size: Option<Number>,
    bit_rate: Option<Number>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<Number>,
    height: Option<Number>,
    r_frame_rate: Option<String>,
    channels: Option<Number>,
    sample_rate: Option<Number>,
    #[serde(default)]
    tags: Tags,
}

#[derive(Debug, Deserialize)]
struct ProbeChapter {
    start_time: Option<Number>,
    end_time: Option<Number>,
    #[serde(default)]
    tags: Tags,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    chapters: Vec<ProbeChapter>,
}

fn small(n: &Option<Number>) -> Option<u32> {
    n.as_ref()
        .and_then(Number::as_u64)
        .and_then(|v| u32::try_from(v).ok())
}

/// Normalize ffprobe JSON into a precise record
pub(crate) fn parse_probe_output(
    stdout: &[u8],
    ctx: &ProbeContext,
    max_chapters: usize,
) -> Result<MediaRecord> {
    let parsed: ProbeOutput = serde_json::from_slice(stdout)?;
    if parsed.format.is_none() && parsed.streams.is_empty() {
        return Err(MediaInfoError::Parse(
            "ffprobe output has neither format nor streams".to_string(),
        ));
    }
    let format_info = parsed.format.unwrap_or_default();

    let format = match format_info.format_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_uppercase(),
        _ => file_extension(&ctx.file_name)
            .map(|ext| ext.to_uppercase())
            .unwrap_or_else(|| UNKNOWN.to_string()),
    };

    let duration = format_info
        .duration
        .as_ref()
        .and_then(Number::as_f64)
        .map(format_duration)
        .unwrap_or_else(|| UNKNOWN.to_string());

    let size = ctx
        .declared_size
        .filter(|s| *s > 0)
        .or_else(|| format_info.size.as_ref().and_then(Number::as_u64))
        .map(format_size)
        .unwrap_or_else(|| UNKNOWN.to_string());

    let bitrate = format_info
        .bit_rate
        .as_ref()
        .and_then(Number::as_u64)
        .map(format_bitrate)
        .unwrap_or_else(|| UNKNOWN.to_string());

    let mut video = None;
    let mut audio_tracks = Vec::new();
    let mut subtitle_tracks = Vec::new();

    for stream in &parsed.streams {
        match stream.codec_type.as_deref() {
            Some("video") if video.is_none() => {
                video = Some(VideoTrack {
                    codec: or_sentinel(stream.codec_name.as_deref(), UNKNOWN),
                    width: small(&stream.width),
                    height: small(&stream.height),
                    frame_rate: or_sentinel(stream.r_frame_rate.as_deref(), UNKNOWN),
                });
            }
            Some("audio") => {
                let ordinal = audio_tracks.len() + 1;
                audio_tracks.push(AudioTrack {
                    codec: or_sentinel(stream.codec_name.as_deref(), UNKNOWN),
                    language: or_sentinel(stream.tags.language.as_deref(), UNDETERMINED_LANGUAGE),
                    title: or_sentinel(stream.tags.title.as_deref(), &format!("Audio {}", ordinal)),
                    channels: small(&stream.channels),
                    sample_rate: small(&stream.sample_rate),
                });
            }
            Some("subtitle") => {
                let ordinal = subtitle_tracks.len() + 1;
                subtitle_tracks.push(SubtitleTrack {
                    codec: or_sentinel(stream.codec_name.as_deref(), UNKNOWN),
                    language: or_sentinel(stream.tags.language.as_deref(), UNDETERMINED_LANGUAGE),
                    title: or_sentinel(
                        stream.tags.title.as_deref(),
                        &format!("Subtitle {}", ordinal),
                    ),
                });
            }
            _ => {}
        }
    }

    let chapters = parsed
        .chapters
        .iter()
        .take(max_chapters)
        .enumerate()
        .map(|(i, chapter)| Chapter {
            title: or_sentinel(chapter.tags.title.as_deref(), &format!("Chapter {}", i + 1)),
            start_seconds: chapter.start_time.as_ref().and_then(Number::as_f64).unwrap_or(0.0),
            end_seconds: chapter.end_time.as_ref().and_then(Number::as_f64).unwrap_or(0.0),
        })
        .collect();

    Ok(MediaRecord {
        format,
        duration,
        size,
        bitrate,
        video,
        audio_tracks,
        subtitle_tracks,
        chapters,
        provenance: Provenance::Precise,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080, "r_frame_rate": "24000/1001"},
            {"index": 1, "codec_type": "audio", "codec_name": "aac", "channels": 6, "sample_rate": "48000", "tags": {"language": "hin", "title": "Hindi 5.1"}},
            {"index": 2, "codec_type": "audio", "codec_name": "ac3", "channels": 2, "sample_rate": "48000"},
            {"index": 3, "codec_type": "video", "codec_name": "mjpeg", "width": 320, "height": 240},
            {"index": 4, "codec_type": "subtitle", "codec_name": "subrip", "tags": {"language": "eng"}},
            {"index": 5, "codec_type": "attachment", "codec_name": "ttf"}
        ],
        "chapters": [
            {"id": 0, "start_time": "0.000000", "end_time": "300.000000", "tags": {"title": "Opening"}},
            {"id": 1, "start_time": "300.000000", "end_time": "600.000000"},
            {"id": 2, "start_time": "600.000000", "end_time": "900.000000"},
            {"id": 3, "start_time": "900.000000", "end_time": "1200.000000"},
            {"id": 4, "start_time": "1200.000000", "end_time": "1500.000000"},
            {"id": 5, "start_time": "1500.000000", "end_time": "1800.000000"}
        ],
        "format": {
            "filename": "/tmp/mediainfo-abc.mkv",
            "format_name": "matroska,webm",
            "duration": "3723.450000",
            "size": "2097152",
            "bit_rate": "4500999"
        }
    }"#;

    fn ctx(name: &str, size: Option<u64>) -> ProbeContext {
        ProbeContext {
            file_name: name.to_string(),
            declared_size: size,
        }
    }

    #[test]
    fn test_full_parse() {
        let record = parse_probe_output(SAMPLE.as_bytes(), &ctx("Movie.mkv", None), 5).unwrap();

        assert_eq!(record.format, "MATROSKA,WEBM");
        assert_eq!(record.duration, "1h 2m 3s");
        assert_eq!(record.size, "2.0 MB");
        assert_eq!(record.bitrate, "4500 kbps");
        assert_eq!(record.provenance, Provenance::Precise);

        let video = record.video.as_ref().unwrap();
        assert_eq!(video.codec, "h264");
        assert_eq!(video.resolution(), "1920x1080");
        assert_eq!(video.frame_rate, "24000/1001");

        assert_eq!(record.audio_tracks.len(), 2);
        assert_eq!(record.audio_tracks[0].title, "Hindi 5.1");
        assert_eq!(record.audio_tracks[0].language, "hin");
        assert_eq!(record.audio_tracks[0].channels, Some(6));
        assert_eq!(record.audio_tracks[0].sample_rate, Some(48000));
        assert_eq!(record.audio_tracks[1].title, "Audio 2");
        assert_eq!(record.audio_tracks[1].language, UNDETERMINED_LANGUAGE);

        assert_eq!(record.subtitle_tracks.len(), 1);
        assert_eq!(record.subtitle_tracks[0].title, "Subtitle 1");
        assert_eq!(record.subtitle_tracks[0].codec, "subrip");
    }

    #[test]
    fn test_chapters_capped_and_titled() {
        let record = parse_probe_output(SAMPLE.as_bytes(), &ctx("Movie.mkv", None), 5).unwrap();
        assert_eq!(record.chapters.len(), 5);
        assert_eq!(record.chapters[0].title, "Opening");
        assert_eq!(record.chapters[1].title, "Chapter 2");
        assert_eq!(record.chapters[4].start_seconds, 1200.0);
        assert_eq!(record.chapters[4].end_seconds, 1500.0);
    }

    #[test]
    fn test_declared_size_preferred() {
        let record =
            parse_probe_output(SAMPLE.as_bytes(), &ctx("Movie.mkv", Some(1_073_741_824)), 5).unwrap();
        assert_eq!(record.size, "1.0 GB");
    }

    #[test]
    fn test_sparse_output_uses_sentinels() {
        let json = r#"{"format": {"bit_rate": "0"}, "streams": [{"codec_type": "audio"}]}"#;
        let record = parse_probe_output(json.as_bytes(), &ctx("song.mp3", None), 5).unwrap();

        assert_eq!(record.format, "MP3");
        assert_eq!(record.duration, UNKNOWN);
        assert_eq!(record.size, UNKNOWN);
        assert_eq!(record.bitrate, UNKNOWN);
        assert!(record.video.is_none());
        assert_eq!(record.audio_tracks[0].codec, UNKNOWN);
        assert_eq!(record.audio_tracks[0].title, "Audio 1");
        assert!(record.display_fields().iter().all(|f| !f.is_empty()));
    }

    #[test]
    fn test_numeric_json_values_accepted() {
        let json = r#"{"format": {"format_name": "mp3", "duration": 45.9, "size": 1536, "bit_rate": 128000}}"#;
        let record = parse_probe_output(json.as_bytes(), &ctx("", None), 5).unwrap();
        assert_eq!(record.duration, "45s");
        assert_eq!(record.size, "1.5 KB");
        assert_eq!(record.bitrate, "128 kbps");
    }

    #[test]
    fn test_no_format_name_and_no_extension() {
        let json = r#"{"format": {}, "streams": []}"#;
        let record = parse_probe_output(json.as_bytes(), &ctx("noext", None), 5).unwrap();
        assert_eq!(record.format, UNKNOWN);
    }

    #[test]
    fn test_malformed_output() {
        assert!(parse_probe_output(b"not json", &ctx("a.mkv", None), 5).is_err());
        let err = parse_probe_output(b"{}", &ctx("a.mkv", None), 5).unwrap_err();
        assert!(matches!(err, MediaInfoError::Parse(_)));
    }
}

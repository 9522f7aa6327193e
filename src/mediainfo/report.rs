// Telegram HTML rendering of a MediaRecord

use std::fmt::Write;

use super::display::{format_timestamp, frame_rate_fps};
use super::models::{MediaRecord, UNKNOWN};

const MAX_LISTED_TRACKS: usize = 3;

/// Escape text for Telegram's HTML parse mode
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render `record` as a chat message for the file shown as `display_name`
pub fn render(record: &MediaRecord, display_name: &str) -> String {
    let mut msg = String::new();

    // fmt::Write into a String cannot fail
    let _ = writeln!(msg, "📋 <b>Media Information</b>\n");
    let _ = writeln!(msg, "📁 <b>File:</b> <code>{}</code>", escape_html(display_name));
    let _ = writeln!(msg, "📦 <b>Format:</b> {}", escape_html(&record.format));
    let _ = writeln!(msg, "⏱ <b>Duration:</b> {}", record.duration);
    let _ = writeln!(msg, "📏 <b>Size:</b> {}", record.size);
    let _ = writeln!(msg, "🔗 <b>Bitrate:</b> {}", record.bitrate);
    msg.push('\n');

    if let Some(video) = &record.video {
        let _ = write!(msg, "🎬 <b>Video:</b> {}", escape_html(&video.codec));
        let resolution = video.resolution();
        if resolution != UNKNOWN {
            let _ = write!(msg, " ({})", resolution);
        }
        if let Some(fps) = frame_rate_fps(&video.frame_rate) {
            let _ = write!(msg, " @ {} fps", fps);
        }
        msg.push('\n');
    }

    if !record.audio_tracks.is_empty() {
        let _ = writeln!(msg, "🔊 <b>Audio Tracks:</b> {}", record.audio_tracks.len());
        for audio in record.audio_tracks.iter().take(MAX_LISTED_TRACKS) {
            let _ = write!(
                msg,
                "   • {} ({}) - {}",
                escape_html(&audio.title),
                escape_html(&audio.language),
                escape_html(&audio.codec)
            );
            if let Some(channels) = audio.channels {
                let _ = write!(msg, " - {}ch", channels);
            }
            msg.push('\n');
        }
        push_remainder(&mut msg, record.audio_tracks.len());
    }

    if !record.subtitle_tracks.is_empty() {
        let _ = writeln!(msg, "💬 <b>Subtitles:</b> {}", record.subtitle_tracks.len());
        for sub in record.subtitle_tracks.iter().take(MAX_LISTED_TRACKS) {
            let _ = writeln!(
                msg,
                "   • {} ({})",
                escape_html(&sub.title),
                escape_html(&sub.language)
            );
        }
        push_remainder(&mut msg, record.subtitle_tracks.len());
    }

    if !record.chapters.is_empty() {
        let _ = writeln!(msg, "📑 <b>Chapters:</b> {}", record.chapters.len());
        for chapter in &record.chapters {
            let _ = writeln!(
                msg,
                "   • {} [{} - {}]",
                escape_html(&chapter.title),
                format_timestamp(chapter.start_seconds),
                format_timestamp(chapter.end_seconds)
            );
        }
    }

    if !record.provenance.is_precise() {
        msg.push_str("\nℹ️ <i>Estimated from the file name. Install ffprobe for precise details.</i>\n");
    }

    msg
}

fn push_remainder(msg: &mut String, total: usize) {
    if total > MAX_LISTED_TRACKS {
        let _ = writeln!(msg, "   • ... and {} more", total - MAX_LISTED_TRACKS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mediainfo::heuristic::HeuristicAnalyzer;
    use crate::mediainfo::models::{AudioTrack, Chapter, Provenance, SubtitleTrack, VideoTrack};

    fn precise() -> MediaRecord {
        let audio = |i: usize| AudioTrack {
            codec: "aac".to_string(),
            language: "eng".to_string(),
            title: format!("Audio {}", i),
            channels: if i == 1 { Some(2) } else { None },
            sample_rate: Some(48000),
        };
        MediaRecord {
            format: "MATROSKA,WEBM".to_string(),
            duration: "1h 2m 3s".to_string(),
            size: "1.0 GB".to_string(),
            bitrate: "4500 kbps".to_string(),
            video: Some(VideoTrack {
                codec: "h264".to_string(),
                width: Some(1920),
                height: Some(1080),
                frame_rate: "24000/1001".to_string(),
            }),
            audio_tracks: (1..=5).map(audio).collect(),
            subtitle_tracks: vec![SubtitleTrack {
                codec: "subrip".to_string(),
                language: "eng".to_string(),
                title: "<Forced> & SDH".to_string(),
            }],
            chapters: vec![Chapter {
                title: "Opening".to_string(),
                start_seconds: 0.0,
                end_seconds: 95.5,
            }],
            provenance: Provenance::Precise,
        }
    }

    #[test]
    fn test_render_precise() {
        let text = render(&precise(), "Movie.mkv");
        assert!(text.contains("<code>Movie.mkv</code>"));
        assert!(text.contains("<b>Duration:</b> 1h 2m 3s"));
        assert!(text.contains("h264 (1920x1080) @ 23.98 fps"));
        assert!(text.contains("<b>Audio Tracks:</b> 5"));
        assert!(text.contains("Audio 1 (eng) - aac - 2ch"));
        assert!(text.contains("Audio 3 (eng) - aac\n"));
        assert!(!text.contains("Audio 4"));
        assert!(text.contains("... and 2 more"));
        assert!(text.contains("Opening [0:00 - 1:35]"));
        assert!(!text.contains("Install ffprobe"));
    }

    #[test]
    fn test_render_escapes_html() {
        let text = render(&precise(), "Tom & Jerry <1080p>.mkv");
        assert!(text.contains("<code>Tom &amp; Jerry &lt;1080p&gt;.mkv</code>"));
        assert!(text.contains("&lt;Forced&gt; &amp; SDH"));
    }

    #[test]
    fn test_render_heuristic() {
        let record = HeuristicAnalyzer::new().estimate("id", "Show.S01.720p.mkv", None, None);
        let text = render(&record, "Show.S01.720p.mkv");
        assert!(text.contains("<b>Duration:</b> Not Available"));
        assert!(text.contains("<b>Size:</b> Unknown"));
        assert!(text.contains("Unknown (1280x720)\n"));
        assert!(text.contains("Install ffprobe"));
        assert!(!text.contains("Chapters"));
    }

    #[test]
    fn test_render_unknown_resolution_and_rate() {
        let mut record = precise();
        if let Some(video) = record.video.as_mut() {
            video.width = None;
            video.frame_rate = "0/0".to_string();
        }
        let text = render(&record, "x.mkv");
        assert!(text.contains("<b>Video:</b> h264\n"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
        assert_eq!(escape_html("plain"), "plain");
    }
}

// Human-readable rendering of probe numbers

use lazy_static::lazy_static;
use regex::Regex;

use super::models::UNKNOWN;

lazy_static! {
    static ref RATIONAL: Regex = Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*/\s*(\d+(?:\.\d+)?)\s*$")
        .expect("valid frame rate regex");
}

/// 45 -> "45s", 190 -> "3m 10s", 3723 -> "1h 2m 3s"
pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return UNKNOWN.to_string();
    }

    let total = seconds.floor() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Largest unit below the next 1024 boundary, one decimal place
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut size = bytes as f64;
    for unit in UNITS {
        if size < 1024.0 {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1} PB", size)
}

/// Integer kbps, "Unknown" for zero
pub fn format_bitrate(bits_per_second: u64) -> String {
    if bits_per_second == 0 {
        return UNKNOWN.to_string();
    }
    format!("{} kbps", bits_per_second / 1000)
}

/// "24000/1001" -> Some(23.98); "0/0" and garbage -> None
pub fn frame_rate_fps(rational: &str) -> Option<f64> {
    let caps = RATIONAL.captures(rational)?;
    let num: f64 = caps[1].parse().ok()?;
    let den: f64 = caps[2].parse().ok()?;
    if den == 0.0 || num == 0.0 {
        return None;
    }
    Some((num / den * 100.0).round() / 100.0)
}

/// Chapter timestamp: "1:02:03" or "2:03"
pub fn format_timestamp(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

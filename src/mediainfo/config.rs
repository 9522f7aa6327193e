// Configuration for the extraction pipeline

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Tunables for acquisition, probing and caching
#[derive(Debug, Clone)]
pub struct MediaInfoConfig {
    /// Byte ceiling for the downloaded prefix
    pub max_prefix_bytes: u64,
    /// Prefixes shorter than this are not worth probing
    pub min_prefix_bytes: u64,
    /// Wall-clock bound on the whole prefix transfer
    pub download_timeout: Duration,
    /// Wall-clock bound on one ffprobe run
    pub probe_timeout: Duration,
    /// Lifetime of a cached record
    pub cache_ttl: Duration,
    /// How many chapters a record keeps
    pub max_chapters: usize,
    /// Explicit ffprobe binary; auto-detected when `None`
    pub ffprobe_path: Option<PathBuf>,
    /// Where scratch files are created; system temp dir when `None`
    pub scratch_dir: Option<PathBuf>,
    /// Collapse concurrent requests for the same file id
    pub single_flight: bool,
}

impl Default for MediaInfoConfig {
    fn default() -> Self {
        Self {
            max_prefix_bytes: 2 * 1024 * 1024,
            min_prefix_bytes: 1024,
            download_timeout: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(30),
            cache_ttl: Duration::from_secs(300),
            max_chapters: 5,
            ffprobe_path: None,
            scratch_dir: None,
            single_flight: true,
        }
    }
}

impl MediaInfoConfig {
    /// Defaults overridden by `MEDIA_INFO_*` / `FFPROBE_PATH` variables.
    ///
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_prefix_bytes: env_parse("MEDIA_INFO_PREFIX_BYTES")
                .unwrap_or(defaults.max_prefix_bytes),
            download_timeout: env_parse("MEDIA_INFO_DOWNLOAD_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.download_timeout),
            probe_timeout: env_parse("MEDIA_INFO_PROBE_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.probe_timeout),
            cache_ttl: env_parse("MEDIA_INFO_CACHE_TTL")
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            ffprobe_path: env::var_os("FFPROBE_PATH").map(PathBuf::from),
            scratch_dir: env::var_os("MEDIA_INFO_SCRATCH_DIR").map(PathBuf::from),
            single_flight: env_parse("MEDIA_INFO_SINGLE_FLIGHT").unwrap_or(defaults.single_flight),
            ..defaults
        }
    }

    pub fn with_max_prefix_bytes(mut self, bytes: u64) -> Self {
        self.max_prefix_bytes = bytes;
        self
    }

    pub fn with_min_prefix_bytes(mut self, bytes: u64) -> Self {
        self.min_prefix_bytes = bytes;
        self
    }

    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_max_chapters(mut self, count: usize) -> Self {
        self.max_chapters = count;
        self
    }

    pub fn with_ffprobe_path(mut self, path: Option<PathBuf>) -> Self {
        self.ffprobe_path = path;
        self
    }

    pub fn with_scratch_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.scratch_dir = dir;
        self
    }

    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable environment value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MediaInfoConfig::default();
        assert_eq!(config.max_prefix_bytes, 2 * 1024 * 1024);
        assert_eq!(config.min_prefix_bytes, 1024);
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.max_chapters, 5);
        assert!(config.single_flight);
    }

    #[test]
    fn test_builder() {
        let config = MediaInfoConfig::default()
            .with_max_prefix_bytes(4096)
            .with_min_prefix_bytes(16)
            .with_probe_timeout(Duration::from_secs(5))
            .with_cache_ttl(Duration::from_secs(60))
            .with_max_chapters(2)
            .with_single_flight(false);
        assert_eq!(config.max_prefix_bytes, 4096);
        assert_eq!(config.min_prefix_bytes, 16);
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.max_chapters, 2);
        assert_eq!(config.probe_timeout, Duration::from_secs(5));
        assert!(!config.single_flight);
    }

    #[test]
    fn test_env_parse_ignores_garbage() {
        env::set_var("MEDIA_INFO_TEST_GARBAGE", "not-a-number");
        assert_eq!(env_parse::<u64>("MEDIA_INFO_TEST_GARBAGE"), None);
        env::set_var("MEDIA_INFO_TEST_NUMBER", " 42 ");
        assert_eq!(env_parse::<u64>("MEDIA_INFO_TEST_NUMBER"), Some(42));
    }
}

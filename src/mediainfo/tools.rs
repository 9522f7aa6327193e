// ffprobe discovery and static-binary installation

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use super::errors::{MediaInfoError, Result};
use super::utils::run_output_with_timeout;

const BINARY_NAME: &str = "ffprobe";
const VERSION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToolSource {
    /// Path given in configuration
    Configured,
    /// Found on PATH or a common install prefix
    System,
    /// Static build fetched by [`ProbeInstaller`]
    Downloaded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub version: Option<String>,
    pub path: Option<PathBuf>,
    pub source: Option<ToolSource>,
    pub is_available: bool,
}

impl ToolInfo {
    fn missing() -> Self {
        Self {
            name: BINARY_NAME.to_string(),
            version: None,
            path: None,
            source: None,
            is_available: false,
        }
    }
}

/// Directory holding downloaded binaries
pub fn install_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("media-info")
        .join("bin")
}

pub struct ProbeLocator {
    configured: Option<PathBuf>,
    install_dir: PathBuf,
}

impl ProbeLocator {
    pub fn new(configured: Option<PathBuf>) -> Self {
        Self {
            configured,
            install_dir: install_dir(),
        }
    }

    pub fn with_install_dir(mut self, dir: PathBuf) -> Self {
        self.install_dir = dir;
        self
    }

    /// Candidate path without running anything.
    ///
    /// A configured path always wins, even if it does not exist: the probe
    /// then fails with `ToolNotFound` and the pipeline degrades.
    pub fn resolve(&self) -> Option<(PathBuf, ToolSource)> {
        if let Some(path) = &self.configured {
            return Some((path.clone(), ToolSource::Configured));
        }

        // 1. PATH
        if let Ok(path) = which::which(BINARY_NAME) {
            return Some((path, ToolSource::System));
        }

        // 2. Common prefixes (services started without a login PATH)
        let common_paths = [
            "/opt/homebrew/bin/ffprobe",
            "/usr/local/bin/ffprobe",
            "/usr/bin/ffprobe",
        ];
        for path in common_paths {
            if Path::new(path).exists() {
                return Some((PathBuf::from(path), ToolSource::System));
            }
        }

        // 3. Previously downloaded static build
        let downloaded = self.install_dir.join(BINARY_NAME);
        if downloaded.is_file() {
            return Some((downloaded, ToolSource::Downloaded));
        }

        None
    }

    /// Resolve and verify with `ffprobe -version`
    pub async fn locate(&self) -> ToolInfo {
        let Some((path, source)) = self.resolve() else {
            return ToolInfo::missing();
        };

        let version = get_version(&path).await;
        ToolInfo {
            name: BINARY_NAME.to_string(),
            is_available: version.is_some(),
            version,
            path: Some(path),
            source: Some(source),
        }
    }
}

async fn get_version(path: &Path) -> Option<String> {
    match run_output_with_timeout(path.as_os_str(), ["-version"], VERSION_TIMEOUT).await {
        Ok(output) if output.status.success() => {
            let out = String::from_utf8_lossy(&output.stdout);
            // "ffprobe version 6.0-static https://..." -> "6.0-static"
            out.lines()
                .next()
                .and_then(|line| line.strip_prefix("ffprobe version "))
                .and_then(|rest| rest.split_whitespace().next())
                .map(str::to_string)
                .or_else(|| Some(out.trim().to_string()))
        }
        Ok(output) => {
            warn!(path = %path.display(), status = %output.status, "ffprobe -version failed");
            None
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ffprobe not runnable");
            None
        }
    }
}

/// Fetches a static ffprobe build when none is installed
pub struct ProbeInstaller {
    locator: ProbeLocator,
    install_dir: PathBuf,
    proxy: Option<String>,
}

impl ProbeInstaller {
    pub fn new(install_dir: PathBuf) -> Self {
        Self {
            locator: ProbeLocator::new(None).with_install_dir(install_dir.clone()),
            install_dir,
            proxy: None,
        }
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    /// Static build URL for this OS/arch
    pub fn binary_url() -> Result<&'static str> {
        binary_url_for(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Return an available ffprobe, downloading one if needed
    pub async fn ensure(&self) -> Result<ToolInfo> {
        let existing = self.locator.locate().await;
        if existing.is_available {
            info!(source = ?existing.source, version = ?existing.version, "ffprobe is available");
            return Ok(existing);
        }

        info!("ffprobe not found, attempting to download");
        let path = self.download().await?;

        let installed = self.locator.locate().await;
        if installed.is_available {
            info!(path = %path.display(), "ffprobe successfully installed");
            Ok(installed)
        } else {
            Err(MediaInfoError::ToolNotFound(format!(
                "downloaded binary at {} failed verification",
                path.display()
            )))
        }
    }

    async fn download(&self) -> Result<PathBuf> {
        let url = Self::binary_url()?;

        let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(300));
        if let Some(proxy_url) = self.proxy.as_deref() {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }
        let client = builder.build()?;

        info!(url, "downloading ffprobe");
        let mut response = client.get(url).send().await?.error_for_status()?;

        tokio::fs::create_dir_all(&self.install_dir).await?;
        let target = self.install_dir.join(BINARY_NAME);
        let partial = self.install_dir.join(format!("{}.part", BINARY_NAME));

        let mut file = tokio::fs::File::create(&partial).await?;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);

        make_executable(&partial).await?;
        tokio::fs::rename(&partial, &target).await?;
        Ok(target)
    }
}

fn binary_url_for(os: &str, arch: &str) -> Result<&'static str> {
    let arch = match arch {
        "x86_64" | "amd64" => "x64",
        "aarch64" | "arm64" => "arm64",
        other => return Err(MediaInfoError::UnsupportedPlatform(format!("{}_{}", os, other))),
    };

    match (os, arch) {
        ("linux", "x64") => Ok("https://github.com/eugeneware/ffmpeg-static/releases/download/b6.0/ffprobe-linux-x64"),
        ("linux", "arm64") => Ok("https://github.com/eugeneware/ffmpeg-static/releases/download/b6.0/ffprobe-linux-arm64"),
        ("macos", "x64") => Ok("https://github.com/eugeneware/ffmpeg-static/releases/download/b6.0/ffprobe-darwin-x64"),
        ("macos", "arm64") => Ok("https://github.com/eugeneware/ffmpeg-static/releases/download/b6.0/ffprobe-darwin-arm64"),
        _ => Err(MediaInfoError::UnsupportedPlatform(format!("{}_{}", os, arch))),
    }
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_urls() {
        assert!(binary_url_for("linux", "x86_64").unwrap().ends_with("linux-x64"));
        assert!(binary_url_for("macos", "aarch64").unwrap().ends_with("darwin-arm64"));
        assert!(matches!(
            binary_url_for("windows", "x86_64"),
            Err(MediaInfoError::UnsupportedPlatform(_))
        ));
        assert!(matches!(
            binary_url_for("linux", "riscv64"),
            Err(MediaInfoError::UnsupportedPlatform(_))
        ));
    }

    #[test]
    fn test_configured_path_wins() {
        let locator = ProbeLocator::new(Some(PathBuf::from("/custom/ffprobe")));
        let (path, source) = locator.resolve().unwrap();
        assert_eq!(path, PathBuf::from("/custom/ffprobe"));
        assert_eq!(source, ToolSource::Configured);
    }

    #[tokio::test]
    async fn test_missing_configured_tool_is_unavailable() {
        let info = ProbeLocator::new(Some(PathBuf::from("/nonexistent/ffprobe")))
            .locate()
            .await;
        assert!(!info.is_available);
        assert_eq!(info.source, Some(ToolSource::Configured));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_version_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let tool = crate::mediainfo::utils::tests::fake_tool(
            dir.path(),
            "ffprobe",
            "echo 'ffprobe version 6.0-static https://johnvansickle.com/ffmpeg/'",
        );

        let info = ProbeLocator::new(Some(tool)).locate().await;
        assert!(info.is_available);
        assert_eq!(info.version.as_deref(), Some("6.0-static"));
    }
}

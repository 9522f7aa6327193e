// Chunk acquirer - bounded prefix download into a scratch file
//
// The scratch file is a tempfile TempPath: it is unlinked when the
// ScratchFile is dropped, so every exit path of an extraction (and every
// failed acquisition) leaves nothing behind.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::config::MediaInfoConfig;
use super::errors::{MediaInfoError, Result};
use super::models::file_extension;
use super::traits::RemoteTransport;

/// Temporary local copy of a remote file's first bytes
#[derive(Debug)]
pub struct ScratchFile {
    path: TempPath,
    len: u64,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of bytes written
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Delete now and report failures (dropping also deletes, silently)
    pub fn close(self) -> std::io::Result<()> {
        self.path.close()
    }
}

/// Downloads at most `max_prefix_bytes` of a remote file
pub struct ChunkAcquirer {
    max_bytes: u64,
    min_bytes: u64,
    timeout: std::time::Duration,
    scratch_dir: PathBuf,
}

impl ChunkAcquirer {
    pub fn new(config: &MediaInfoConfig) -> Self {
        Self {
            max_bytes: config.max_prefix_bytes,
            min_bytes: config.min_prefix_bytes,
            timeout: config.download_timeout,
            scratch_dir: config
                .scratch_dir
                .clone()
                .unwrap_or_else(std::env::temp_dir),
        }
    }

    /// Byte ceiling for one acquisition
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Stream the prefix of `file_id` into a fresh scratch file.
    ///
    /// `file_name` only picks the scratch suffix. Fails on transport errors,
    /// empty sources, short sources and on the wall-clock timeout; in every
    /// failure case the partial file is already gone when this returns.
    pub async fn acquire_prefix(
        &self,
        transport: &dyn RemoteTransport,
        file_id: &str,
        file_name: &str,
    ) -> Result<ScratchFile> {
        let started = Instant::now();
        let (file, path) = tempfile::Builder::new()
            .prefix("mediainfo-")
            .suffix(&scratch_suffix(file_name))
            .tempfile_in(&self.scratch_dir)?
            .into_parts();
        let mut file = tokio::fs::File::from_std(file);

        let transfer = async {
            let mut stream = transport.open(file_id, self.max_bytes).await?;
            let mut written: u64 = 0;

            while written < self.max_bytes {
                let chunk = match stream.next_chunk().await? {
                    Some(chunk) => chunk,
                    None => break,
                };
                let room = (self.max_bytes - written) as usize;
                let take = chunk.len().min(room);
                file.write_all(&chunk[..take]).await?;
                written += take as u64;
            }

            file.flush().await?;
            Ok::<u64, MediaInfoError>(written)
        };

        let written = match tokio::time::timeout(self.timeout, transfer).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(file_id, transport = transport.name(), "prefix download stalled");
                return Err(MediaInfoError::Timeout {
                    stage: "prefix download",
                    after: self.timeout,
                });
            }
        };

        if written == 0 {
            return Err(MediaInfoError::EmptySource);
        }
        if written < self.min_bytes {
            return Err(MediaInfoError::InsufficientData {
                received: written,
                required: self.min_bytes,
            });
        }

        debug!(
            file_id,
            bytes = written,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "prefix acquired"
        );
        Ok(ScratchFile { path, len: written })
    }
}

/// ".mkv" for "Movie.mkv", ".tmp" when the name has no usable extension
fn scratch_suffix(file_name: &str) -> String {
    match file_extension(file_name) {
        Some(ext) if ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()) => {
            format!(".{}", ext)
        }
        _ => ".tmp".to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::mediainfo::traits::ChunkStream;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Yields fixed chunks, then optionally fails or stalls
    pub(crate) struct ScriptedTransport {
        pub chunks: Vec<Vec<u8>>,
        pub fail_after: bool,
        pub stall_after: bool,
    }

    impl ScriptedTransport {
        pub(crate) fn bytes(total: usize, chunk: usize) -> Self {
            let mut chunks = Vec::new();
            let mut left = total;
            while left > 0 {
                let n = left.min(chunk);
                chunks.push(vec![0xAB; n]);
                left -= n;
            }
            Self {
                chunks,
                fail_after: false,
                stall_after: false,
            }
        }
    }

    struct Scripted {
        chunks: std::vec::IntoIter<Vec<u8>>,
        fail_after: bool,
        stall_after: bool,
    }

    #[async_trait]
    impl ChunkStream for Scripted {
        async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
            if let Some(chunk) = self.chunks.next() {
                return Ok(Some(chunk));
            }
            if self.fail_after {
                return Err(MediaInfoError::Transport("connection reset".to_string()));
            }
            if self.stall_after {
                std::future::pending::<()>().await;
            }
            Ok(None)
        }
    }

    #[async_trait]
    impl RemoteTransport for ScriptedTransport {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn open(&self, _file_id: &str, _limit: u64) -> Result<Box<dyn ChunkStream>> {
            Ok(Box::new(Scripted {
                chunks: self.chunks.clone().into_iter(),
                fail_after: self.fail_after,
                stall_after: self.stall_after,
            }))
        }
    }

    fn acquirer(dir: &Path) -> ChunkAcquirer {
        let config = MediaInfoConfig::default()
            .with_max_prefix_bytes(10_000)
            .with_download_timeout(Duration::from_secs(2))
            .with_scratch_dir(Some(dir.to_path_buf()));
        ChunkAcquirer::new(&config)
    }

    fn dir_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_stops_at_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::bytes(50_000, 3_000);
        let acquirer = acquirer(dir.path());
        assert_eq!(acquirer.max_bytes(), 10_000);

        let scratch = acquirer
            .acquire_prefix(&transport, "id", "Movie.mkv")
            .await
            .unwrap();

        assert_eq!(scratch.len(), 10_000);
        assert_eq!(std::fs::metadata(scratch.path()).unwrap().len(), 10_000);
        assert_eq!(scratch.path().extension().unwrap(), "mkv");

        drop(scratch);
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_short_source_is_kept_when_above_minimum() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::bytes(4_000, 1_000);

        let scratch = acquirer(dir.path())
            .acquire_prefix(&transport, "id", "noext")
            .await
            .unwrap();
        assert_eq!(scratch.len(), 4_000);
        assert_eq!(scratch.path().extension().unwrap(), "tmp");
        scratch.close().unwrap();
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_insufficient_data_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::bytes(500, 500);

        let err = acquirer(dir.path())
            .acquire_prefix(&transport, "id", "clip.mp4")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            MediaInfoError::InsufficientData {
                received: 500,
                required: 1024
            }
        ));
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_empty_source() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::bytes(0, 1);

        let err = acquirer(dir.path())
            .acquire_prefix(&transport, "id", "clip.mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaInfoError::EmptySource));
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_transport_error_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut transport = ScriptedTransport::bytes(5_000, 1_000);
        transport.fail_after = true;

        let err = acquirer(dir.path())
            .acquire_prefix(&transport, "id", "clip.mp4")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "transport");
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_transport_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let mut transport = ScriptedTransport::bytes(2_000, 1_000);
        transport.stall_after = true;

        let err = acquirer(dir.path())
            .acquire_prefix(&transport, "id", "clip.mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaInfoError::Timeout { .. }));
        assert!(dir_is_empty(dir.path()));
    }

    #[test]
    fn test_scratch_suffix() {
        assert_eq!(scratch_suffix("a.MP4"), ".mp4");
        assert_eq!(scratch_suffix("a.verylongext"), ".tmp");
        assert_eq!(scratch_suffix("a.m-v"), ".tmp");
        assert_eq!(scratch_suffix("plain"), ".tmp");
    }
}

// Local stand-ins for the bot collaborators (CLI and tests)

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use super::errors::{MediaInfoError, Result};
use super::models::CatalogEntry;
use super::traits::{Catalog, ChunkStream, RemoteTransport};

const READ_CHUNK: usize = 64 * 1024;

/// Serves file ids as paths relative to a root directory
pub struct LocalFileTransport {
    root: PathBuf,
}

impl LocalFileTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

struct FileChunks {
    file: File,
    remaining: u64,
}

#[async_trait]
impl ChunkStream for FileChunks {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if self.remaining == 0 {
            return Ok(None);
        }

        let want = READ_CHUNK.min(self.remaining as usize);
        let mut buf = vec![0u8; want];
        let read = self
            .file
            .read(&mut buf)
            .await
            .map_err(|e| MediaInfoError::Transport(format!("read failed: {}", e)))?;
        if read == 0 {
            return Ok(None);
        }

        buf.truncate(read);
        self.remaining -= read as u64;
        Ok(Some(buf))
    }
}

#[async_trait]
impl RemoteTransport for LocalFileTransport {
    fn name(&self) -> &'static str {
        "local-file"
    }

    async fn open(&self, file_id: &str, limit: u64) -> Result<Box<dyn ChunkStream>> {
        if !is_plain_file_name(file_id) {
            return Err(MediaInfoError::Transport(format!(
                "file id {:?} is not a plain file name",
                file_id
            )));
        }
        let path = self.root.join(file_id);
        let file = File::open(&path).await.map_err(|e| {
            MediaInfoError::Transport(format!("cannot open {}: {}", path.display(), e))
        })?;
        Ok(Box::new(FileChunks {
            file,
            remaining: limit,
        }))
    }
}

/// Exactly one normal path component: no separators, `..`, or roots
fn is_plain_file_name(file_id: &str) -> bool {
    let mut components = Path::new(file_id).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !file_id.contains(['/', '\\'])
}

/// Catalog backed by a map, filled by the caller
#[derive(Default)]
pub struct MemoryCatalog {
    entries: RwLock<HashMap<String, CatalogEntry>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, file_id: impl Into<String>, entry: CatalogEntry) {
        self.entries.write().insert(file_id.into(), entry);
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn file_details(&self, file_id: &str) -> Result<Option<CatalogEntry>> {
        Ok(self.entries.read().get(file_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_transport_respects_limit() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clip.bin"), vec![7u8; 200_000]).unwrap();

        let transport = LocalFileTransport::new(dir.path());
        let mut stream = transport.open("clip.bin", 100_000).await.unwrap();

        let mut total = 0;
        while let Some(chunk) = stream.next_chunk().await.unwrap() {
            total += chunk.len();
        }
        assert_eq!(total, 100_000);
    }

    #[tokio::test]
    async fn test_local_transport_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let transport = LocalFileTransport::new(dir.path());
        let err = transport.open("missing.mkv", 1024).await.err().unwrap();
        assert_eq!(err.kind(), "transport");
    }

    #[tokio::test]
    async fn test_local_transport_stays_under_root() {
        let parent = tempfile::tempdir().unwrap();
        let root = parent.path().join("root");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(parent.path().join("secret.txt"), vec![1u8; 4096]).unwrap();
        std::fs::write(root.join("inner.bin"), vec![1u8; 4096]).unwrap();

        let transport = LocalFileTransport::new(&root);
        for id in ["../secret.txt", "..", "sub/inner.bin", "/etc/passwd", "", ".", "a\\b"] {
            let err = transport.open(id, 1024).await.err().unwrap();
            assert_eq!(err.kind(), "transport", "id {:?}", id);
        }
        assert!(transport.open("inner.bin", 1024).await.is_ok());
    }

    #[tokio::test]
    async fn test_memory_catalog() {
        let catalog = MemoryCatalog::new();
        catalog.insert(
            "abc",
            CatalogEntry {
                file_name: "Movie.mkv".to_string(),
                file_size: Some(10),
                mime_type: None,
            },
        );
        assert!(catalog.file_details("abc").await.unwrap().is_some());
        assert!(catalog.file_details("nope").await.unwrap().is_none());
    }
}

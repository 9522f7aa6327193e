// Collaborator seams: remote transport and file catalog

use async_trait::async_trait;

use super::errors::Result;
use super::models::CatalogEntry;

/// Sequence of byte chunks from a remote object
#[async_trait]
pub trait ChunkStream: Send {
    /// Next chunk, or `None` once the source is exhausted
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>>;
}

/// Chat-bot transport that can stream a stored file
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Name of the transport (for logging)
    fn name(&self) -> &'static str;

    /// Open a stream over the first `limit` bytes of `file_id`.
    ///
    /// Implementations may yield fewer bytes, or more in the last chunk;
    /// the acquirer enforces the ceiling.
    async fn open(&self, file_id: &str, limit: u64) -> Result<Box<dyn ChunkStream>>;
}

/// Lookup of stored file details
#[async_trait]
pub trait Catalog: Send + Sync {
    /// `Ok(None)` when the catalog has no record for `file_id`
    async fn file_details(&self, file_id: &str) -> Result<Option<CatalogEntry>>;
}

pub mod mediainfo;

pub use mediainfo::{
    render, Catalog, CatalogEntry, ChunkStream, LocalFileTransport, MediaInfoConfig,
    MediaInfoError, MediaInfoExtractor, MediaRecord, MemoryCatalog, Provenance, RemoteTransport,
};

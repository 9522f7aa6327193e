// Media info module - metadata for remote files without full downloads

pub mod cache;
pub mod chunk;
pub mod config;
pub mod diagnostics;
pub mod display;
pub mod errors;
pub mod heuristic;
pub mod local;
pub mod models;
pub mod orchestrator;
pub mod probe;
pub mod report;
pub mod tools;
pub mod traits;
pub mod utils;

pub use cache::ResultCache;
pub use chunk::{ChunkAcquirer, ScratchFile};
pub use config::MediaInfoConfig;
pub use diagnostics::ProbeFailureReason;
pub use errors::{MediaInfoError, Result};
pub use heuristic::HeuristicAnalyzer;
pub use local::{LocalFileTransport, MemoryCatalog};
pub use models::{
    AudioTrack, CatalogEntry, Chapter, MediaRecord, Provenance, SubtitleTrack, VideoTrack,
};
pub use orchestrator::{Fallback, MediaInfoExtractor};
pub use probe::{ProbeContext, ProbeRunner};
pub use report::render;
pub use tools::{ProbeInstaller, ProbeLocator, ToolInfo, ToolSource};
pub use traits::{Catalog, ChunkStream, RemoteTransport};

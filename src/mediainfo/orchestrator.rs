// Extraction orchestrator - cache, prefix download, probe, heuristic fallback
//
// Flow per request:
// 1. Cache hit -> return the shared record
// 2. Catalog lookup (failures count as "no record")
// 3. Known non-media or no ffprobe -> heuristic without downloading
// 4. Acquire prefix -> probe -> store
// 5. Any failure in 4 -> heuristic -> store
//
// extract() never fails; the scratch file is gone before it returns.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use super::cache::ResultCache;
use super::chunk::{ChunkAcquirer, ScratchFile};
use super::config::MediaInfoConfig;
use super::heuristic::{is_known_non_media, HeuristicAnalyzer};
use super::models::{CatalogEntry, MediaRecord};
use super::probe::{ProbeContext, ProbeRunner};
use super::traits::{Catalog, RemoteTransport};

/// Why a request ended on the heuristic path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    NonMedia,
    ToolMissing,
    AcquireFailed,
    ProbeFailed,
}

impl Fallback {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NonMedia => "non_media",
            Self::ToolMissing => "tool_missing",
            Self::AcquireFailed => "acquire_failed",
            Self::ProbeFailed => "probe_failed",
        }
    }
}

enum Stage {
    CacheCheck,
    Lookup,
    Acquire,
    Probe(ScratchFile),
    Heuristic(Fallback),
    Store(MediaRecord),
}

/// Per-key lock plus the number of requests holding or awaiting it
struct Flight {
    lock: Arc<AsyncMutex<()>>,
    members: usize,
}

type FlightMap = Mutex<HashMap<String, Flight>>;

/// Membership in a key's flight. Created before waiting, so a request
/// cancelled while queued still leaves; the last member removes the entry.
struct FlightGuard<'a> {
    map: &'a FlightMap,
    key: String,
    held: Option<OwnedMutexGuard<()>>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        drop(self.held.take());
        let mut map = self.map.lock();
        if let Some(flight) = map.get_mut(&self.key) {
            flight.members = flight.members.saturating_sub(1);
            if flight.members == 0 {
                map.remove(&self.key);
            }
        }
    }
}

pub struct MediaInfoExtractor {
    config: MediaInfoConfig,
    catalog: Arc<dyn Catalog>,
    cache: ResultCache,
    acquirer: ChunkAcquirer,
    runner: ProbeRunner,
    heuristic: HeuristicAnalyzer,
    in_flight: FlightMap,
}

impl MediaInfoExtractor {
    pub fn new(config: MediaInfoConfig, catalog: Arc<dyn Catalog>) -> Self {
        Self {
            cache: ResultCache::new(config.cache_ttl),
            acquirer: ChunkAcquirer::new(&config),
            runner: ProbeRunner::new(&config),
            heuristic: HeuristicAnalyzer::new(),
            in_flight: Mutex::new(HashMap::new()),
            catalog,
            config,
        }
    }

    pub fn config(&self) -> &MediaInfoConfig {
        &self.config
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Whether the precise path can run at all
    pub fn probe_available(&self) -> bool {
        self.runner.is_available()
    }

    /// Media record for `file_id`, precise when possible. Never fails.
    ///
    /// `file_name` is the display name; when blank the catalog's name is
    /// used instead.
    pub async fn extract(
        &self,
        client: &dyn RemoteTransport,
        file_id: &str,
        file_name: &str,
    ) -> Arc<MediaRecord> {
        if let Some(hit) = self.cache.get(file_id) {
            debug!(file_id, "cache hit");
            return hit;
        }

        if !self.config.single_flight {
            return self.run(client, file_id, file_name).await;
        }

        let _flight = self.enter_flight(file_id).await;
        self.run(client, file_id, file_name).await
    }

    async fn enter_flight(&self, key: &str) -> FlightGuard<'_> {
        let lock = {
            let mut map = self.in_flight.lock();
            let flight = map.entry(key.to_string()).or_insert_with(|| Flight {
                lock: Arc::new(AsyncMutex::new(())),
                members: 0,
            });
            flight.members += 1;
            Arc::clone(&flight.lock)
        };

        let mut guard = FlightGuard {
            map: &self.in_flight,
            key: key.to_string(),
            held: None,
        };
        guard.held = Some(lock.lock_owned().await);
        guard
    }

    async fn run(
        &self,
        client: &dyn RemoteTransport,
        file_id: &str,
        file_name: &str,
    ) -> Arc<MediaRecord> {
        let started = Instant::now();
        let mut name = file_name.trim().to_string();
        let mut details = CatalogEntry::default();
        let mut stage = Stage::CacheCheck;

        loop {
            stage = match stage {
                // Repeated here so a request that waited on the flight lock
                // picks up the record its predecessor stored
                Stage::CacheCheck => match self.cache.get(file_id) {
                    Some(hit) => {
                        debug!(file_id, "cache hit after wait");
                        return hit;
                    }
                    None => Stage::Lookup,
                },

                Stage::Lookup => {
                    details = self.lookup(file_id).await.unwrap_or_default();
                    if name.is_empty() {
                        name = details.file_name.trim().to_string();
                    }

                    if is_known_non_media(&name, details.mime_type.as_deref()) {
                        Stage::Heuristic(Fallback::NonMedia)
                    } else if !self.runner.is_available() {
                        Stage::Heuristic(Fallback::ToolMissing)
                    } else {
                        Stage::Acquire
                    }
                }

                Stage::Acquire => {
                    debug!(file_id, transport = client.name(), "acquiring prefix");
                    match self.acquirer.acquire_prefix(client, file_id, &name).await {
                        Ok(scratch) => Stage::Probe(scratch),
                        Err(e) => {
                            warn!(file_id, stage = "acquire", kind = e.kind(), error = %e, "prefix download failed");
                            Stage::Heuristic(Fallback::AcquireFailed)
                        }
                    }
                }

                Stage::Probe(scratch) => {
                    let ctx = ProbeContext {
                        file_name: name.clone(),
                        declared_size: details.file_size,
                    };
                    let bytes = scratch.len();
                    let result = self.runner.probe(&scratch, &ctx).await;
                    if let Err(e) = scratch.close() {
                        warn!(file_id, error = %e, "failed to remove scratch file");
                    }

                    match result {
                        Ok(record) => Stage::Store(record),
                        Err(e) => {
                            warn!(file_id, stage = "probe", bytes, kind = e.kind(), error = %e, "probe failed");
                            Stage::Heuristic(Fallback::ProbeFailed)
                        }
                    }
                }

                Stage::Heuristic(reason) => {
                    info!(file_id, reason = reason.as_str(), "using filename-based estimate");
                    Stage::Store(self.heuristic.estimate(
                        file_id,
                        &name,
                        details.file_size,
                        details.mime_type.as_deref(),
                    ))
                }

                Stage::Store(record) => {
                    let record = Arc::new(record);
                    self.cache.put(file_id, Arc::clone(&record));
                    info!(
                        file_id,
                        provenance = ?record.provenance,
                        format = %record.format,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "media info ready"
                    );
                    return record;
                }
            };
        }
    }

    async fn lookup(&self, file_id: &str) -> Option<CatalogEntry> {
        match self.catalog.file_details(file_id).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(file_id, error = %e, "catalog lookup failed, continuing without details");
                None
            }
        }
    }
}

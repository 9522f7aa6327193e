// Result cache - short-lived, process-local extraction results
//
// Each put stamps the entry with a fresh generation and spawns its own
// expiry task. The task deletes the entry only if the generation still
// matches, so a timer from an earlier insertion never removes a newer one.
// get also treats over-age entries as absent in case a timer is late.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::trace;

use super::models::MediaRecord;

struct CacheEntry {
    record: Arc<MediaRecord>,
    inserted_at: Instant,
    generation: u64,
}

#[derive(Default)]
struct Store {
    entries: HashMap<String, CacheEntry>,
    next_generation: u64,
}

/// Must be used from within a tokio runtime (expiry tasks are spawned)
#[derive(Clone)]
pub struct ResultCache {
    store: Arc<Mutex<Store>>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            store: Arc::new(Mutex::new(Store::default())),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &str) -> Option<Arc<MediaRecord>> {
        let mut store = self.store.lock();
        let expired = match store.entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                return Some(Arc::clone(&entry.record));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            store.entries.remove(key);
        }
        None
    }

    pub fn put(&self, key: &str, record: Arc<MediaRecord>) {
        let inserted_at = Instant::now();
        let generation = {
            let mut store = self.store.lock();
            store.next_generation += 1;
            let generation = store.next_generation;
            store.entries.insert(
                key.to_string(),
                CacheEntry {
                    record,
                    inserted_at,
                    generation,
                },
            );
            generation
        };

        let store = Arc::downgrade(&self.store);
        let key = key.to_string();
        let deadline = inserted_at + self.ttl;
        tokio::spawn(async move {
            // Deadline fixed at insertion, not at the task's first poll
            tokio::time::sleep_until(deadline).await;
            expire(&store, &key, generation);
        });
    }

    /// Live and not-yet-reaped entries
    pub fn len(&self) -> usize {
        self.store.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn expire(store: &Weak<Mutex<Store>>, key: &str, generation: u64) {
    let Some(store) = store.upgrade() else {
        return;
    };
    let mut store = store.lock();
    if store
        .entries
        .get(key)
        .is_some_and(|entry| entry.generation == generation)
    {
        store.entries.remove(key);
        trace!(key, "cache entry expired");
    }
}

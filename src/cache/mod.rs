//! Response cache with a compute-once population contract.
//!
//! The cache maps opaque string keys to pre-serialized payloads. A miss
//! runs the caller's recipe at most once per key no matter how many
//! requests race on it; `invalidate_all` discards every entry and is
//! visible to any call that begins after it returns.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use metrics::counter;
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

type Slot = Arc<OnceCell<Bytes>>;

#[derive(Default)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, Slot>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the payload for `key`, computing it with `recipe` on a miss.
    ///
    /// Concurrent misses on one key collapse into a single recipe
    /// invocation; every waiting caller receives the same payload. A
    /// failing recipe stores nothing, so the next caller retries.
    pub async fn get_or_compute<F, Fut, E>(&self, key: &str, recipe: F) -> Result<Bytes, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes, E>>,
    {
        let slot = {
            let mut entries = self.entries.lock().await;
            entries
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        if let Some(payload) = slot.get() {
            counter!("scatto_cache_hit_total").increment(1);
            return Ok(payload.clone());
        }

        counter!("scatto_cache_miss_total").increment(1);
        let payload = slot.get_or_try_init(recipe).await?;
        Ok(payload.clone())
    }

    /// Atomically discard every entry. In-flight computations that began
    /// before the clear finish against their detached slot and are not
    /// re-admitted, so callers arriving afterwards always recompute.
    pub async fn invalidate_all(&self) {
        let mut entries = self.entries.lock().await;
        let discarded = entries.len();
        entries.clear();
        drop(entries);

        counter!("scatto_cache_invalidate_total").increment(1);
        debug!(discarded, "response cache cleared");
    }

    /// Number of fully computed entries.
    pub async fn len(&self) -> usize {
        let entries = self.entries.lock().await;
        entries.values().filter(|slot| slot.get().is_some()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

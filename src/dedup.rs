// src/dedup.rs
//! Bounded, persisted duplicate-suppression cache keyed by
//! `source_id:message_id`.
//!
//! Persistence is snapshot-based (periodic + on-shutdown), not write-ahead:
//! after a crash, up to one snapshot interval of already-seen messages can be
//! reprocessed. At-most-once notification is best-effort across restarts and
//! exact within a process lifetime.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const DEFAULT_CAPACITY: usize = 2500;

/// Snapshot layout: timestamp + identity keys ordered oldest-first, so the
/// tail is the most recent and load-time truncation keeps it.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    ts: f64,
    items: Vec<String>,
}

#[derive(Debug)]
pub struct DedupCache {
    seen: Mutex<HashMap<String, f64>>,
    capacity: usize,
    path: PathBuf,
}

impl DedupCache {
    /// Create the cache and best-effort load the latest snapshot. A missing
    /// or unreadable snapshot is logged, never fatal.
    pub fn open(capacity: usize, path: impl Into<PathBuf>) -> Self {
        let cache = Self {
            seen: Mutex::new(HashMap::new()),
            capacity: capacity.max(2),
            path: path.into(),
        };
        if let Err(e) = cache.load() {
            warn!(error = ?e, path = %cache.path.display(), "seen snapshot not loaded");
        }
        cache
    }

    fn key(source_id: &str, message_id: &str) -> String {
        format!("{source_id}:{message_id}")
    }

    /// Returns true if the identity was already seen; otherwise marks it and
    /// returns false. An inserted identity is never reported "new" again
    /// until evicted.
    pub fn check_and_mark(&self, source_id: &str, message_id: &str) -> bool {
        let key = Self::key(source_id, message_id);
        let mut seen = self.seen.lock().expect("dedup mutex poisoned");

        if seen.contains_key(&key) {
            return true;
        }
        if seen.len() >= self.capacity {
            Self::evict_oldest_half(&mut seen, self.capacity);
        }
        seen.insert(key, now_secs());
        false
    }

    /// Bulk eviction down to half capacity, keeping the most recently seen
    /// entries. Approximate LRU: O(n log n) on the rare over-capacity insert
    /// instead of bookkeeping on every hit.
    fn evict_oldest_half(seen: &mut HashMap<String, f64>, capacity: usize) {
        let mut items: Vec<(String, f64)> = seen.drain().collect();
        items.sort_by(|a, b| b.1.total_cmp(&a.1));
        items.truncate(capacity / 2);
        seen.extend(items);
    }

    pub fn len(&self) -> usize {
        self.seen.lock().expect("dedup mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the full key set (recency-ordered) plus a timestamp.
    pub fn dump(&self) -> Result<()> {
        let snapshot = {
            let seen = self.seen.lock().expect("dedup mutex poisoned");
            let mut items: Vec<(String, f64)> =
                seen.iter().map(|(k, v)| (k.clone(), *v)).collect();
            items.sort_by(|a, b| a.1.total_cmp(&b.1));
            Snapshot {
                ts: now_secs(),
                items: items.into_iter().map(|(k, _)| k).collect(),
            }
        };
        let json = serde_json::to_string(&snapshot)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("writing seen snapshot to {}", self.path.display()))?;
        info!(
            path = %self.path.display(),
            items = snapshot.items.len(),
            "persisted seen snapshot"
        );
        Ok(())
    }

    fn load(&self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading seen snapshot from {}", self.path.display()))?;
        let snapshot: Snapshot = serde_json::from_str(&content)
            .with_context(|| format!("parsing seen snapshot {}", self.path.display()))?;

        let now = now_secs();
        let mut seen = self.seen.lock().expect("dedup mutex poisoned");
        let skip = snapshot.items.len().saturating_sub(self.capacity);
        for key in snapshot.items.into_iter().skip(skip) {
            seen.insert(key, now);
        }
        info!(path = %self.path.display(), items = seen.len(), "loaded seen snapshot");
        Ok(())
    }
}

fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

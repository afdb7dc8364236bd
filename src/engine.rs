// src/engine.rs
//! # Deal Engine
//! Wires the dedup gate in front of the accumulator and owns the persistence
//! lifecycle of the seen-cache (periodic snapshots + final dump).

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::dedup::DedupCache;
use crate::ingest::RawFragment;
use crate::window::Accumulator;

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("fragments_total", "Inbound fragments handled.");
        describe_counter!("dup_skipped_total", "Fragments dropped as duplicates.");
        describe_counter!("flushes_total", "Quiet-window flushes performed.");
        describe_counter!("blocks_classified_total", "Item blocks evaluated.");
        describe_counter!("matches_total", "Blocks matched and forwarded.");
        describe_counter!("notify_errors_total", "Failed notifier deliveries.");
        describe_gauge!("seen_cache_entries", "Current dedup cache size.");
    });
}

pub struct DealEngine {
    dedup: Arc<DedupCache>,
    accumulator: Accumulator,
}

impl DealEngine {
    pub fn new(dedup: Arc<DedupCache>, accumulator: Accumulator) -> Self {
        ensure_metrics_described();
        Self { dedup, accumulator }
    }

    /// Per-fragment entrypoint: dedup gate, then buffer. Cheap and
    /// non-blocking; classification and delivery happen on the flush task.
    pub fn handle_fragment(&self, frag: RawFragment) {
        counter!("fragments_total").increment(1);

        if self.dedup.check_and_mark(&frag.source_id, &frag.message_id) {
            debug!(
                source = %frag.source_id,
                message = %frag.message_id,
                "duplicate fragment ignored"
            );
            counter!("dup_skipped_total").increment(1);
            return;
        }
        gauge!("seen_cache_entries").set(self.dedup.len() as f64);

        self.accumulator.on_fragment(&frag);
    }

    /// Periodic seen-cache snapshots; failures are logged and retried next
    /// tick.
    pub fn spawn_snapshot_task(&self, interval: Duration) -> JoinHandle<()> {
        let dedup = Arc::clone(&self.dedup);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // immediate first tick carries nothing new
            loop {
                ticker.tick().await;
                if let Err(e) = dedup.dump() {
                    warn!(error = ?e, "periodic seen snapshot failed");
                }
            }
        })
    }

    /// Best-effort final snapshot on process shutdown.
    pub fn shutdown(&self) {
        if let Err(e) = self.dedup.dump() {
            warn!(error = ?e, "final seen snapshot failed");
        }
    }
}

// src/window.rs
//! Per-source accumulation with a quiet-window debounce.
//!
//! Deal channels post one offer as a burst of fragments. Each fragment
//! resets the source's timer; when the window elapses with no new fragment,
//! the buffer is flushed, split into item blocks, classified, and matches
//! are forwarded.
//!
//! Per-source state machine: Idle → Buffering → (timer expiry) → Flushing →
//! Idle. A fragment arriving while Buffering or Flushing moves the source
//! back to Buffering with a fresh timer (cancel-then-reschedule, never
//! stacked). The network call to the notifier happens outside the buffers
//! lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::classify::Classifier;
use crate::ingest::RawFragment;
use crate::matchlog::{MatchLog, MatchRecord};
use crate::notify::{render_alert, Notify};
use crate::rules;

struct SourceBuffer {
    channel_label: String,
    fragments: Vec<String>,
    /// Token of the currently scheduled timer; a firing timer only flushes
    /// if its token still matches, so a cancelled-but-racing timer is a
    /// no-op.
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

struct Inner {
    quiet_window: Duration,
    classifier: Classifier,
    notifier: Arc<dyn Notify>,
    matchlog: Option<MatchLog>,
    buffers: Mutex<HashMap<String, SourceBuffer>>,
    next_generation: AtomicU64,
}

#[derive(Clone)]
pub struct Accumulator {
    inner: Arc<Inner>,
}

impl Accumulator {
    pub fn new(
        quiet_window: Duration,
        classifier: Classifier,
        notifier: Arc<dyn Notify>,
        matchlog: Option<MatchLog>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                quiet_window,
                classifier,
                notifier,
                matchlog,
                buffers: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    /// Append a fragment to its source buffer and restart the quiet-window
    /// timer. Fragments for the same source are appended in arrival order;
    /// different sources are fully independent.
    pub fn on_fragment(&self, frag: &RawFragment) {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);

        let mut buffers = self.inner.buffers.lock().expect("buffers mutex poisoned");
        let buf = buffers
            .entry(frag.source_id.clone())
            .or_insert_with(|| SourceBuffer {
                channel_label: frag.channel_label.clone(),
                fragments: Vec::new(),
                generation: 0,
                timer: None,
            });

        buf.fragments.push(frag.text.clone());
        if !frag.channel_label.trim().is_empty() {
            buf.channel_label = frag.channel_label.clone();
        }
        buf.generation = generation;
        if let Some(old) = buf.timer.take() {
            old.abort();
        }

        let inner = Arc::clone(&self.inner);
        let source_id = frag.source_id.clone();
        buf.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.quiet_window).await;
            inner.flush_if_current(&source_id, generation).await;
        }));
    }

    /// Number of sources currently buffering (test hook).
    pub fn pending_sources(&self) -> usize {
        self.inner.buffers.lock().expect("buffers mutex poisoned").len()
    }
}

impl Inner {
    async fn flush_if_current(&self, source_id: &str, generation: u64) {
        let (channel_label, combined) = {
            let mut buffers = self.buffers.lock().expect("buffers mutex poisoned");
            match buffers.get(source_id) {
                Some(buf) if buf.generation == generation => {
                    let buf = buffers.remove(source_id).expect("buffer present");
                    (buf.channel_label, buf.fragments.join("\n"))
                }
                // A newer fragment rescheduled the flush.
                _ => return,
            }
        };

        counter!("flushes_total").increment(1);
        for block in split_blocks(&combined) {
            self.evaluate_block(source_id, &channel_label, &block).await;
        }
    }

    async fn evaluate_block(&self, source_id: &str, channel_label: &str, block: &str) {
        counter!("blocks_classified_total").increment(1);
        let result = self.classifier.classify(block);

        if !result.matched {
            debug!(
                source = source_id,
                key = %result.category_key,
                price = ?result.price,
                reason = %result.reason,
                "block ignored"
            );
            return;
        }

        info!(
            source = source_id,
            chan = channel_label,
            title = %result.title,
            key = %result.category_key,
            price = ?result.price,
            reason = %result.reason,
            "match"
        );
        counter!("matches_total").increment(1);

        if let Some(log) = &self.matchlog {
            let record = MatchRecord {
                ts: crate::matchlog::now_secs(),
                chan: channel_label,
                title: &result.title,
                key: &result.category_key,
                price: result.price,
                reason: &result.reason,
                text: block,
            };
            if let Err(e) = log.append(record) {
                warn!(error = ?e, "match log append failed");
            }
        }

        let header = rules::urgency_header(&result.category_key, result.price);
        let rendered = render_alert(block, header, channel_label);
        if let Err(e) = self.notifier.notify(&rendered).await {
            counter!("notify_errors_total").increment(1);
            warn!(error = ?e, source = source_id, "notify failed");
        }
    }
}

static HEADER_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:[🔥⚡🚨‼]|corre\b|gpu\b|placa\b|processador\b|ryzen\b|intel\b|rtx\b|radeon\b|ssd\b|mem[óo]ria\b|gabinete\b|cooler\b|fonte\b|monitor\b|teclado\b|mouse\b|webcam\b|cadeira\b)",
    )
    .expect("header line regex")
});

fn header_like(line: &str) -> bool {
    let t = line.trim();
    !t.is_empty() && t.chars().count() <= 60 && HEADER_LINE_RE.is_match(t)
}

/// Split combined buffer text into candidate item blocks: blank-line runs
/// are hard separators, and a short header-like line following at least one
/// prior line opens a new block.
pub fn split_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    let close = |current: &mut Vec<&str>, blocks: &mut Vec<String>| {
        if !current.is_empty() {
            blocks.push(current.join("\n"));
            current.clear();
        }
    };

    for line in text.lines() {
        if line.trim().is_empty() {
            close(&mut current, &mut blocks);
            continue;
        }
        if header_like(line) && !current.is_empty() {
            close(&mut current, &mut blocks);
        }
        current.push(line);
    }
    close(&mut current, &mut blocks);
    blocks
}

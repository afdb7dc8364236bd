// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod classify;
pub mod config;
pub mod dedup;
pub mod engine;
pub mod health;
pub mod ingest;
pub mod matchlog;
pub mod notify;
pub mod price;
pub mod rules;
pub mod window;

// ---- Re-exports for stable public API ----
pub use crate::classify::{ClassificationResult, Classifier};
pub use crate::dedup::DedupCache;
pub use crate::engine::DealEngine;
pub use crate::ingest::{FragmentSource, RawFragment};
pub use crate::notify::Notify;
pub use crate::window::Accumulator;

// src/health.rs
//! Health file for external liveness monitoring: a small JSON document
//! rewritten periodically, plus a shutdown marker on exit.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::warn;

fn write_health(path: &Path, start_iso: &str) -> Result<()> {
    let doc = json!({
        "pid": std::process::id(),
        "ts": chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
        "start": start_iso,
    });
    std::fs::write(path, doc.to_string())
        .with_context(|| format!("writing health file {}", path.display()))
}

/// Touch the health file now and then every `interval`.
pub fn spawn_health_task(path: PathBuf, start_iso: String, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(e) = write_health(&path, &start_iso) {
                warn!(error = ?e, "health touch failed");
            }
            tokio::time::sleep(interval).await;
        }
    })
}

/// Overwrite the health file with a shutdown marker; best-effort.
pub fn write_shutdown_marker(path: &Path) {
    let doc = json!({
        "pid": std::process::id(),
        "ts": chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
        "shutdown": true,
    });
    if let Err(e) = std::fs::write(path, doc.to_string()) {
        warn!(error = ?e, "shutdown marker write failed");
    }
}

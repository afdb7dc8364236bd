//! dealwatch binary entrypoint.
//! Boots the engine, wires the stdin fragment source to it, and handles
//! graceful shutdown with a final seen-cache snapshot.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dealwatch::classify::Classifier;
use dealwatch::config::Config;
use dealwatch::dedup::DedupCache;
use dealwatch::engine::DealEngine;
use dealwatch::health;
use dealwatch::ingest::{FragmentSource, StdinSource};
use dealwatch::matchlog::MatchLog;
use dealwatch::notify::telegram::TelegramNotifier;
use dealwatch::notify::Notify;
use dealwatch::window::Accumulator;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let start_iso = chrono::Utc::now().to_rfc3339();
    info!(pid = std::process::id(), start = %start_iso, "starting dealwatch");

    let config = Config::from_env()?;
    if config.channels.is_empty() {
        warn!("no monitored channels configured; accepting every fragment");
    } else {
        info!(channels = ?config.channels, "monitoring");
    }
    info!(destinations = config.destinations.len(), "alert destinations");

    // Rule-table compilation errors are fatal here, before any fragment.
    let classifier = Classifier::builtin()?;

    let dedup = Arc::new(DedupCache::open(config.seen_capacity, &config.seen_file));
    let notifier: Arc<dyn Notify> = Arc::new(
        TelegramNotifier::new(&config.bot_token, config.destinations.clone())
            .with_timeout(config.notify_timeout_secs)
            .with_retries(config.notify_retries),
    );
    let accumulator = Accumulator::new(
        Duration::from_secs(config.quiet_window_secs),
        classifier,
        notifier,
        Some(MatchLog::new(&config.match_log_file)),
    );
    let engine = DealEngine::new(Arc::clone(&dedup), accumulator);

    let _snapshots =
        engine.spawn_snapshot_task(Duration::from_secs(config.snapshot_interval_secs));
    let _health = health::spawn_health_task(
        config.health_file.clone(),
        start_iso,
        Duration::from_secs(30),
    );

    let mut source = StdinSource::new();
    let mut sigterm = signal(SignalKind::terminate())?;
    info!(source = source.name(), "reading fragments");

    loop {
        tokio::select! {
            frag = source.next_fragment() => match frag {
                Ok(Some(frag)) => {
                    if !config.is_monitored(&frag.channel_label) {
                        debug!(chan = %frag.channel_label, "unmonitored channel, skipping");
                        continue;
                    }
                    engine.handle_fragment(frag);
                }
                Ok(None) => {
                    info!("fragment source exhausted");
                    break;
                }
                Err(e) => {
                    warn!(error = ?e, "fragment source failed");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("SIGINT received");
                break;
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received");
                break;
            }
        }
    }

    info!("shutting down, persisting state");
    engine.shutdown();
    health::write_shutdown_marker(&config.health_file);
    Ok(())
}

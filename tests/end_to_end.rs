// tests/end_to_end.rs
//
// Full pipeline: fragment → dedup gate → accumulator → classifier →
// rendered notification, with the seen-cache persisted across "restarts".

use std::sync::{Arc, Mutex};
use std::time::Duration;

use dealwatch::classify::Classifier;
use dealwatch::dedup::DedupCache;
use dealwatch::engine::DealEngine;
use dealwatch::ingest::RawFragment;
use dealwatch::matchlog::MatchLog;
use dealwatch::notify::Notify;
use dealwatch::window::Accumulator;

struct CaptureNotifier(Mutex<Vec<String>>);

#[async_trait::async_trait]
impl Notify for CaptureNotifier {
    async fn notify(&self, text: &str) -> anyhow::Result<()> {
        self.0.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

fn build_engine(
    dir: &tempfile::TempDir,
    with_matchlog: bool,
) -> (DealEngine, Arc<CaptureNotifier>) {
    let notifier = Arc::new(CaptureNotifier(Mutex::new(Vec::new())));
    let matchlog = with_matchlog.then(|| MatchLog::new(dir.path().join("matches.log")));
    let accumulator = Accumulator::new(
        Duration::from_secs(4),
        Classifier::builtin().expect("builtin rules"),
        notifier.clone(),
        matchlog,
    );
    let dedup = Arc::new(DedupCache::open(100, dir.path().join("seen.json")));
    (DealEngine::new(dedup, accumulator), notifier)
}

fn gpu_fragment(message_id: &str) -> RawFragment {
    RawFragment {
        source_id: "-100123".into(),
        message_id: message_id.into(),
        channel_label: "@hardpromos".into(),
        text: "RTX 5060 por R$ 1.850,00 à vista".into(),
        received_at: 1_700_000_000,
    }
}

#[tokio::test(start_paused = true)]
async fn fresh_fragment_is_notified_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, notifier) = build_engine(&dir, true);

    engine.handle_fragment(gpu_fragment("42"));
    tokio::time::sleep(Duration::from_secs(5)).await;

    let sent = notifier.0.lock().unwrap();
    assert_eq!(sent.len(), 1, "exactly one notification: {:?}", *sent);
    assert!(sent[0].contains("RTX 5060 por R$ 1.850,00 à vista"));
    assert!(sent[0].contains("— via @hardpromos"));

    // matched offer is archived
    let log = std::fs::read_to_string(dir.path().join("matches.log")).unwrap();
    let rec: serde_json::Value = serde_json::from_str(log.trim()).unwrap();
    assert_eq!(rec["key"], "gpu:rtx5060");
    assert_eq!(rec["price"], 1850.0);
}

#[tokio::test(start_paused = true)]
async fn redelivered_fragment_is_suppressed() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, notifier) = build_engine(&dir, false);

    engine.handle_fragment(gpu_fragment("42"));
    tokio::time::sleep(Duration::from_secs(5)).await;
    // same (source, message) pair again, long after the first flush
    engine.handle_fragment(gpu_fragment("42"));
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(notifier.0.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn seen_cache_survives_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let (engine, notifier) = build_engine(&dir, false);
        engine.handle_fragment(gpu_fragment("42"));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(notifier.0.lock().unwrap().len(), 1);
        engine.shutdown();
    }

    // "restart": a new engine over the same snapshot file
    let (engine, notifier) = build_engine(&dir, false);
    engine.handle_fragment(gpu_fragment("42"));
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(
        notifier.0.lock().unwrap().is_empty(),
        "persisted identity must not re-alert"
    );

    // a genuinely new message still flows
    engine.handle_fragment(gpu_fragment("43"));
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(notifier.0.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn overpriced_offer_is_dropped_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, notifier) = build_engine(&dir, false);

    engine.handle_fragment(RawFragment {
        source_id: "-100123".into(),
        message_id: "44".into(),
        channel_label: "@hardpromos".into(),
        text: "RTX 5060 por R$ 2.200,00 à vista".into(),
        received_at: 0,
    });
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert!(notifier.0.lock().unwrap().is_empty());
}

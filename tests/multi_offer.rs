// tests/multi_offer.rs
//
// A burst of fragments carrying several offers must split into blocks and
// classify each one independently.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use dealwatch::classify::Classifier;
use dealwatch::ingest::RawFragment;
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

fn accumulator(window_secs: u64) -> (Accumulator, Arc<CaptureNotifier>) {
    let notifier = Arc::new(CaptureNotifier(Mutex::new(Vec::new())));
    let acc = Accumulator::new(
        Duration::from_secs(window_secs),
        Classifier::builtin().expect("builtin rules"),
        notifier.clone(),
        None,
    );
    (acc, notifier)
}

fn frag(text: &str) -> RawFragment {
    RawFragment {
        source_id: "-100555".into(),
        message_id: "1".into(),
        channel_label: "@promos".into(),
        text: text.into(),
        received_at: 0,
    }
}

#[tokio::test(start_paused = true)]
async fn blank_line_separated_offers_alert_independently() {
    let (acc, notifier) = accumulator(4);

    acc.on_fragment(&frag(
        "SSD NVMe M.2 1TB por R$ 420,00\nloja confiável\n\nWater Cooler 240mm por R$ 140,00 no pix",
    ));
    tokio::time::sleep(Duration::from_secs(5)).await;

    let sent = notifier.0.lock().unwrap();
    assert_eq!(sent.len(), 2, "{:?}", *sent);
    assert!(sent.iter().any(|s| s.contains("SSD NVMe")));
    assert!(sent.iter().any(|s| s.contains("Water Cooler")));
}

#[tokio::test(start_paused = true)]
async fn mixed_offers_only_matching_blocks_alert() {
    let (acc, notifier) = accumulator(4);

    // middle block is an excluded category, last one is over budget
    acc.on_fragment(&frag(
        "Gabinete com 4 fans por R$ 199,90\n\nnotebook gamer por R$ 3.500,00\n\nCadeira presidente por R$ 899,00",
    ));
    tokio::time::sleep(Duration::from_secs(5)).await;

    let sent = notifier.0.lock().unwrap();
    assert_eq!(sent.len(), 1, "{:?}", *sent);
    assert!(sent[0].contains("Gabinete"));
}

#[tokio::test(start_paused = true)]
async fn offer_split_across_fragments_classifies_as_one() {
    let (acc, notifier) = accumulator(4);

    acc.on_fragment(&frag("Ryzen 7 5700X"));
    tokio::time::sleep(Duration::from_secs(1)).await;
    acc.on_fragment(&frag("por R$ 850,00 no pix"));
    tokio::time::sleep(Duration::from_secs(5)).await;

    let sent = notifier.0.lock().unwrap();
    assert_eq!(sent.len(), 1, "{:?}", *sent);
    assert!(sent[0].starts_with("Corre!🔥 "), "cpu urgency header: {}", sent[0]);
    assert!(sent[0].contains("Ryzen 7 5700X\npor R$ 850,00 no pix"));
}

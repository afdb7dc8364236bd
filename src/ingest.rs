// src/ingest.rs
//! Inbound boundary: fragments produced by the messaging collaborator.
//!
//! The core does not care how fragments are obtained; a `FragmentSource`
//! yields them one at a time. The bundled implementation reads NDJSON from
//! stdin so a platform listener can run as a sidecar process and pipe
//! fragments in.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::warn;

/// One inbound message fragment. Immutable; consumed once by the dedup gate
/// and then the accumulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFragment {
    #[serde(default)]
    pub source_id: String,
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub channel_label: String,
    pub text: String,
    /// Unix seconds.
    #[serde(default)]
    pub received_at: u64,
}

impl RawFragment {
    /// Defensive identity: missing ids fall back to `unknown` + a hash of
    /// the text, so dedup still has a stable key.
    pub fn with_fallback_identity(mut self) -> Self {
        if self.source_id.trim().is_empty() {
            self.source_id = "unknown".into();
        }
        if self.message_id.trim().is_empty() {
            self.message_id = text_hash(&self.text);
        }
        self
    }
}

/// Short stable hash of a text, for fallback message ids.
pub fn text_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

#[async_trait::async_trait]
pub trait FragmentSource {
    /// Next fragment, or `None` when the source is exhausted.
    async fn next_fragment(&mut self) -> Result<Option<RawFragment>>;
    fn name(&self) -> &'static str;
}

/// NDJSON-over-stdin source. Malformed lines are logged and skipped; a
/// broken fragment must degrade to silence, not kill the stream.
pub struct StdinSource {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinSource {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl FragmentSource for StdinSource {
    async fn next_fragment(&mut self) -> Result<Option<RawFragment>> {
        while let Some(line) = self.lines.next_line().await? {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<RawFragment>(trimmed) {
                Ok(frag) if !frag.text.trim().is_empty() => {
                    return Ok(Some(frag.with_fallback_identity()));
                }
                Ok(_) => continue, // empty text, nothing to classify
                Err(e) => {
                    warn!(error = %e, "skipping malformed fragment line");
                }
            }
        }
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "stdin-ndjson"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_identity_fills_missing_ids() {
        let frag = RawFragment {
            source_id: "".into(),
            message_id: " ".into(),
            channel_label: "@ofertas".into(),
            text: "RTX 5060 por R$ 1.850,00".into(),
            received_at: 0,
        }
        .with_fallback_identity();

        assert_eq!(frag.source_id, "unknown");
        assert_eq!(frag.message_id.len(), 12);
        // stable: same text, same id
        assert_eq!(frag.message_id, text_hash("RTX 5060 por R$ 1.850,00"));
    }

    #[test]
    fn provided_ids_are_kept() {
        let frag = RawFragment {
            source_id: "-1001".into(),
            message_id: "77".into(),
            channel_label: "@ofertas".into(),
            text: "x".into(),
            received_at: 1,
        }
        .with_fallback_identity();
        assert_eq!(frag.source_id, "-1001");
        assert_eq!(frag.message_id, "77");
    }

    #[test]
    fn fragment_deserializes_with_defaults() {
        let frag: RawFragment =
            serde_json::from_str(r#"{"text":"oi","channel_label":"@c"}"#).unwrap();
        assert_eq!(frag.source_id, "");
        assert_eq!(frag.received_at, 0);
        assert_eq!(frag.text, "oi");
    }
}

// src/matchlog.rs
//! Append-only JSONL archive of matched offers, for later auditing of what
//! was forwarded and why.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::Serialize;

/// Longest text slice archived per record; promo messages can be huge.
const TEXT_CAP: usize = 4000;

#[derive(Debug, Serialize)]
pub struct MatchRecord<'a> {
    pub ts: f64,
    pub chan: &'a str,
    pub title: &'a str,
    pub key: &'a str,
    pub price: Option<f64>,
    pub reason: &'a str,
    pub text: &'a str,
}

#[derive(Debug)]
pub struct MatchLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl MatchLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn append(&self, record: MatchRecord<'_>) -> Result<()> {
        let truncated;
        let record = if record.text.chars().count() > TEXT_CAP {
            truncated = record.text.chars().take(TEXT_CAP).collect::<String>();
            MatchRecord { text: &truncated, ..record }
        } else {
            record
        };
        let line = serde_json::to_string(&record)?;

        let _guard = self.lock.lock().expect("match log mutex poisoned");
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening match log {}", self.path.display()))?;
        writeln!(file, "{line}")
            .with_context(|| format!("appending to match log {}", self.path.display()))?;
        Ok(())
    }
}

pub fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_one_json_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matches.log");
        let log = MatchLog::new(&path);

        for i in 0..3 {
            log.append(MatchRecord {
                ts: 1.0 + i as f64,
                chan: "@ofertas",
                title: "RTX 5060",
                key: "gpu:rtx5060",
                price: Some(1850.0),
                reason: "< 1900",
                text: "RTX 5060 por R$ 1.850,00 à vista",
            })
            .unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        let v: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(v["key"], "gpu:rtx5060");
        assert_eq!(v["chan"], "@ofertas");
    }

    #[test]
    fn long_text_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matches.log");
        let log = MatchLog::new(&path);

        let big = "x".repeat(10_000);
        log.append(MatchRecord {
            ts: 0.0,
            chan: "@c",
            title: "t",
            key: "k",
            price: None,
            reason: "r",
            text: &big,
        })
        .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let v: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(v["text"].as_str().unwrap().len(), TEXT_CAP);
    }
}

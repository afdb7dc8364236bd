// src/notify/telegram.rs
//! Telegram Bot API delivery with per-destination retry and doubling
//! backoff.

use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info};

use super::Notify;

#[derive(Clone)]
pub struct TelegramNotifier {
    base: String,
    destinations: Vec<String>,
    client: Client,
    timeout: Duration,
    max_retries: u8,
    backoff: Duration,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

impl TelegramNotifier {
    pub fn new(bot_token: &str, destinations: Vec<String>) -> Self {
        Self {
            base: format!("https://api.telegram.org/bot{bot_token}"),
            destinations,
            client: Client::new(),
            timeout: Duration::from_secs(20),
            max_retries: 3,
            backoff: Duration::from_secs(1),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    async fn send_to(&self, dest: &str, text: &str) -> Result<()> {
        let payload = SendMessage {
            chat_id: dest,
            text,
            disable_web_page_preview: true,
        };

        let mut backoff = self.backoff;
        let mut last_err = None;
        for _attempt in 0..self.max_retries {
            let res = self
                .client
                .post(format!("{}/sendMessage", self.base))
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            match res {
                Ok(rsp) if rsp.status().is_success() => {
                    let body: serde_json::Value = rsp.json().await.unwrap_or_default();
                    if body.get("ok").and_then(|v| v.as_bool()).unwrap_or(false) {
                        return Ok(());
                    }
                    last_err = Some(anyhow!("bot api error: {body}"));
                }
                Ok(rsp) => {
                    last_err = Some(anyhow!("bot api status {}", rsp.status()));
                }
                Err(e) => last_err = Some(anyhow!("bot api request failed: {e}")),
            }

            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }
        Err(last_err.unwrap_or_else(|| anyhow!("unknown delivery error")))
    }
}

#[async_trait::async_trait]
impl Notify for TelegramNotifier {
    /// Delivers to every configured destination. Per-destination failures are
    /// logged; the call only errors when no destination accepted the message.
    async fn notify(&self, text: &str) -> Result<()> {
        if self.destinations.is_empty() {
            return Err(anyhow!("no destinations configured"));
        }

        let mut delivered = 0usize;
        for dest in &self.destinations {
            match self.send_to(dest, text).await {
                Ok(()) => {
                    delivered += 1;
                    info!(dest = %dest, "delivery ok");
                }
                Err(e) => error!(dest = %dest, error = %e, "delivery failed"),
            }
        }

        if delivered == 0 {
            return Err(anyhow!("all {} destinations failed", self.destinations.len()));
        }
        Ok(())
    }
}

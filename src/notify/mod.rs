// src/notify/mod.rs
//! Outbound boundary: the core renders alert text; delivery, retry and
//! rate-limiting belong to the collaborator behind `Notify`.

pub mod telegram;

use anyhow::Result;

#[async_trait::async_trait]
pub trait Notify: Send + Sync {
    async fn notify(&self, text: &str) -> Result<()>;
}

/// Rendered alert: optional urgency header, the original block, and a
/// trailing source line.
pub fn render_alert(block: &str, header: Option<&str>, channel_label: &str) -> String {
    let label = if channel_label.trim().is_empty() {
        "(unknown)"
    } else {
        channel_label
    };
    format!("{}{}\n\n— via {}", header.unwrap_or(""), block.trim(), label)
}

//! Discord webhook notification.
//!
//! Pushes the battle report to a Discord channel. A missing webhook URL
//! disables the notifier; send failures are retried with a linear backoff
//! and finally logged, never propagated into the scan outcome.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::report::WEBHOOK_MAX_CHARS;

const RETRY_BACKOFF_MS: u64 = 500;

#[derive(Debug, Serialize)]
struct WebhookRequest<'a> {
    content: &'a str,
}

/// Client for one Discord webhook endpoint.
pub struct DiscordNotifier {
    client: reqwest::Client,
    webhook_url: Option<String>,
    retry_count: u32,
}

impl DiscordNotifier {
    pub fn new(webhook_url: Option<String>, retry_count: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url,
            retry_count,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// Send a message, truncated to the Discord body limit. A disabled
    /// notifier is a silent no-op.
    pub async fn send(&self, message: &str) -> Result<()> {
        let Some(url) = &self.webhook_url else {
            debug!("Webhook not configured, skipping notification");
            return Ok(());
        };

        let content: String = if message.chars().count() > WEBHOOK_MAX_CHARS {
            message.chars().take(WEBHOOK_MAX_CHARS).collect()
        } else {
            message.to_string()
        };

        let attempts = self.retry_count.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.post(url, &content).await {
                Ok(()) => {
                    info!(attempt, "Webhook notification delivered");
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Webhook send failed");
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(Duration::from_millis(
                            RETRY_BACKOFF_MS * attempt as u64,
                        ))
                        .await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Webhook send failed")))
    }

    async fn post(&self, url: &str, content: &str) -> Result<()> {
        let response = self
            .client
            .post(url)
            .json(&WebhookRequest { content })
            .send()
            .await
            .context("Webhook request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("Webhook returned status {}", response.status());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_without_url() {
        let notifier = DiscordNotifier::new(None, 3);
        assert!(!notifier.is_enabled());

        let notifier = DiscordNotifier::new(Some("https://example.invalid/hook".to_string()), 3);
        assert!(notifier.is_enabled());
    }

    #[tokio::test]
    async fn test_send_without_url_is_noop() {
        let notifier = DiscordNotifier::new(None, 3);
        assert!(notifier.send("hello").await.is_ok());
    }

    #[test]
    fn test_request_serialization() {
        let body = serde_json::to_string(&WebhookRequest { content: "報告" }).unwrap();
        assert_eq!(body, r#"{"content":"報告"}"#);
    }
}

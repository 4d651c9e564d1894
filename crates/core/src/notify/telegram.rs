use crate::config::Settings;
use crate::notify::mail::to_plain_text;
use crate::notify::ChannelNotifier;
use anyhow::Context;
use serde::Serialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.telegram.org";
const DEFAULT_TIMEOUT_SECS: u64 = 15;
// Telegram rejects messages longer than this many characters.
const MAX_MESSAGE_CHARS: usize = 4096;

#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    http: reqwest::Client,
    base_url: String,
    bot_token: String,
    chat_id: String,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

impl TelegramNotifier {
    /// `None` when the bot token or chat id is not configured.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Option<Self>> {
        let Some((bot_token, chat_id)) = settings.telegram() else {
            return Ok(None);
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("failed to build telegram http client")?;

        Ok(Some(Self {
            http,
            base_url: std::env::var("TELEGRAM_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
        }))
    }

    async fn post(&self, text: &str) -> anyhow::Result<()> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.base_url.trim_end_matches('/'),
            self.bot_token
        );
        let res = self
            .http
            .post(url)
            .json(&SendMessage {
                chat_id: &self.chat_id,
                text,
                disable_web_page_preview: true,
            })
            .send()
            .await
            // reqwest errors embed the URL, which carries the bot token.
            .map_err(|e| anyhow::anyhow!("telegram request failed: {}", e.without_url()))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            anyhow::bail!("telegram HTTP {status}: {body}");
        }
        Ok(())
    }
}

pub fn channel_text(narrative_html: &str) -> String {
    let text = to_plain_text(narrative_html);
    if text.chars().count() <= MAX_MESSAGE_CHARS {
        return text;
    }
    let mut cut: String = text.chars().take(MAX_MESSAGE_CHARS - 1).collect();
    cut.push('…');
    cut
}

#[async_trait::async_trait]
impl ChannelNotifier for TelegramNotifier {
    async fn notify_channel(&self, text: &str) {
        match self.post(&channel_text(text)).await {
            Ok(()) => tracing::info!(chat_id = %self.chat_id, "channel notified"),
            Err(err) => tracing::error!(chat_id = %self.chat_id, error = %err, "channel notify failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_text_is_flat_and_bounded() {
        assert_eq!(channel_text("<b>속보</b><br>금리 인하"), "속보\n금리 인하");

        let long = "가".repeat(MAX_MESSAGE_CHARS + 10);
        let out = channel_text(&long);
        assert_eq!(out.chars().count(), MAX_MESSAGE_CHARS);
        assert!(out.ends_with('…'));
    }

    #[tokio::test]
    async fn unreachable_api_is_swallowed_and_token_stays_private() {
        let notifier = TelegramNotifier {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(2))
                .build()
                .unwrap(),
            base_url: "http://127.0.0.1:1".to_string(),
            bot_token: "123456:SECRET-TOKEN".to_string(),
            chat_id: "@econbrief".to_string(),
        };

        let err = notifier.post("속보").await.unwrap_err();
        assert!(!format!("{err:#}").contains("SECRET-TOKEN"));

        // Returns normally; the failure is only logged.
        notifier.notify_channel("<b>속보</b>").await;
    }

    #[test]
    fn payload_shape() {
        let v = serde_json::to_value(SendMessage {
            chat_id: "@econbrief",
            text: "hi",
            disable_web_page_preview: true,
        })
        .unwrap();
        assert_eq!(
            v,
            serde_json::json!({"chat_id": "@econbrief", "text": "hi", "disable_web_page_preview": true})
        );
    }
}

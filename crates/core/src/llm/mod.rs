pub mod anthropic;
pub mod error;
pub mod gemini;
pub mod prompt;

use crate::config::Settings;
use anyhow::Context;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    Anthropic,
}

impl std::str::FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Provider::Gemini),
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            other => anyhow::bail!("unknown LLM_PROVIDER: {other}"),
        }
    }
}

/// Single prompt-in/text-out call. No streaming, no tools, no retry.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> Provider;

    async fn generate_text(&self, prompt: &str) -> anyhow::Result<String>;
}

pub fn from_settings(settings: &Settings) -> anyhow::Result<Box<dyn LlmClient>> {
    let provider = match settings.llm_provider.as_deref() {
        Some(s) => s.parse::<Provider>()?,
        None => Provider::Gemini,
    };

    Ok(match provider {
        Provider::Gemini => Box::new(gemini::GeminiClient::from_settings(settings)?),
        Provider::Anthropic => Box::new(anthropic::AnthropicClient::from_settings(settings)?),
    })
}

pub(crate) fn http_client() -> anyhow::Result<reqwest::Client> {
    let timeout_secs = std::env::var("LLM_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(DEFAULT_TIMEOUT_SECS);

    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("failed to build reqwest client")
}

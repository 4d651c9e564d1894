use crate::llm::Provider;
use serde_json::Value;
use std::fmt;

/// Provider-side failure with the raw payload kept for logs.
#[derive(Debug, Clone)]
pub struct LlmDiagnosticsError {
    pub provider: Provider,
    pub stage: &'static str,
    pub detail: String,
    pub raw_response_json: Option<Value>,
}

impl LlmDiagnosticsError {
    /// Non-2xx status. The body is kept as JSON when it parses.
    pub fn http(provider: Provider, status: reqwest::StatusCode, body: &str) -> Self {
        Self {
            provider,
            stage: "http",
            detail: format!("status={status}"),
            raw_response_json: serde_json::from_str::<Value>(body).ok(),
        }
    }

    /// 2xx response that carried no text (safety block, empty candidates, ...).
    pub fn empty(provider: Provider, reason: Option<&str>, raw: Value) -> Self {
        Self {
            provider,
            stage: "empty_response",
            detail: format!("no text returned (reason={})", reason.unwrap_or("unknown")),
            raw_response_json: Some(raw),
        }
    }
}

impl fmt::Display for LlmDiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LLM error (provider={:?}, stage={}): {}",
            self.provider, self.stage, self.detail
        )
    }
}

impl std::error::Error for LlmDiagnosticsError {}

use crate::config::Settings;
use crate::domain::subscriber::Subscriber;
use crate::storage::service_account::{ServiceAccountKey, TokenSource, SHEETS_SCOPE};
use crate::storage::SubscriberStore;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com";
const DEFAULT_SHEET_NAME: &str = "Sheet1";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Subscriber store backed by one worksheet of a Google spreadsheet.
#[derive(Debug)]
pub struct GoogleSheetsStore {
    http: reqwest::Client,
    tokens: TokenSource,
    base_url: String,
    spreadsheet_id: String,
    sheet_name: String,
}

impl GoogleSheetsStore {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let key = ServiceAccountKey::from_json(settings.require_gcp_credentials()?)?;
        let spreadsheet_id = settings.require_subscriber_sheet_id()?.to_string();
        let sheet_name = settings
            .subscriber_sheet_name
            .clone()
            .unwrap_or_else(|| DEFAULT_SHEET_NAME.to_string());
        let base_url =
            std::env::var("SHEETS_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("failed to build sheets http client")?;

        Ok(Self {
            tokens: TokenSource::new(http.clone(), key, SHEETS_SCOPE),
            http,
            base_url,
            spreadsheet_id,
            sheet_name,
        })
    }

    fn values_url(&self, range: &str, suffix: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}{}",
            self.base_url.trim_end_matches('/'),
            self.spreadsheet_id,
            urlencoding::encode(&quote_range(&self.sheet_name, range)),
            suffix
        )
    }
}

/// `'Sheet name'!A:A`, with single quotes in the name doubled.
fn quote_range(sheet_name: &str, range: &str) -> String {
    format!("'{}'!{range}", sheet_name.replace('\'', "''"))
}

#[async_trait::async_trait]
impl SubscriberStore for GoogleSheetsStore {
    async fn email_column(&self) -> Result<Vec<String>> {
        let token = self.tokens.access_token().await?;
        let res = self
            .http
            .get(self.values_url("A:A", ""))
            .bearer_auth(token)
            .query(&[("majorDimension", "COLUMNS")])
            .send()
            .await
            .context("sheets read request failed")?;

        let status = res.status();
        let text = res.text().await.context("failed to read sheets response")?;
        if !status.is_success() {
            anyhow::bail!("sheets read HTTP {status}: {text}");
        }

        let range: ValueRange = serde_json::from_str(&text)
            .with_context(|| format!("unexpected sheets response: {text}"))?;
        Ok(range.first_column())
    }

    async fn append(&self, subscriber: &Subscriber) -> Result<()> {
        let token = self.tokens.access_token().await?;
        let body = serde_json::json!({ "values": [subscriber.to_row()] });
        let res = self
            .http
            .post(self.values_url("A:B", ":append"))
            .bearer_auth(token)
            .query(&[
                ("valueInputOption", "RAW"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&body)
            .send()
            .await
            .context("sheets append request failed")?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            anyhow::bail!("sheets append HTTP {status}: {text}");
        }

        tracing::info!(email = %subscriber.email, "subscriber row appended");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    // Absent when the range is empty.
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

impl ValueRange {
    fn first_column(self) -> Vec<String> {
        self.values
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter()
            .map(|v| match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .collect()
    }
}

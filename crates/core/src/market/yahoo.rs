use crate::market::{MarketDataProvider, NewsItem, NewsProvider};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
// Yahoo rejects requests without a browser-like user agent.
const USER_AGENT: &str = "Mozilla/5.0 (compatible; econbrief/0.1)";

#[derive(Debug, Clone)]
pub struct YahooFinanceClient {
    http: reqwest::Client,
    base_url: String,
}

impl YahooFinanceClient {
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("YAHOO_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let timeout_secs = std::env::var("MARKET_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build market data http client")?;

        Ok(Self { http, base_url })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, String)],
    ) -> Result<T> {
        let res = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("market data request failed: {url}"))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read market data response")?;
        if !status.is_success() {
            anyhow::bail!("market data HTTP {status}: {text}");
        }

        serde_json::from_str::<T>(&text)
            .with_context(|| format!("unexpected market data response shape: {text}"))
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for YahooFinanceClient {
    async fn daily_closes(&self, symbol: &str) -> Result<Vec<f64>> {
        let url = self.url(&format!("/v8/finance/chart/{symbol}"));
        let chart: ChartResponse = self
            .get_json(
                url,
                &[
                    ("range", "5d".to_string()),
                    ("interval", "1d".to_string()),
                ],
            )
            .await?;
        Ok(chart.into_closes())
    }
}

#[async_trait::async_trait]
impl NewsProvider for YahooFinanceClient {
    async fn recent_news(&self, symbol: &str, limit: usize) -> Result<Vec<NewsItem>> {
        let url = self.url("/v1/finance/search");
        let search: SearchResponse = self
            .get_json(
                url,
                &[
                    ("q", symbol.to_string()),
                    ("newsCount", limit.to_string()),
                    ("quotesCount", "0".to_string()),
                ],
            )
            .await?;

        Ok(search
            .news
            .into_iter()
            .take(limit)
            .map(|n| NewsItem {
                title: n.title.unwrap_or_default(),
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

impl ChartResponse {
    // Missing result/quote blocks yield an empty series; the quote builder reports it.
    fn into_closes(self) -> Vec<f64> {
        self.chart
            .result
            .and_then(|r| r.into_iter().next())
            .and_then(|r| r.indicators.quote.into_iter().next())
            .map(|q| q.close.into_iter().flatten().collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    news: Vec<SearchNews>,
}

#[derive(Debug, Deserialize)]
struct SearchNews {
    #[serde(default)]
    title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chart_drops_null_closes() {
        let v = json!({
            "chart": {
                "result": [{
                    "meta": {"symbol": "^IXIC"},
                    "timestamp": [1, 2, 3, 4],
                    "indicators": {"quote": [{"close": [17900.5, null, 17950.0, 18000.0]}]}
                }],
                "error": null
            }
        });
        let parsed: ChartResponse = serde_json::from_value(v).unwrap();
        assert_eq!(parsed.into_closes(), vec![17900.5, 17950.0, 18000.0]);
    }

    #[test]
    fn chart_error_payload_yields_no_closes() {
        let v = json!({
            "chart": {
                "result": null,
                "error": {"code": "Not Found", "description": "No data found"}
            }
        });
        let parsed: ChartResponse = serde_json::from_value(v).unwrap();
        assert!(parsed.into_closes().is_empty());
    }

    #[test]
    fn search_news_tolerates_missing_titles() {
        let v = json!({
            "news": [
                {"uuid": "1", "title": "Fed holds rates", "publisher": "Reuters"},
                {"uuid": "2"}
            ]
        });
        let parsed: SearchResponse = serde_json::from_value(v).unwrap();
        let titles: Vec<_> = parsed.news.into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec![Some("Fed holds rates".to_string()), None]);
    }
}

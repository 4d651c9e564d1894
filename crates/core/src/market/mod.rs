pub mod yahoo;

use crate::domain::briefing::Headlines;
use crate::domain::quote::{quote_from_closes, Quote};
use anyhow::Result;

/// Ticker whose news feed stands in for "the market" when collecting headlines.
pub const HEADLINE_REFERENCE_SYMBOL: &str = "SPY";
pub const DEFAULT_HEADLINE_LIMIT: usize = 5;

#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Daily closes over a 5-day window, oldest first, non-trading rows removed.
    async fn daily_closes(&self, symbol: &str) -> Result<Vec<f64>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsItem {
    pub title: String,
}

#[async_trait::async_trait]
pub trait NewsProvider: Send + Sync {
    /// Up to `limit` recent items for `symbol`, in source order.
    async fn recent_news(&self, symbol: &str, limit: usize) -> Result<Vec<NewsItem>>;
}

/// Fails with [`crate::domain::quote::DataUnavailable`] (inside the error chain) when the
/// provider has fewer than two closes for the symbol. No retry.
pub async fn fetch_quote(provider: &dyn MarketDataProvider, symbol: &str) -> Result<Quote> {
    let closes = provider.daily_closes(symbol).await?;
    Ok(quote_from_closes(symbol, &closes)?)
}

/// Never fails: upstream errors and empty results become sentinel headlines.
pub async fn fetch_headlines(provider: &dyn NewsProvider, symbol: &str, limit: usize) -> Headlines {
    let items = match provider.recent_news(symbol, limit).await {
        Ok(items) => items,
        Err(err) => {
            tracing::warn!(%symbol, error = %err, "news fetch failed; using sentinel");
            return Headlines::Unavailable;
        }
    };

    let titles = collect_titles(items, limit);
    if titles.is_empty() {
        Headlines::NoNews
    } else {
        Headlines::Titles(titles)
    }
}

fn collect_titles(items: Vec<NewsItem>, limit: usize) -> Vec<String> {
    let mut titles: Vec<String> = Vec::with_capacity(limit);
    for item in items {
        if titles.len() >= limit {
            break;
        }
        if !item.title.is_empty() && !titles.contains(&item.title) {
            titles.push(item.title);
        }
    }
    titles
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use std::collections::HashMap;

    #[derive(Debug, Default)]
    pub struct FakeMarket {
        pub closes: HashMap<String, Vec<f64>>,
    }

    impl FakeMarket {
        pub fn with(mut self, symbol: &str, closes: &[f64]) -> Self {
            self.closes.insert(symbol.to_string(), closes.to_vec());
            self
        }
    }

    #[async_trait::async_trait]
    impl MarketDataProvider for FakeMarket {
        async fn daily_closes(&self, symbol: &str) -> Result<Vec<f64>> {
            Ok(self.closes.get(symbol).cloned().unwrap_or_default())
        }
    }

    #[derive(Debug)]
    pub enum FakeNews {
        Items(Vec<&'static str>),
        Failing,
    }

    #[async_trait::async_trait]
    impl NewsProvider for FakeNews {
        async fn recent_news(&self, _symbol: &str, limit: usize) -> Result<Vec<NewsItem>> {
            match self {
                FakeNews::Items(titles) => Ok(titles
                    .iter()
                    .take(limit)
                    .map(|t| NewsItem {
                        title: t.to_string(),
                    })
                    .collect()),
                FakeNews::Failing => anyhow::bail!("connection reset"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::{FakeMarket, FakeNews};
    use super::*;
    use crate::domain::briefing::{NEWS_UNAVAILABLE, NO_NOTABLE_NEWS};
    use crate::domain::quote::DataUnavailable;

    #[tokio::test]
    async fn fetch_quote_reports_data_unavailable() {
        let market = FakeMarket::default().with("NEW", &[10.0]);
        let err = fetch_quote(&market, "NEW").await.unwrap_err();
        assert!(err.downcast_ref::<DataUnavailable>().is_some());
    }

    #[tokio::test]
    async fn fetch_quote_uses_last_two_closes() {
        let market = FakeMarket::default().with("^VIX", &[16.0, 15.0, 14.0]);
        let q = fetch_quote(&market, "^VIX").await.unwrap();
        assert_eq!((q.current, q.change, q.percent_change), (14.0, -1.0, -6.67));
    }

    #[tokio::test]
    async fn headlines_are_deduplicated_and_limited() {
        let news = FakeNews::Items(vec!["A", "", "A", "B", "a", "C"]);
        let h = fetch_headlines(&news, "SPY", 10).await;
        assert_eq!(h, Headlines::Titles(vec!["A".into(), "B".into(), "a".into(), "C".into()]));

        let h = fetch_headlines(&news, "SPY", 2).await;
        assert_eq!(h.lines().len(), 1);
        assert_eq!(h, Headlines::Titles(vec!["A".into()]));
    }

    #[test]
    fn collect_titles_stops_at_limit() {
        let items = ["x", "y", "z"]
            .iter()
            .map(|t| NewsItem {
                title: t.to_string(),
            })
            .collect();
        assert_eq!(collect_titles(items, 2), vec!["x", "y"]);
    }

    #[tokio::test]
    async fn upstream_error_becomes_sentinel() {
        let h = fetch_headlines(&FakeNews::Failing, "SPY", 5).await;
        assert_eq!(h.lines(), vec![NEWS_UNAVAILABLE.to_string()]);
    }

    #[tokio::test]
    async fn empty_result_becomes_no_news_sentinel() {
        let h = fetch_headlines(&FakeNews::Items(vec!["", ""]), "SPY", 5).await;
        assert_eq!(h.lines(), vec![NO_NOTABLE_NEWS.to_string()]);
    }
}

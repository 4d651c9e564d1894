use crate::domain::briefing::Briefing;
use crate::domain::quote::Indicator;
use crate::llm::prompt::generate_narrative;
use crate::llm::LlmClient;
use crate::market::{
    fetch_headlines, fetch_quote, MarketDataProvider, NewsProvider, DEFAULT_HEADLINE_LIMIT,
    HEADLINE_REFERENCE_SYMBOL,
};
use anyhow::Context;
use std::collections::BTreeMap;

/// Quotes, then headlines, then one model call, all sequential.
///
/// Any quote failure or model failure aborts the whole briefing; headline failures degrade to
/// sentinels. `issue` switches the narrative to the breaking-news template.
pub async fn build_briefing(
    market: &dyn MarketDataProvider,
    news: &dyn NewsProvider,
    llm: &dyn LlmClient,
    issue: Option<&str>,
) -> anyhow::Result<Briefing> {
    let mut quotes = BTreeMap::new();
    for indicator in Indicator::ALL {
        let quote = fetch_quote(market, indicator.symbol())
            .await
            .with_context(|| format!("quote fetch failed for {indicator:?}"))?;
        quotes.insert(indicator, quote);
    }

    let headlines = fetch_headlines(news, HEADLINE_REFERENCE_SYMBOL, DEFAULT_HEADLINE_LIMIT).await;

    let narrative = generate_narrative(llm, &quotes, &headlines, issue)
        .await
        .context("narrative generation failed")?;

    tracing::info!(
        quotes = quotes.len(),
        headlines = headlines.lines().len(),
        breaking = issue.is_some(),
        narrative_chars = narrative.chars().count(),
        "briefing built"
    );

    Ok(Briefing {
        quotes,
        headlines,
        narrative,
        issue: issue.map(str::to_string),
        generated_at: chrono::Utc::now(),
    })
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// Current value and session-over-session change for one market symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub current: f64,
    pub change: f64,
    pub percent_change: f64,
}

/// The fixed set of market indicators a briefing is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    Nasdaq,
    Treasury10y,
    Vix,
    UsdKrw,
}

impl Indicator {
    pub const ALL: [Indicator; 4] = [
        Indicator::Nasdaq,
        Indicator::Treasury10y,
        Indicator::Vix,
        Indicator::UsdKrw,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Indicator::Nasdaq => "^IXIC",
            Indicator::Treasury10y => "^TNX",
            Indicator::Vix => "^VIX",
            Indicator::UsdKrw => "KRW=X",
        }
    }

    /// Label used in the narrative prompt.
    pub fn label(self) -> &'static str {
        match self {
            Indicator::Nasdaq => "나스닥",
            Indicator::Treasury10y => "미 10년물 금리",
            Indicator::Vix => "VIX",
            Indicator::UsdKrw => "환율",
        }
    }
}

/// The market data provider returned fewer usable closes than a quote needs.
#[derive(Debug, Clone)]
pub struct DataUnavailable {
    pub symbol: String,
    pub closes: usize,
    pub detail: &'static str,
}

impl fmt::Display for DataUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "market data unavailable for {} ({}; closes={})",
            self.symbol, self.detail, self.closes
        )
    }
}

impl std::error::Error for DataUnavailable {}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Builds a quote from a daily close history ordered oldest-first.
///
/// `current` and `previous` are rounded to 2 decimals first, `change` is computed from the
/// rounded values, and `percent_change` is computed from the already-rounded `change`.
pub fn quote_from_closes(symbol: &str, closes: &[f64]) -> Result<Quote, DataUnavailable> {
    let unavailable = |detail| DataUnavailable {
        symbol: symbol.to_string(),
        closes: closes.len(),
        detail,
    };

    let [.., previous, current] = closes else {
        return Err(unavailable("fewer than two daily closes"));
    };

    let current = round2(*current);
    let previous = round2(*previous);
    if previous == 0.0 {
        return Err(unavailable("previous close is zero"));
    }

    let change = round2(current - previous);
    let percent_change = round2(change / previous * 100.0);

    Ok(Quote {
        symbol: symbol.to_string(),
        current,
        change,
        percent_change,
    })
}

use crate::domain::quote::{Indicator, Quote};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const NEWS_UNAVAILABLE: &str = "현재 서버 통신 문제로 뉴스를 불러오지 못했습니다.";
pub const NO_NOTABLE_NEWS: &str = "오늘 장에 큰 영향을 미칠만한 특별한 거시경제 뉴스가 없습니다.";

/// Up to `limit` distinct headline titles, or the sentinel that replaced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "titles", rename_all = "snake_case")]
pub enum Headlines {
    Titles(Vec<String>),
    Unavailable,
    NoNews,
}

impl Headlines {
    /// Lines as shown to readers: the titles, or exactly one sentinel string.
    pub fn lines(&self) -> Vec<String> {
        match self {
            Headlines::Titles(titles) => titles.clone(),
            Headlines::Unavailable => vec![NEWS_UNAVAILABLE.to_string()],
            Headlines::NoNews => vec![NO_NOTABLE_NEWS.to_string()],
        }
    }

    /// Numbered block ("1. title") used in prompts and mail bodies.
    pub fn numbered(&self) -> String {
        match self {
            Headlines::Titles(titles) => titles
                .iter()
                .enumerate()
                .map(|(i, t)| format!("{}. {t}", i + 1))
                .collect::<Vec<_>>()
                .join("\n"),
            Headlines::Unavailable => NEWS_UNAVAILABLE.to_string(),
            Headlines::NoNews => NO_NOTABLE_NEWS.to_string(),
        }
    }
}

/// Quotes, headlines and the generated narrative for one fetch cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Briefing {
    pub quotes: BTreeMap<Indicator, Quote>,
    pub headlines: Headlines,
    pub narrative: String,
    /// Set when the narrative was generated from the breaking-news template.
    pub issue: Option<String>,
    pub generated_at: DateTime<Utc>,
}

use crate::domain::briefing::Headlines;
use chrono::NaiveDate;
use scraper::{Html, Node};

const DISCLAIMER: &str = "본 메일은 정보 제공 목적으로 작성되었으며 투자 권유가 아닙니다. \
                          투자 판단과 그 결과에 대한 책임은 투자자 본인에게 있습니다.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edition {
    Morning,
    Breaking,
}

/// A rendered message, identical for every recipient of a send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Letter {
    pub subject: String,
    pub html: String,
}

impl Letter {
    /// The narrative is embedded as-is (it is already HTML); headline titles are escaped.
    pub fn briefing(edition: Edition, date: NaiveDate, narrative: &str, headlines: &Headlines) -> Self {
        let subject = match edition {
            Edition::Morning => format!("🌤️ 이브(Eve)의 모닝 브리핑 ({date} 기준)"),
            Edition::Breaking => format!("🚨 이브(Eve)의 긴급 속보 브리핑 ({date})"),
        };
        let heading = match edition {
            Edition::Morning => "📈 오늘의 거시경제 시황",
            Edition::Breaking => "🚨 긴급 시장 속보",
        };

        let news = headlines
            .lines()
            .iter()
            .map(|l| escape_html(l))
            .collect::<Vec<_>>()
            .join("<br>");

        let html = format!(
            "<html>\
               <body style=\"font-family: Arial, sans-serif; line-height:1.6;\">\
                 <h2 style=\"color: #2e6c80;\">{heading}</h2>\
                 <p>{narrative}</p>\
                 <hr>\
                 <h3>📰 주요 뉴스</h3>\
                 <p>{news}</p>\
                 <hr>\
                 <p style=\"color:gray; font-size:12px;\"><i>{DISCLAIMER}</i></p>\
               </body>\
             </html>"
        );

        Self { subject, html }
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Flat text for chat channels: `<br>` becomes a newline, other markup is dropped and
/// entities are decoded.
pub fn to_plain_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::with_capacity(html.len());
    for node in fragment.tree.root().descendants() {
        match node.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if el.name() == "br" => out.push('\n'),
            _ => {}
        }
    }
    out
}

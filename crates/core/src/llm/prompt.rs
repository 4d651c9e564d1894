use crate::domain::briefing::Headlines;
use crate::domain::quote::{Indicator, Quote};
use crate::llm::LlmClient;
use std::collections::BTreeMap;

pub const GREETING: &str = "안녕하세요! 여러분의 경제 비서 이브입니다.";

/// Characters the narrative must not contain; emphasis goes through HTML tags instead.
pub const FORBIDDEN_MARKDOWN: [char; 2] = ['*', '#'];

const PERSONA: &str = "너는 사용자의 스마트한 경제 비서이자 전속 아나운서인 '이브(Eve)'야.";

fn formatting_rules() -> String {
    [
        format!("1. 시작할 때 반드시 \"{GREETING}\" 라고 다정하게 인사할 것."),
        "2. 절대로 마크다운 기호(*, #, -, ` 등)를 사용하지 말 것.".to_string(),
        "3. 강조는 반드시 HTML <b> 태그로, 줄바꿈은 <br> 태그만 사용할 것.".to_string(),
        "4. 어려운 용어는 반드시 <abbr title='뜻'>용어</abbr> 태그를 사용할 것.".to_string(),
        "5. 특정 종목의 매수/매도를 권유하지 말고, 중립적이고 객관적인 표현만 사용할 것.".to_string(),
    ]
    .join("\n")
}

/// `label:value(percent%)` for every indicator present, in indicator order.
pub fn data_line(quotes: &BTreeMap<Indicator, Quote>) -> String {
    quotes
        .iter()
        .map(|(indicator, q)| {
            format!("{}:{:.2}({:.2}%)", indicator.label(), q.current, q.percent_change)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Deterministic prompt. With `issue` set, the breaking-news template is used and the issue
/// text is embedded verbatim.
pub fn build_prompt(
    quotes: &BTreeMap<Indicator, Quote>,
    headlines: &Headlines,
    issue: Option<&str>,
) -> String {
    let task = match issue {
        None => [
            "위 데이터를 바탕으로 아래 세 가지 항목을 포함한 모닝 브리핑을 작성해.",
            "- [시장의 날씨와 변화량]: 날씨 이모티콘으로 분위기를 표현하고 수치 변화를 설명.",
            "- [오늘의 KOSPI 타격 예상]: 미국 증시 결과가 한국 증시에 미칠 영향.",
            "- [국내 부동산/대출 금리 영향]: 미 국채 금리와 환율이 한국 시장 금리에 미칠 영향.",
        ]
        .join("\n"),
        Some(issue) => format!(
            "지금 시장에 긴급 이슈가 발생했어. 관리자가 전달한 이슈 내용은 다음과 같아.\n\
             [긴급 이슈] {issue}\n\
             위 이슈가 시장 데이터와 한국 경제에 미칠 영향을 속보 형식으로 짧고 명확하게 분석해."
        ),
    };

    format!(
        "{PERSONA}\n\n\
         [데이터] {}\n\
         [뉴스]\n{}\n\n\
         {task}\n\n\
         [매우 중요 규칙]\n{}\n",
        data_line(quotes),
        headlines.numbered(),
        formatting_rules(),
    )
}

/// One model call; the response text is returned unmodified and any failure propagates.
pub async fn generate_narrative(
    llm: &dyn LlmClient,
    quotes: &BTreeMap<Indicator, Quote>,
    headlines: &Headlines,
    issue: Option<&str>,
) -> anyhow::Result<String> {
    let prompt = build_prompt(quotes, headlines, issue);
    let narrative = llm.generate_text(&prompt).await?;

    if !follows_format(&narrative) {
        tracing::warn!(
            provider = ?llm.provider(),
            "narrative does not start with the greeting or contains markdown characters"
        );
    }
    Ok(narrative)
}

/// Greeting first, no markdown emphasis characters.
pub fn follows_format(narrative: &str) -> bool {
    narrative.trim_start().starts_with(GREETING) && !narrative.contains(FORBIDDEN_MARKDOWN)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::llm::fakes::FakeLlm;

    pub(crate) fn scenario_quotes() -> BTreeMap<Indicator, Quote> {
        let q = |symbol: &str, current, change, percent_change| Quote {
            symbol: symbol.to_string(),
            current,
            change,
            percent_change,
        };
        BTreeMap::from([
            (Indicator::Nasdaq, q("^IXIC", 18000.0, 50.0, 0.28)),
            (Indicator::Treasury10y, q("^TNX", 4.2, -0.05, -1.18)),
            (Indicator::Vix, q("^VIX", 14.0, -1.0, -6.67)),
            (Indicator::UsdKrw, q("KRW=X", 1320.0, 5.0, 0.38)),
        ])
    }

    pub(crate) fn scenario_headlines() -> Headlines {
        Headlines::Titles(vec!["Fed holds rates".into(), "Tech rally continues".into()])
    }

    #[test]
    fn data_line_formats_label_value_percent() {
        assert_eq!(
            data_line(&scenario_quotes()),
            "나스닥:18000.00(0.28%), 미 10년물 금리:4.20(-1.18%), VIX:14.00(-6.67%), 환율:1320.00(0.38%)"
        );
    }

    #[test]
    fn prompt_embeds_data_headlines_and_rules() {
        let prompt = build_prompt(&scenario_quotes(), &scenario_headlines(), None);
        assert!(prompt.starts_with(PERSONA));
        assert!(prompt.contains("1. Fed holds rates\n2. Tech rally continues"));
        assert!(prompt.contains(GREETING));
        assert!(prompt.contains("<abbr title='뜻'>용어</abbr>"));
        assert!(prompt.contains("<br>"));
        assert!(prompt.contains("중립적"));
        assert!(!prompt.contains("[긴급 이슈]"));
    }

    #[test]
    fn breaking_variant_echoes_issue_verbatim() {
        let issue = "FOMC 깜짝 0.5%p 인하 <발표>";
        let prompt = build_prompt(&scenario_quotes(), &Headlines::NoNews, Some(issue));
        assert!(prompt.contains(&format!("[긴급 이슈] {issue}")));
        assert!(prompt.contains(crate::domain::briefing::NO_NOTABLE_NEWS));
    }

    #[tokio::test]
    async fn scenario_narrative_starts_with_greeting_and_has_no_markdown() {
        let reply = format!("{GREETING}<br>오늘 시장은 <b>맑음</b>입니다.");
        let llm = FakeLlm::replying(&reply);

        let narrative = generate_narrative(&llm, &scenario_quotes(), &scenario_headlines(), None)
            .await
            .unwrap();

        assert_eq!(narrative, reply);
        assert!(narrative.starts_with(GREETING));
        assert!(!narrative.contains('*') && !narrative.contains('#'));
        assert!(llm.last_prompt().contains("나스닥:18000.00(0.28%)"));
    }

    #[tokio::test]
    async fn model_failure_propagates() {
        let llm = FakeLlm::default();
        let res = generate_narrative(&llm, &scenario_quotes(), &Headlines::Unavailable, None).await;
        assert!(res.is_err());
    }

    #[test]
    fn format_check() {
        assert!(follows_format(&format!("  {GREETING} 오늘은")));
        assert!(!follows_format("**안녕하세요**"));
        assert!(!follows_format(&format!("{GREETING} # 제목")));
    }
}

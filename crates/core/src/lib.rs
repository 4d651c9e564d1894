pub mod app;
pub mod domain;
pub mod llm;
pub mod market;
pub mod notify;
pub mod pipeline;
pub mod storage;
pub mod time;

pub mod config {
    use anyhow::Context;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub llm_provider: Option<String>,
        pub gemini_api_key: Option<String>,
        pub anthropic_api_key: Option<String>,
        pub sender_email: Option<String>,
        pub app_password: Option<String>,
        pub smtp_host: Option<String>,
        pub smtp_port: Option<u16>,
        pub gcp_credentials: Option<String>,
        pub subscriber_sheet_id: Option<String>,
        pub subscriber_sheet_name: Option<String>,
        pub telegram_bot_token: Option<String>,
        pub telegram_chat_id: Option<String>,
        pub admin_password: Option<String>,
        pub allowed_signup_domains: Option<Vec<String>>,
        pub briefing_cache_ttl_secs: Option<u64>,
        pub session_ttl_secs: Option<u64>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                llm_provider: non_empty_var("LLM_PROVIDER"),
                // API_KEY is the older name for the Gemini key.
                gemini_api_key: non_empty_var("GEMINI_API_KEY").or_else(|| non_empty_var("API_KEY")),
                anthropic_api_key: non_empty_var("ANTHROPIC_API_KEY"),
                sender_email: non_empty_var("SENDER_EMAIL"),
                app_password: non_empty_var("APP_PASSWORD"),
                smtp_host: non_empty_var("SMTP_HOST"),
                smtp_port: parse_var("SMTP_PORT")?,
                gcp_credentials: non_empty_var("GCP_CREDENTIALS"),
                subscriber_sheet_id: non_empty_var("SUBSCRIBER_SHEET_ID"),
                subscriber_sheet_name: non_empty_var("SUBSCRIBER_SHEET_NAME"),
                telegram_bot_token: non_empty_var("TELEGRAM_BOT_TOKEN"),
                telegram_chat_id: non_empty_var("TELEGRAM_CHAT_ID"),
                admin_password: non_empty_var("ADMIN_PASSWORD"),
                allowed_signup_domains: non_empty_var("ALLOWED_SIGNUP_DOMAINS")
                    .map(|s| parse_domain_list(&s)),
                briefing_cache_ttl_secs: parse_var("BRIEFING_CACHE_TTL_SECS")?,
                session_ttl_secs: parse_var("SESSION_TTL_SECS")?,
                sentry_dsn: non_empty_var("SENTRY_DSN"),
            })
        }

        pub fn require_gemini_api_key(&self) -> anyhow::Result<&str> {
            self.gemini_api_key
                .as_deref()
                .context("API_KEY (or GEMINI_API_KEY) is required")
        }

        pub fn require_anthropic_api_key(&self) -> anyhow::Result<&str> {
            self.anthropic_api_key
                .as_deref()
                .context("ANTHROPIC_API_KEY is required")
        }

        pub fn require_sender_email(&self) -> anyhow::Result<&str> {
            self.sender_email
                .as_deref()
                .context("SENDER_EMAIL is required")
        }

        pub fn require_app_password(&self) -> anyhow::Result<&str> {
            self.app_password
                .as_deref()
                .context("APP_PASSWORD is required")
        }

        pub fn require_gcp_credentials(&self) -> anyhow::Result<&str> {
            self.gcp_credentials
                .as_deref()
                .context("GCP_CREDENTIALS is required")
        }

        pub fn require_subscriber_sheet_id(&self) -> anyhow::Result<&str> {
            self.subscriber_sheet_id
                .as_deref()
                .context("SUBSCRIBER_SHEET_ID is required")
        }

        /// Telegram is optional; both the token and the chat id must be present.
        pub fn telegram(&self) -> Option<(&str, &str)> {
            Some((
                self.telegram_bot_token.as_deref()?,
                self.telegram_chat_id.as_deref()?,
            ))
        }
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|s| !s.trim().is_empty())
    }

    fn parse_var<T>(key: &str) -> anyhow::Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match non_empty_var(key) {
            Some(s) => Ok(Some(
                s.trim()
                    .parse::<T>()
                    .with_context(|| format!("{key} has an invalid value: {s}"))?,
            )),
            None => Ok(None),
        }
    }

    pub(crate) fn parse_domain_list(s: &str) -> Vec<String> {
        s.split(',')
            .map(|d| d.trim().to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect()
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn domain_list_is_trimmed_and_lowercased() {
            assert_eq!(
                parse_domain_list(" Gmail.com, ,naver.COM "),
                vec!["gmail.com".to_string(), "naver.com".to_string()]
            );
        }
    }
}

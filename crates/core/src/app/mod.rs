pub mod cache;
pub mod command;
pub mod session;

use crate::app::cache::{BriefingCache, DEFAULT_BRIEFING_TTL_SECS};
use crate::app::command::{Command, CommandError, CommandOutcome, NoticeLevel};
use crate::app::session::SessionContext;
use crate::config::Settings;
use crate::domain::briefing::Briefing;
use crate::domain::subscriber::{validate_signup, Subscriber, DEFAULT_ALLOWED_DOMAINS};
use crate::llm::LlmClient;
use crate::market::yahoo::YahooFinanceClient;
use crate::market::{MarketDataProvider, NewsProvider};
use crate::notify::mail::{Edition, Letter};
use crate::notify::smtp::SmtpMailer;
use crate::notify::telegram::TelegramNotifier;
use crate::notify::{ChannelNotifier, Mailer};
use crate::storage::sheets::GoogleSheetsStore;
use crate::storage::SubscriberStore;
use crate::time::kst;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

// Upper bound for configured TTLs (ten years).
const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 3600;

pub(crate) fn ttl_duration(secs: u64) -> Duration {
    Duration::seconds(secs.min(MAX_TTL_SECS) as i64)
}

/// External collaborators. Store, mailer and channel are optional so the front end can run
/// with a partial configuration; commands that need a missing one are rejected.
pub struct Services {
    pub market: Arc<dyn MarketDataProvider>,
    pub news: Arc<dyn NewsProvider>,
    pub llm: Arc<dyn LlmClient>,
    pub store: Option<Arc<dyn SubscriberStore>>,
    pub mailer: Option<Arc<dyn Mailer>>,
    pub channel: Option<Arc<dyn ChannelNotifier>>,
}

#[derive(Debug, Clone)]
pub struct Policy {
    pub admin_password: Option<String>,
    pub allowed_domains: Vec<String>,
    /// Recipient of "send to me" when nobody is logged in.
    pub fallback_recipient: Option<String>,
    pub briefing_ttl_secs: u64,
}

impl Policy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            admin_password: settings.admin_password.clone(),
            allowed_domains: settings.allowed_signup_domains.clone().unwrap_or_else(|| {
                DEFAULT_ALLOWED_DOMAINS.iter().map(|d| d.to_string()).collect()
            }),
            fallback_recipient: settings.sender_email.clone(),
            briefing_ttl_secs: settings
                .briefing_cache_ttl_secs
                .unwrap_or(DEFAULT_BRIEFING_TTL_SECS),
        }
    }
}

pub struct App {
    services: Services,
    policy: Policy,
    cache: BriefingCache,
}

impl App {
    pub fn new(services: Services, policy: Policy) -> Self {
        let cache = BriefingCache::new(policy.briefing_ttl_secs);
        Self {
            services,
            policy,
            cache,
        }
    }

    /// Wires the production clients. Market data and the model are required; the subscriber
    /// store, mailer and channel degrade to "not configured" with an error log.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let yahoo = Arc::new(YahooFinanceClient::from_env()?);
        let llm: Arc<dyn LlmClient> = Arc::from(crate::llm::from_settings(settings)?);

        let store: Option<Arc<dyn SubscriberStore>> = match GoogleSheetsStore::from_settings(settings) {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "subscriber store disabled");
                None
            }
        };
        let mailer: Option<Arc<dyn Mailer>> = match SmtpMailer::from_settings(settings) {
            Ok(mailer) => Some(Arc::new(mailer)),
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "mailer disabled");
                None
            }
        };
        let channel: Option<Arc<dyn ChannelNotifier>> = match TelegramNotifier::from_settings(settings) {
            Ok(Some(channel)) => Some(Arc::new(channel)),
            Ok(None) => None,
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "telegram channel disabled");
                None
            }
        };

        Ok(Self::new(
            Services {
                market: yahoo.clone(),
                news: yahoo,
                llm,
                store,
                mailer,
                channel,
            },
            Policy::from_settings(settings),
        ))
    }

    /// Runs one command against the caller's session.
    ///
    /// Expected rejections come back as [`CommandError`] inside the error; everything else
    /// is an operational failure of the external call that produced it.
    pub async fn handle(&self, ctx: &mut SessionContext, cmd: Command) -> anyhow::Result<CommandOutcome> {
        let now = Utc::now();
        tracing::info!(session = %ctx.id, command = cmd.name(), "handling command");

        let mut outcome = match cmd {
            Command::FetchBriefing => self.fetch_briefing(ctx, now).await?,
            Command::SendSingle => self.send_single(ctx, now).await?,
            Command::Broadcast {
                password,
                issue,
                dry_run,
            } => {
                self.broadcast(ctx, now, &password, issue.as_deref(), dry_run)
                    .await?
            }
            Command::Subscribe { email, newsletter } => {
                self.subscribe(ctx, now, email, newsletter).await?
            }
            Command::Logout => {
                ctx.logged_in_user = None;
                CommandOutcome::default()
            }
        };

        outcome.logged_in_user = ctx.logged_in_user.clone();
        Ok(outcome)
    }

    /// The shared briefing and the moment its cache slot expires.
    async fn cached_briefing(&self, now: DateTime<Utc>) -> anyhow::Result<(Briefing, DateTime<Utc>)> {
        let s = &self.services;
        self.cache
            .get_or_refresh(now, || {
                crate::pipeline::build_briefing(s.market.as_ref(), s.news.as_ref(), s.llm.as_ref(), None)
            })
            .await
    }

    async fn fetch_briefing(&self, ctx: &mut SessionContext, now: DateTime<Utc>) -> anyhow::Result<CommandOutcome> {
        let (briefing, expires_at) = self.cached_briefing(now).await?;
        ctx.set_briefing(briefing.clone(), expires_at);
        Ok(CommandOutcome {
            briefing: Some(briefing),
            ..Default::default()
        })
    }

    async fn send_single(&self, ctx: &mut SessionContext, now: DateTime<Utc>) -> anyhow::Result<CommandOutcome> {
        let mailer = self.services.mailer.as_ref().ok_or(CommandError::Unavailable("mailer"))?;
        let briefing = ctx.briefing(now).ok_or(CommandError::NoBriefing)?;

        let mut outcome = CommandOutcome::default();
        let recipient = match &ctx.logged_in_user {
            Some(user) => user.clone(),
            None => {
                outcome.notice(
                    NoticeLevel::Warning,
                    "로그인 후 이용하시면 입력하신 이메일로 발송됩니다! (현재는 테스트 계정으로 발송됩니다)",
                );
                self.policy
                    .fallback_recipient
                    .clone()
                    .ok_or(CommandError::Unavailable("fallback recipient"))?
            }
        };

        let letter = letter_for(briefing, now)?;
        crate::notify::send_single(mailer.as_ref(), &letter, &recipient).await?;
        outcome.notice(NoticeLevel::Success, "메일 발송 성공!");
        Ok(outcome)
    }

    async fn broadcast(
        &self,
        ctx: &mut SessionContext,
        now: DateTime<Utc>,
        password: &str,
        issue: Option<&str>,
        dry_run: bool,
    ) -> anyhow::Result<CommandOutcome> {
        let expected = self
            .policy
            .admin_password
            .as_deref()
            .ok_or(CommandError::BroadcastDisabled)?;
        if password != expected {
            tracing::warn!(session = %ctx.id, "admin broadcast rejected: wrong password");
            return Err(CommandError::Unauthorized.into());
        }

        let store = self.services.store.as_ref().ok_or(CommandError::Unavailable("subscriber store"))?;
        let issue = issue.map(str::trim).filter(|s| !s.is_empty());

        let (briefing, expires_at) = match issue {
            Some(issue) => {
                let s = &self.services;
                let fresh =
                    crate::pipeline::build_briefing(s.market.as_ref(), s.news.as_ref(), s.llm.as_ref(), Some(issue))
                        .await?;
                (fresh, now + self.cache.ttl())
            }
            None => self.cached_briefing(now).await?,
        };
        ctx.set_briefing(briefing.clone(), expires_at);

        let mut outcome = CommandOutcome::default();
        if dry_run {
            let recipients = crate::storage::load_recipients(store.as_ref()).await?;
            outcome.dry_run_recipients = Some(recipients.len());
            outcome.notice(
                NoticeLevel::Info,
                format!("드라이런: {}명에게 발송될 예정입니다. 실제 발송은 하지 않았습니다.", recipients.len()),
            );
            outcome.briefing = Some(briefing);
            return Ok(outcome);
        }

        let mailer = self.services.mailer.as_ref().ok_or(CommandError::Unavailable("mailer"))?;
        let letter = letter_for(&briefing, now)?;
        let report = crate::notify::broadcast(mailer.as_ref(), store.as_ref(), &letter).await?;

        if let Some(channel) = &self.services.channel {
            channel.notify_channel(&briefing.narrative).await;
        }

        let level = if report.failed.is_empty() {
            NoticeLevel::Success
        } else {
            NoticeLevel::Warning
        };
        outcome.notice(
            level,
            format!(
                "{}명 중 {}명에게 발송했습니다. (실패 {}건)",
                report.recipients,
                report.sent,
                report.failed.len()
            ),
        );
        outcome.broadcast = Some(report);
        outcome.briefing = Some(briefing);
        Ok(outcome)
    }

    async fn subscribe(
        &self,
        ctx: &mut SessionContext,
        now: DateTime<Utc>,
        email: String,
        newsletter: bool,
    ) -> anyhow::Result<CommandOutcome> {
        let email = email.trim().to_string();
        validate_signup(&email, &self.policy.allowed_domains).map_err(CommandError::Signup)?;

        ctx.logged_in_user = Some(email.clone());
        let mut outcome = CommandOutcome::default();

        if !newsletter {
            outcome.notice(
                NoticeLevel::Success,
                "성공적으로 로그인되었습니다! (브리핑 메일은 발송되지 않습니다.)",
            );
            return Ok(outcome);
        }

        let subscriber = Subscriber {
            email,
            signup_time: kst::signup_time(now)?,
        };
        let appended = match &self.services.store {
            Some(store) => store.append(&subscriber).await,
            None => Err(CommandError::Unavailable("subscriber store").into()),
        };

        match appended {
            Ok(()) => outcome.notice(NoticeLevel::Success, "가입 및 브리핑 구독이 완료되었습니다!"),
            Err(err) => {
                tracing::error!(email = %subscriber.email, error = %format!("{err:#}"), "subscriber append failed");
                outcome.notice(
                    NoticeLevel::Error,
                    format!("로그인은 되었으나, 구독 명단 저장에 실패했습니다. 관리자에게 문의하세요. ({err})"),
                );
            }
        }
        Ok(outcome)
    }
}

fn letter_for(briefing: &Briefing, now: DateTime<Utc>) -> anyhow::Result<Letter> {
    let edition = if briefing.issue.is_some() {
        Edition::Breaking
    } else {
        Edition::Morning
    };
    Ok(Letter::briefing(
        edition,
        kst::briefing_date(now)?,
        &briefing.narrative,
        &briefing.headlines,
    ))
}

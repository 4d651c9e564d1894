pub mod mail;
pub mod smtp;
pub mod telegram;

use crate::notify::mail::Letter;
use crate::storage::{load_recipients, SubscriberStore};
use anyhow::Context;
use serde::Serialize;

/// Opens one authenticated mail-server session.
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn open_session(&self) -> anyhow::Result<Box<dyn MailSession>>;
}

#[async_trait::async_trait]
pub trait MailSession: Send + Sync {
    async fn send(&self, to: &str, letter: &Letter) -> anyhow::Result<()>;
}

/// Posts flat text to a chat channel. Failures are logged, never returned.
#[async_trait::async_trait]
pub trait ChannelNotifier: Send + Sync {
    async fn notify_channel(&self, text: &str);
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    pub recipients: usize,
    pub sent: usize,
    pub failed: Vec<String>,
}

/// Reads every subscriber, deduplicates, and sends `letter` to each over one session.
///
/// A store read failure or a failed session login aborts before anything is sent. A failure
/// for one recipient is logged and skipped. Calling this twice sends everything twice.
pub async fn broadcast(
    mailer: &dyn Mailer,
    store: &dyn SubscriberStore,
    letter: &Letter,
) -> anyhow::Result<BroadcastReport> {
    let recipients = load_recipients(store).await?;
    send_to_all(mailer, letter, &recipients).await
}

pub async fn send_to_all(
    mailer: &dyn Mailer,
    letter: &Letter,
    recipients: &[String],
) -> anyhow::Result<BroadcastReport> {
    let mut report = BroadcastReport {
        recipients: recipients.len(),
        ..Default::default()
    };
    if recipients.is_empty() {
        tracing::info!("no subscribers; nothing to send");
        return Ok(report);
    }

    let session = mailer
        .open_session()
        .await
        .context("failed to open mail session")?;

    for to in recipients {
        match session.send(to, letter).await {
            Ok(()) => {
                report.sent += 1;
                tracing::info!(recipient = %to, "briefing sent");
            }
            Err(err) => {
                let error = format!("{err:#}");
                tracing::warn!(recipient = %to, %error, "briefing send failed; skipping");
                report.failed.push(to.clone());
            }
        }
    }

    tracing::info!(
        recipients = report.recipients,
        sent = report.sent,
        failed = report.failed.len(),
        "broadcast finished"
    );
    Ok(report)
}

/// Single-recipient variant: same letter, its own session, errors returned to the caller.
pub async fn send_single(mailer: &dyn Mailer, letter: &Letter, to: &str) -> anyhow::Result<()> {
    let session = mailer
        .open_session()
        .await
        .context("failed to open mail session")?;
    session
        .send(to, letter)
        .await
        .with_context(|| format!("failed to send briefing to {to}"))
}


#[cfg(test)]
mod tests {
    use super::fakes::FakeMailer;
    use super::*;
    use crate::domain::briefing::Headlines;
    use crate::notify::mail::Edition;
    use crate::storage::fakes::MemoryStore;
    use chrono::NaiveDate;

    fn letter() -> Letter {
        Letter::briefing(
            Edition::Morning,
            NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            "안녕하세요!",
            &Headlines::NoNews,
        )
    }

    #[tokio::test]
    async fn one_bad_recipient_does_not_block_others() {
        let mailer = FakeMailer {
            bad_recipients: vec!["bad@x.com".to_string()],
            ..Default::default()
        };
        let store = MemoryStore::with_emails(&["ok1@x.com", "bad@x.com", "ok2@x.com"]);

        let report = broadcast(&mailer, &store, &letter()).await.unwrap();

        assert_eq!(report.sent, 2);
        assert_eq!(report.failed, vec!["bad@x.com"]);
        assert_eq!(mailer.delivered_to(), vec!["ok1@x.com", "ok2@x.com"]);
        assert_eq!(mailer.session_count(), 1);
    }

    #[tokio::test]
    async fn header_only_sheet_sends_nothing() {
        let mailer = FakeMailer::default();
        let store = MemoryStore::with_emails(&[]);

        let report = broadcast(&mailer, &store, &letter()).await.unwrap();

        assert_eq!(report.sent, 0);
        assert_eq!(report.recipients, 0);
        assert_eq!(mailer.session_count(), 0);
    }

    #[tokio::test]
    async fn repeated_broadcast_reports_same_count_but_sends_twice() {
        let mailer = FakeMailer::default();
        let store = MemoryStore::with_emails(&["a@x.com", "A@x.com", "a@x.com", "b@y.com"]);

        let first = broadcast(&mailer, &store, &letter()).await.unwrap();
        let second = broadcast(&mailer, &store, &letter()).await.unwrap();

        assert_eq!(first.sent, 3);
        assert_eq!(first, second);
        assert_eq!(mailer.delivered_to().len(), 6);
    }

    #[tokio::test]
    async fn login_failure_aborts_before_sending() {
        let mailer = FakeMailer {
            fail_login: true,
            ..Default::default()
        };
        let store = MemoryStore::with_emails(&["a@x.com"]);

        assert!(broadcast(&mailer, &store, &letter()).await.is_err());
        assert!(mailer.delivered_to().is_empty());
    }

    #[tokio::test]
    async fn store_failure_aborts_before_login() {
        let mailer = FakeMailer::default();
        let store = MemoryStore {
            fail_reads: true,
            ..Default::default()
        };

        assert!(broadcast(&mailer, &store, &letter()).await.is_err());
        assert_eq!(mailer.session_count(), 0);
    }

    #[tokio::test]
    async fn single_send_surfaces_errors() {
        let mailer = FakeMailer {
            bad_recipients: vec!["me@x.com".to_string()],
            ..Default::default()
        };
        assert!(send_single(&mailer, &letter(), "me@x.com").await.is_err());
        assert!(send_single(&mailer, &letter(), "you@x.com").await.is_ok());
        assert_eq!(mailer.delivered_to(), vec!["you@x.com"]);
    }
}

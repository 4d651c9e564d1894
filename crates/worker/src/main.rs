use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use econbrief_core::config::Settings;
use econbrief_core::llm::LlmClient;
use econbrief_core::market::yahoo::YahooFinanceClient;
use econbrief_core::notify::mail::{Edition, Letter};
use econbrief_core::notify::smtp::SmtpMailer;
use econbrief_core::notify::telegram::TelegramNotifier;
use econbrief_core::notify::ChannelNotifier;
use econbrief_core::storage::sheets::GoogleSheetsStore;

#[derive(Debug, Parser)]
#[command(name = "econbrief_worker")]
struct Args {
    /// Build the briefing and resolve recipients, but send nothing.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let started_at = chrono::Utc::now();
    let date = econbrief_core::time::kst::briefing_date(started_at)?;

    let yahoo = YahooFinanceClient::from_env()?;
    let llm: Arc<dyn LlmClient> = Arc::from(econbrief_core::llm::from_settings(&settings)?);

    let briefing = econbrief_core::pipeline::build_briefing(&yahoo, &yahoo, llm.as_ref(), None).await?;
    tracing::info!(%date, provider = ?llm.provider(), "morning briefing generated");

    let recipients = match load_recipients(&settings).await {
        Ok(recipients) => recipients,
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %format!("{err:#}"), "subscriber list unavailable; nothing sent");
            return Ok(());
        }
    };

    if recipients.is_empty() {
        tracing::info!(%date, "no subscribers; nothing to send");
        return Ok(());
    }

    if args.dry_run {
        tracing::info!(%date, dry_run = true, recipients = recipients.len(), "morning run (dry-run)");
        return Ok(());
    }

    let mailer = SmtpMailer::from_settings(&settings)?;
    let letter = Letter::briefing(Edition::Morning, date, &briefing.narrative, &briefing.headlines);
    let report = econbrief_core::notify::send_to_all(&mailer, &letter, &recipients).await?;

    tracing::info!(
        %date,
        recipients = report.recipients,
        sent = report.sent,
        failed = report.failed.len(),
        "morning briefing sent"
    );

    match TelegramNotifier::from_settings(&settings) {
        Ok(Some(channel)) => channel.notify_channel(&briefing.narrative).await,
        Ok(None) => tracing::debug!("telegram channel not configured"),
        Err(err) => tracing::warn!(error = %format!("{err:#}"), "telegram channel skipped"),
    }

    Ok(())
}

async fn load_recipients(settings: &Settings) -> anyhow::Result<Vec<String>> {
    let store = GoogleSheetsStore::from_settings(settings)?;
    econbrief_core::storage::load_recipients(&store).await
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dry_run_flag_is_optional() {
        assert!(!Args::parse_from(["econbrief_worker"]).dry_run);
        assert!(Args::parse_from(["econbrief_worker", "--dry-run"]).dry_run);
    }
}

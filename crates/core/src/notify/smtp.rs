use crate::config::Settings;
use crate::notify::mail::Letter;
use crate::notify::{MailSession, Mailer};
use anyhow::Context;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::PoolConfig;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

const DEFAULT_HOST: &str = "smtp.gmail.com";
const DEFAULT_PORT: u16 = 465;
const IMPLICIT_TLS_PORT: u16 = 465;

#[derive(Debug, Clone)]
pub struct SmtpMailer {
    host: String,
    port: u16,
    sender: String,
    password: String,
}

impl SmtpMailer {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        Ok(Self {
            host: settings
                .smtp_host
                .clone()
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: settings.smtp_port.unwrap_or(DEFAULT_PORT),
            sender: settings.require_sender_email()?.to_string(),
            password: settings.require_app_password()?.to_string(),
        })
    }

    fn transport(&self) -> anyhow::Result<AsyncSmtpTransport<Tokio1Executor>> {
        let builder = if self.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
        }
        .with_context(|| format!("invalid SMTP host: {}", self.host))?;

        // One pooled connection: every message of a batch reuses the same session.
        Ok(builder
            .port(self.port)
            .credentials(Credentials::new(self.sender.clone(), self.password.clone()))
            .pool_config(PoolConfig::new().max_size(1))
            .build())
    }
}

#[async_trait::async_trait]
impl Mailer for SmtpMailer {
    async fn open_session(&self) -> anyhow::Result<Box<dyn MailSession>> {
        let transport = self.transport()?;
        let ok = transport
            .test_connection()
            .await
            .with_context(|| format!("SMTP login to {}:{} failed", self.host, self.port))?;
        anyhow::ensure!(ok, "SMTP server {}:{} rejected the connection", self.host, self.port);

        let from: Mailbox = self
            .sender
            .parse()
            .with_context(|| format!("SENDER_EMAIL is not a valid address: {}", self.sender))?;

        tracing::debug!(host = %self.host, port = self.port, "SMTP session opened");
        Ok(Box::new(SmtpSession { transport, from }))
    }
}

struct SmtpSession {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpSession {
    fn message(&self, to: &str, letter: &Letter) -> anyhow::Result<Message> {
        let to: Mailbox = to
            .parse()
            .with_context(|| format!("invalid recipient address: {to}"))?;
        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(letter.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(letter.html.clone())
            .context("failed to build mail message")
    }
}

#[async_trait::async_trait]
impl MailSession for SmtpSession {
    async fn send(&self, to: &str, letter: &Letter) -> anyhow::Result<()> {
        let message = self.message(to, letter)?;
        self.transport
            .send(message)
            .await
            .with_context(|| format!("SMTP send to {to} failed"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::briefing::Headlines;
    use crate::notify::mail::Edition;
    use chrono::NaiveDate;

    fn mailer(port: u16) -> SmtpMailer {
        SmtpMailer {
            host: DEFAULT_HOST.to_string(),
            port,
            sender: "eve@gmail.com".to_string(),
            password: "app-password".to_string(),
        }
    }

    fn session() -> SmtpSession {
        SmtpSession {
            transport: mailer(DEFAULT_PORT).transport().unwrap(),
            from: "eve@gmail.com".parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn builds_html_message() {
        let letter = Letter::briefing(
            Edition::Morning,
            NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            "<b>맑음</b>",
            &Headlines::NoNews,
        );
        let msg = session().message("reader@naver.com", &letter).unwrap();
        let raw = String::from_utf8(msg.formatted()).unwrap();
        assert!(raw.contains("To: reader@naver.com"));
        assert!(raw.contains("Content-Type: text/html"));
    }

    #[tokio::test]
    async fn rejects_unparseable_recipient() {
        let letter = Letter {
            subject: "s".to_string(),
            html: "<p>x</p>".to_string(),
        };
        assert!(session().message("reader-at-naver.com", &letter).is_err());
    }

    #[tokio::test]
    async fn starttls_is_used_off_port_465() {
        assert!(mailer(587).transport().is_ok());
    }
}

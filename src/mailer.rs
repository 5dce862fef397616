use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::AppConfig;

/// Outbound email seam. Best-effort: a failed send is terminal for the
/// request, never retried here.
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        text: Option<&str>,
        html: Option<&str>,
    ) -> Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// `None` when SMTP is not configured; the caller falls back to the
    /// tracing-only mailer.
    pub fn from_config(config: &AppConfig) -> Result<Option<Self>> {
        let Some(host) = config.smtp_host.as_deref() else {
            return Ok(None);
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .context("failed to configure SMTP relay")?;
        if let (Some(username), Some(password)) =
            (config.smtp_username.clone(), config.smtp_password.clone())
        {
            builder = builder.credentials(Credentials::new(username, password));
        }

        let from = config
            .email_from
            .parse::<Mailbox>()
            .context("EMAIL_FROM is not a valid mailbox")?;

        Ok(Some(Self {
            transport: builder.build(),
            from,
        }))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        text: Option<&str>,
        html: Option<&str>,
    ) -> Result<()> {
        let builder = Message::builder()
            .from(self.from.clone())
            .to(to.parse::<Mailbox>().context("invalid recipient address")?)
            .subject(subject);

        let message = match (text, html) {
            (Some(text), Some(html)) => builder.multipart(MultiPart::alternative_plain_html(
                text.to_string(),
                html.to_string(),
            ))?,
            (None, Some(html)) => builder.singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_HTML)
                    .body(html.to_string()),
            )?,
            (text, None) => builder.body(text.unwrap_or_default().to_string())?,
        };

        self.transport
            .send(message)
            .await
            .context("failed to send email")?;
        Ok(())
    }
}

/// Fallback for deployments without SMTP: the message is logged, not sent.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        text: Option<&str>,
        _html: Option<&str>,
    ) -> Result<()> {
        tracing::info!(to, subject, body = text.unwrap_or(""), "email suppressed (no SMTP configured)");
        Ok(())
    }
}

//! Report notifications over Slack webhooks and SMTP email.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use serde_json::json;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook returned {0}")]
    Status(u16),

    #[error("no recipients")]
    NoRecipients,

    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("failed to build email: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("send task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A message to deliver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Notification {
    /// Email subject. Slack ignores it.
    pub subject: String,
    pub text: String,
    /// Slack channel; `None` uses the webhook's default.
    pub channel: Option<String>,
    /// Email recipients. Slack ignores them.
    pub recipients: Vec<String>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Posts to a Slack incoming webhook.
pub struct SlackWebhookNotifier {
    inner: reqwest::Client,
    webhook_url: String,
}

impl SlackWebhookNotifier {
    pub fn new(webhook_url: &str, timeout: Duration) -> Result<Self, NotifyError> {
        let inner = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            inner,
            webhook_url: webhook_url.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for SlackWebhookNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let mut body = json!({ "text": notification.text });
        if let Some(channel) = &notification.channel {
            body["channel"] = json!(channel);
        }

        let response = self.inner.post(&self.webhook_url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

/// SMTP account used for report emails.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Sender address; defaults to the username.
    pub from: Option<String>,
    pub timeout: Duration,
}

/// Sends email through an SMTP relay with STARTTLS.
pub struct SmtpNotifier {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self, NotifyError> {
        let from = config
            .from
            .as_deref()
            .unwrap_or(&config.username)
            .parse::<Mailbox>()?;

        let transport = SmtpTransport::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(Some(config.timeout))
            .build();

        Ok(Self { transport, from })
    }

    fn message(&self, notification: &Notification) -> Result<Message, NotifyError> {
        if notification.recipients.is_empty() {
            return Err(NotifyError::NoRecipients);
        }

        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(notification.subject.as_str());
        for recipient in &notification.recipients {
            builder = builder.to(recipient.parse::<Mailbox>()?);
        }
        Ok(builder.body(notification.text.clone())?)
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let message = self.message(notification)?;
        let transport = self.transport.clone();

        tokio::task::spawn_blocking(move || transport.send(&message)).await??;
        info!(recipients = notification.recipients.len(), "Email sent");
        Ok(())
    }
}

/// Writes notifications to the log. Used for channels with nothing configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            channel = notification.channel.as_deref().unwrap_or("default"),
            recipients = notification.recipients.len(),
            chars = notification.text.len(),
            "Notification (log only)"
        );
        Ok(())
    }
}

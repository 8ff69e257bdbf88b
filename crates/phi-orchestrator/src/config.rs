//! Orchestrator configuration.

use std::time::Duration;

use crate::clients::SmtpConfig;
use crate::retry::RetryPolicy;
use crate::store::StalenessPolicy;

/// How the remote-dispatch stage waits for a tool task to resolve.
#[derive(Debug, Clone, Copy)]
pub struct DispatchConfig {
    /// How often the stored status is re-read while waiting.
    pub poll_interval: Duration,

    /// Give up (and use fallback data) after this long.
    pub max_wait: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            max_wait: Duration::from_secs(60),
        }
    }
}

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server bind address.
    pub bind_addr: String,

    /// Base URL of the core API (agent profiles, document search).
    pub core_api_url: String,

    /// Per-request timeout for core API calls (seconds).
    pub core_api_timeout_secs: u64,

    /// Global deadline for one workflow run (seconds).
    pub task_timeout_secs: u64,

    /// Remote tool wait settings.
    pub dispatch: DispatchConfig,

    /// Retry policy for collaborator and LLM calls.
    pub retry: RetryPolicy,

    /// Treat local agents as gone after this many seconds without a heartbeat.
    /// `None` trusts the stored status.
    pub heartbeat_max_age_secs: Option<u64>,

    /// OpenAI API key. Without one, analysis falls back to a local digest.
    pub openai_api_key: Option<String>,

    /// Chat model used for analysis.
    pub openai_model: String,

    /// OpenAI-compatible API base URL.
    pub openai_base_url: String,

    /// Slack incoming webhook for report notifications.
    pub slack_webhook_url: Option<String>,

    /// SMTP relay for report emails.
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,

    /// Upper bound on one notification delivery (seconds).
    pub notify_timeout_secs: u64,
}

impl Config {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }

    /// SMTP settings, if credentials are configured.
    pub fn smtp(&self) -> Option<SmtpConfig> {
        let username = self.smtp_user.clone()?;
        let password = self.smtp_password.clone()?;
        Some(SmtpConfig {
            host: self.smtp_host.clone(),
            port: self.smtp_port,
            username,
            password,
            from: self.smtp_from.clone(),
            timeout: self.notify_timeout(),
        })
    }

    pub fn staleness(&self) -> StalenessPolicy {
        StalenessPolicy {
            max_heartbeat_age: self.heartbeat_max_age_secs.map(Duration::from_secs),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8001".to_string(),
            core_api_url: "http://localhost:8000".to_string(),
            core_api_timeout_secs: 30,
            task_timeout_secs: 300,
            dispatch: DispatchConfig::default(),
            retry: RetryPolicy::default(),
            heartbeat_max_age_secs: None,
            openai_api_key: None,
            openai_model: "gpt-4".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            slack_webhook_url: None,
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            smtp_user: None,
            smtp_password: None,
            smtp_from: None,
            notify_timeout_secs: 30,
        }
    }
}

//! Phi Agents Orchestrator Server

use std::net::SocketAddr;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use phi_orchestrator::{http, AppState, Config, Services};

/// Phi Agents orchestrator
#[derive(Parser, Debug)]
#[command(name = "phi-orchestrator")]
#[command(about = "Runs agent workflows and dispatches tool calls to local agents")]
struct Args {
    /// HTTP bind address
    #[arg(long, env = "PHI_BIND_ADDR", default_value = "0.0.0.0:8001")]
    bind_addr: String,

    /// Core API base URL
    #[arg(long, env = "CORE_API_URL", default_value = "http://localhost:8000")]
    core_api_url: String,

    /// Global deadline for one workflow run, in seconds
    #[arg(long, env = "PHI_TASK_TIMEOUT", default_value_t = 300, value_parser = clap::value_parser!(u64).range(1..))]
    task_timeout: u64,

    /// How often a waiting workflow re-checks its tool task, in seconds
    #[arg(long, env = "PHI_DISPATCH_POLL_INTERVAL", default_value_t = 2, value_parser = clap::value_parser!(u64).range(1..))]
    dispatch_poll_interval: u64,

    /// How long a workflow waits for a local agent before using fallback data, in seconds
    #[arg(long, env = "PHI_DISPATCH_MAX_WAIT", default_value_t = 60)]
    dispatch_max_wait: u64,

    /// Ignore local agents whose last heartbeat is older than this, in seconds
    #[arg(long, env = "PHI_HEARTBEAT_MAX_AGE")]
    heartbeat_max_age: Option<u64>,

    /// OpenAI API key; without it analysis uses an offline digest
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Chat model used for analysis
    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4")]
    openai_model: String,

    /// Slack incoming webhook URL for report notifications
    #[arg(long, env = "SLACK_WEBHOOK_URL", hide_env_values = true)]
    slack_webhook_url: Option<String>,

    /// SMTP relay host for report emails
    #[arg(long, env = "SMTP_HOST", default_value = "smtp.gmail.com")]
    smtp_host: String,

    /// SMTP relay port (STARTTLS)
    #[arg(long, env = "SMTP_PORT", default_value_t = 587)]
    smtp_port: u16,

    /// SMTP username; emails are sent only when user and password are set
    #[arg(long, env = "SMTP_USER")]
    smtp_user: Option<String>,

    /// SMTP password
    #[arg(long, env = "SMTP_PASSWORD", hide_env_values = true)]
    smtp_password: Option<String>,

    /// Sender address, defaults to the SMTP username
    #[arg(long, env = "SMTP_FROM")]
    smtp_from: Option<String>,

    /// Give up on one notification after this many seconds
    #[arg(long, env = "PHI_NOTIFY_TIMEOUT", default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    notify_timeout: u64,
}

impl Args {
    fn into_config(self) -> Config {
        let mut config = Config {
            bind_addr: self.bind_addr,
            core_api_url: self.core_api_url,
            task_timeout_secs: self.task_timeout,
            heartbeat_max_age_secs: self.heartbeat_max_age,
            openai_api_key: self.openai_api_key.filter(|k| !k.is_empty()),
            openai_model: self.openai_model,
            slack_webhook_url: self.slack_webhook_url.filter(|u| !u.is_empty()),
            smtp_host: self.smtp_host,
            smtp_port: self.smtp_port,
            smtp_user: self.smtp_user.filter(|u| !u.is_empty()),
            smtp_password: self.smtp_password.filter(|p| !p.is_empty()),
            smtp_from: self.smtp_from.filter(|f| !f.is_empty()),
            notify_timeout_secs: self.notify_timeout,
            ..Config::default()
        };
        config.dispatch.poll_interval = std::time::Duration::from_secs(self.dispatch_poll_interval);
        config.dispatch.max_wait = std::time::Duration::from_secs(self.dispatch_max_wait);
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Args::parse().into_config();
    let addr: SocketAddr = config.bind_addr.parse()?;

    let services = Services::from_config(&config)?;
    let state = AppState::new(&config, services);

    info!(
        addr = %addr,
        core_api_url = %config.core_api_url,
        task_timeout_secs = config.task_timeout_secs,
        "Starting Phi Agents orchestrator"
    );

    let router = http::create_router(state);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_intervals_are_rejected() {
        for flag in ["--dispatch-poll-interval", "--task-timeout", "--notify-timeout"] {
            assert!(Args::try_parse_from(["phi-orchestrator", flag, "0"]).is_err(), "{flag}");
        }
    }

    #[test]
    fn test_smtp_needs_user_and_password() {
        let config = Args::try_parse_from(["phi-orchestrator", "--smtp-user", "reports@example.com"])
            .unwrap()
            .into_config();
        assert!(config.smtp().is_none());

        let config = Args::try_parse_from([
            "phi-orchestrator",
            "--smtp-user",
            "reports@example.com",
            "--smtp-password",
            "secret",
        ])
        .unwrap()
        .into_config();
        let smtp = config.smtp().unwrap();
        assert_eq!(smtp.port, 587);
        assert_eq!(smtp.username, "reports@example.com");
    }
}

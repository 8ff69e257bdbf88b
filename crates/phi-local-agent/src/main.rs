//! Phi Agents Local Agent Daemon

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use phi_local_agent::config::DEFAULT_ORCHESTRATOR_URL;
use phi_local_agent::{AgentFile, Identity, OrchestratorClient, ToolRegistry, Worker, WorkerConfig};

/// Phi Agents local agent
#[derive(Parser, Debug)]
#[command(name = "phi-local-agent")]
#[command(about = "Runs tools on this machine on behalf of the Phi orchestrator")]
struct Args {
    /// Agent YAML file
    #[arg(long, short, env = "PHI_AGENT_CONFIG", default_value = "agent.yaml")]
    config: PathBuf,

    /// Orchestrator base URL; overrides `server.base_url` in the agent file
    #[arg(long, env = "ORCHESTRATOR_URL")]
    orchestrator_url: Option<String>,

    /// Seconds between polls for tool tasks
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval: u64,

    /// Seconds between heartbeats
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    heartbeat_interval: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let agent_file = AgentFile::load(&args.config)?;

    let orchestrator_url = args
        .orchestrator_url
        .or_else(|| agent_file.server_url().map(str::to_string))
        .unwrap_or_else(|| DEFAULT_ORCHESTRATOR_URL.to_string());
    let config = WorkerConfig {
        orchestrator_url,
        poll_interval: Duration::from_secs(args.poll_interval),
        heartbeat_interval: Duration::from_secs(args.heartbeat_interval),
        ..WorkerConfig::default()
    };

    info!(
        agent_id = %agent_file.agent_id,
        org_id = %agent_file.org_id,
        orchestrator = %config.orchestrator_url,
        "Starting Phi local agent"
    );

    let tools = ToolRegistry::from_specs(&agent_file.tools)?;
    let api = Arc::new(OrchestratorClient::new(&config.orchestrator_url)?);
    let identity = Identity::new(&agent_file, &tools);
    let worker = Arc::new(Worker::register(api, tools, identity, config).await?);

    let cancel = CancellationToken::new();
    let work = tokio::spawn({
        let worker = worker.clone();
        let cancel = cancel.clone();
        async move { worker.run_work_loop(cancel).await }
    });
    let heartbeat = tokio::spawn({
        let worker = worker.clone();
        let cancel = cancel.clone();
        async move { worker.run_heartbeat_loop(cancel).await }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    cancel.cancel();

    let _ = tokio::join!(work, heartbeat);
    info!("Local agent stopped");
    Ok(())
}

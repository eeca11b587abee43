//! LLM inference gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                     GATEWAY                      │
//!   Client request       │  ┌────────┐   ┌──────────┐   ┌────────────────┐  │
//!   ─────────────────────┼─▶│  http  │──▶│ gateway  │──▶│   resilience   │  │
//!                        │  │ + auth │   │  facade  │   │    executor    │  │
//!                        │  └────────┘   └────┬─────┘   └───────┬────────┘  │
//!                        │                    │                 │           │
//!                        │                    ▼                 ▼           │
//!                        │             ┌────────────┐   ┌────────────────┐  │
//!                        │             │   models   │   │    upstream    │──┼──▶ Backend
//!                        │             │ lifecycle  │   │ transport pool │  │
//!                        │             └─────┬──────┘   └────────────────┘  │
//!   Client response      │  ┌───────────┐    │                            │
//!   ◀────────────────────┼──│ streaming │    ▼                            │
//!                        │  │   relay   │  containers / artifacts         │
//!                        │  └───────────┘                                 │
//!                        └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use llm_gateway::config;
use llm_gateway::lifecycle::{wait_for_signal, Shutdown};
use llm_gateway::observability::{logging, metrics};
use llm_gateway::GatewayServer;

#[derive(Parser)]
#[command(name = "llm-gateway", version, about = "Gateway for an OpenAI-compatible inference backend")]
struct Args {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = config::load(args.config.as_deref())?;

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "llm-gateway starting");
    if config.auth.api_key == config::schema::AuthConfig::default().api_key {
        tracing::warn!("Using the placeholder API key; set PROXY_API_KEY");
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        max_attempts = config.retries.max_attempts,
        rate_limit = config.rate_limit.enabled,
        "Configuration loaded"
    );

    let metrics_handle = if config.observability.metrics_enabled {
        metrics::init_metrics()
    } else {
        None
    };

    let server = GatewayServer::new(&config, metrics_handle)?;
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));
    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

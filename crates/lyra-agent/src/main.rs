//! # lyra-agent
//!
//! Orchestrator server binary: wires configuration, the database pool,
//! metrics, and the Axum server, then serves until a shutdown signal.

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use lyra_server::config::OrchestratorConfig;
use lyra_server::server::{router, AppState};
use lyra_server::store::ConfigStore;
use lyra_server::{metrics, session::registry::SessionRegistry};
use tokio::net::TcpListener;
use tracing::info;

/// lyra voice-agent orchestrator.
#[derive(Parser, Debug)]
#[command(name = "lyra-agent", about = "lyra voice-agent orchestrator")]
struct Cli {
    /// Host to bind (overrides configuration).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides `PORT`; 0 auto-assigns).
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    lyra_core::logging::init_subscriber("info");

    let cli = Cli::parse();
    let mut config = OrchestratorConfig::from_env();
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if config.gemini_api_key.is_none() {
        // Sessions will be rejected until the key is provided; the HTTP
        // surface still comes up so health checks pass during rollout.
        tracing::warn!("GEMINI_API_KEY is not set, all sessions will be rejected");
    }

    let store = ConfigStore::connect(config.database_url.as_deref()).await;
    if store.is_connected() {
        let instance = config.resolve_client_name(None);
        store.ensure_client(&instance).await;
    }

    let metrics_handle = metrics::install_recorder();
    let state = AppState::new(config.clone(), store, metrics_handle);
    let registry = state.registry.clone();
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %listener.local_addr()?, "lyra orchestrator listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(registry))
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

/// Resolve on SIGINT/SIGTERM, cancelling every live session first so each
/// one runs its cleanup (terminal dashboard sync included) before the
/// server stops accepting.
async fn shutdown_signal(registry: SessionRegistry) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received ctrl-c"),
        () = terminate => info!("received SIGTERM"),
    }

    registry.cancel_all().await;
}

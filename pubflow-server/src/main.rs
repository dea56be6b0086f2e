//! Webhook server that drives pubflow release orchestration.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, Level};

use pubflow_adapters::{GithubClient, NpmTool, YarnWorkspaces};
use pubflow_core::router::{default_router, EventContext};

use pubflow_server::config::ServerConfig;
use pubflow_server::server::{create_router, AppState};

#[derive(Parser)]
#[command(name = "pubflow-server")]
#[command(about = "Webhook server that drives pubflow release orchestration")]
struct Cli {
    /// Repository to orchestrate, as OWNER/NAME
    #[arg(long)]
    repo: String,

    /// Root of the local repository checkout
    #[arg(long, default_value = ".")]
    repo_root: String,

    /// Bind address
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port number
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let log_level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .init();

    // Create configuration
    let config = ServerConfig::new()
        .with_repository(&cli.repo)
        .with_repo_root(&cli.repo_root)
        .with_bind_address(&cli.bind)
        .with_port(cli.port);

    let (owner, repo) = config
        .repo_parts()
        .context("--repo must be OWNER/NAME")?;
    let token = std::env::var("GH_TOKEN").context("GH_TOKEN must be set")?;

    info!("Starting pubflow-server");
    info!("Repository: {}", config.repository);
    info!("Checkout root: {}", config.repo_root.display());
    info!("Listening on {}", config.bind_addr());

    // Wire the forge client and local tool adapters
    let forge = GithubClient::new(owner, repo, &token)?;
    let ctx = EventContext {
        forge: Arc::new(forge),
        workspace: Arc::new(YarnWorkspaces::new(&config.repo_root)),
        tool: Arc::new(NpmTool::new(&config.repo_root)),
        repo_root: config.repo_root.clone(),
    };

    // Create app state
    let state = AppState::new(ctx, default_router());

    // Create router
    let app = create_router(state);

    // Create server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr()).await?;

    // Start server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

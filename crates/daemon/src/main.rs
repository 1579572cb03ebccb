// autosyncd: watch configured working directories and auto-commit/push
// after quiet periods, with an HTTP API for history and revert.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use autosync_daemon::api::{self, AppState};
use autosync_daemon::config::Config;
use autosync_daemon::sync::Runner;

#[derive(Debug, Parser)]
#[command(name = "autosyncd", about = "Auto-commit daemon for git working directories")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "autosync.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = Config::load(&args.config)
        .with_context(|| format!("failed to load config from {}", args.config.display()))?;

    let settings = config.resolve();
    info!(repos = settings.len(), "starting autosync daemon");
    let runner = Arc::new(Runner::start(settings));

    let state = AppState::new(runner, config.auth.clone()).context("invalid auth configuration")?;
    let app = api::router(state);

    let addr = config.server.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind API listener on {addr}"))?;

    info!(listen_addr = %addr, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server exited unexpectedly")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
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
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
}

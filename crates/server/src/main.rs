mod cli;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hookrelay_core::config::{Config, LogFormat};
use hookrelay_server::{build_app_state, build_router};

use crate::cli::Cli;

fn init_tracing(config: &Config) {
    let default_level = config.log_level.as_deref().unwrap_or("info");
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
    }
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl_c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received, draining requests");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hookrelay_core::config::load_dotenv();
    let cli = Cli::parse();

    let mut config = Config::from_file(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;
    if let Some(addr) = cli.addr {
        config.addr = addr;
    }

    init_tracing(&config);
    config.log_summary();

    let state = build_app_state(&config).context("failed to initialise relay")?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    info!(addr = %config.addr, "hookrelay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("hookrelay exited cleanly");
    Ok(())
}

//! Forward Relayer binary.

use forward_relayer::{AppState, Config};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Forward Relayer");

    // Missing or unparsable settings fail hard.
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "FATAL: Config error, fix env vars or relayer.toml");
            std::process::exit(1);
        }
    };

    if config.verbose_errors {
        warn!("RELAYER_VERBOSE_ERRORS set, raw error text is returned to clients");
    }

    let bind_address = config.bind_address();
    let state = Arc::new(AppState::new(config)?);

    info!(
        relayer = %state.relayer,
        chain_id = state.config.chain_id,
        hub = %state.config.hub(),
        target = %state.config.target(),
        max_gas_price_gwei = state.config.max_gas_price_gwei,
        "Relayer ready"
    );

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    info!(address = %bind_address, "Listening");

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    forward_relayer::serve(listener, state, shutdown).await?;

    info!("Relayer shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
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
        _ = ctrl_c => info!("Received SIGINT, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}

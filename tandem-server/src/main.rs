use anyhow::{Context, Result};
use clap::Parser;
use tandem_server::{Config, SignalingService};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tandem_server=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::parse();
    config.validate().context("invalid configuration")?;

    info!("Initializing signaling server...");

    let shutdown = CancellationToken::new();
    let service = SignalingService::start(config.clone(), shutdown.clone());

    let listener = TcpListener::bind(config.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address))?;
    info!("Signaling server listening on http://{}", config.bind_address);

    axum::serve(listener, tandem_server::app(service))
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
            shutdown.cancel();
        })
        .await
        .context("server error")?;

    Ok(())
}

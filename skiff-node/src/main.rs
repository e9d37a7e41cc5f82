use anyhow::Context;
use skiff_node::runtime::check_compose_available;
use skiff_node::shutdown::install_shutdown_handler;
use skiff_node::{Bootstrap, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skiff_node=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    tracing::info!(
        "Starting Skiff node {} ({:?}), advertised at {}",
        config.node_id,
        config.role,
        config.api_endpoint
    );

    if let Err(e) = check_compose_available().await {
        tracing::warn!("App jobs will fail until docker compose is available: {:#}", e);
    }

    let bind_addr = config.bind_addr.clone();
    let node = Bootstrap::new(config).build().await?;

    let shutdown = install_shutdown_handler()?;
    let background = node.spawn_background(shutdown.clone())?;

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    let served = node.serve(listener, shutdown.clone()).await;

    // Stop the loops whether the server exited cleanly or not
    shutdown.cancel();
    for handle in background {
        if let Err(e) = handle.await {
            tracing::error!("Background task failed: {}", e);
        }
    }

    tracing::info!("Node stopped");
    served
}

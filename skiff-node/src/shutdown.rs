//! Shutdown signal
//!
//! One cancellation token shared by the HTTP server and every background
//! loop of the node.

use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;

/// Cancel the returned token on SIGTERM or SIGINT
pub fn install_shutdown_handler() -> anyhow::Result<CancellationToken> {
    let token = CancellationToken::new();
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down"),
            _ = sigint.recv() => tracing::info!("Received SIGINT, shutting down"),
            _ = trigger.cancelled() => return,
        }
        trigger.cancel();
    });

    Ok(token)
}

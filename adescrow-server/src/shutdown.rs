//! Signal handling for graceful shutdown.

use tokio::signal::unix::{SignalKind, signal};

/// Wait for one occurrence of `kind`. Never completes if the handler
/// cannot be installed.
async fn wait_for(kind: SignalKind, name: &str) {
    match signal(kind) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install {} handler", name);
            std::future::pending::<()>().await;
        }
    }
}

/// Creates a future that completes when a shutdown signal is received.
///
/// Listens for SIGTERM and SIGINT (Ctrl+C).
pub async fn shutdown_signal() {
    tokio::select! {
        _ = wait_for(SignalKind::terminate(), "SIGTERM") => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
        _ = wait_for(SignalKind::interrupt(), "SIGINT") => {
            tracing::info!("Received SIGINT, initiating graceful shutdown");
        }
    }
}

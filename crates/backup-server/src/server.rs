//! Serving the HTTP routes until shutdown.
//!

use core::net::SocketAddr;
use std::io;

use axum::Router;
use thiserror::Error;
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};

/// Serve a router on an address until Ctrl+C or a terminate signal.
pub async fn serve(router: Router, address: SocketAddr) -> Result<(), ServeError> {
    let listener = TcpListener::bind(address)
        .await
        .map_err(ServeError::Bind)?;

    info!("Listening on: {address}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServeError::Serve)?;

    info!("Server shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(error) => {
                warn!("Could not listen for Ctrl+C: {error}");
                core::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(error) => {
                warn!("Could not listen for terminate signal: {error}");
                core::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = core::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("Failed to bind TCP listener:\n{0}")]
    Bind(#[source] io::Error),

    #[error("Failed to serve:\n{0}")]
    Serve(#[source] io::Error),
}

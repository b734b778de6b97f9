//! Server loop and shutdown orchestration
//!
//! Two ways out of the serve loop:
//!
//! - **Graceful**: SIGINT/SIGTERM stops accepting, drains in-flight requests
//!   and then waits for a pending transition finalizer, so a transition
//!   window is never cut short by an orderly restart.
//! - **Fatal**: a message on the gate's fatal channel means the firewall
//!   state is unknown. The serve future is dropped on the spot, nothing is
//!   drained, and the caller exits with a failure code so the process
//!   supervisor restarts into the safe maintenance default.

use crate::core::gate::FirewallGate;
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info};

/// How the serve loop ended
#[derive(Debug)]
pub enum ServeOutcome {
    /// Orderly shutdown via signal
    Shutdown,
    /// Unrecoverable firewall state; carries the reason
    Fatal(String),
}

/// Binds `listen_addr` and serves the firewall router until a shutdown
/// signal or a fatal condition.
///
/// # Errors
///
/// Returns `Err` if the listener cannot be bound or the server fails.
pub async fn serve(
    listen_addr: &str,
    gate: Arc<FirewallGate>,
    mut fatal_rx: mpsc::UnboundedReceiver<String>,
) -> std::io::Result<ServeOutcome> {
    let router = super::firewall_router(Arc::clone(&gate));
    let listener = TcpListener::bind(listen_addr).await?;
    info!(addr = %listener.local_addr()?, "firewall gate listening");

    let server = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .into_future();

    tokio::select! {
        result = server => {
            result?;
            info!("HTTP server stopped, waiting for pending transition finalizer");
            gate.await_pending_finalizer().await;
            Ok(ServeOutcome::Shutdown)
        }
        reason = fatal_rx.recv() => {
            let reason = reason.unwrap_or_else(|| "fatal channel closed".to_string());
            error!("halting without drain: {reason}");
            Ok(ServeOutcome::Fatal(reason))
        }
    }
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("failed to install SIGINT handler: {err}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => error!("failed to install SIGTERM handler: {err}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}

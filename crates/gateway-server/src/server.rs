//! HTTP server lifecycle.
//!
//! Owns the background tasks (health probe loop, cache sweeper) alongside
//! the listener, so a graceful shutdown stops them together.

use crate::{routes::create_router, state::AppState};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Bind address invalid or in use
    #[error("failed to bind listener: {0}")]
    Bind(String),
    /// Fatal error while serving
    #[error("server error: {0}")]
    Serve(String),
}

/// Gateway HTTP server
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a server over shared state
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Serve until interrupted, then shut down background tasks.
    ///
    /// # Errors
    /// Returns `ServerError` when binding or serving fails.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(shutdown_signal()).await
    }

    /// Serve until the provided future resolves
    ///
    /// # Errors
    /// Returns `ServerError` when binding or serving fails.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let config = self.state.config();
        let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|e| ServerError::Bind(format!("invalid listen address: {e}")))?;

        // Register upstreams and start the background loops before
        // accepting traffic.
        for (service, url) in config.health_targets() {
            self.state.health.register_service(service, url).await;
        }
        self.state.health.start();
        self.state.cache.start_sweeper();

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(e.to_string()))?;
        info!(address = %addr, routes = self.state.routes().len(), "Gateway listening");

        let health = self.state.health.clone();
        let cache = self.state.cache.clone();
        let router = create_router(self.state);

        let result = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Serve(e.to_string()));

        health.stop();
        cache.stop_sweeper();
        info!("Server shutdown complete");
        result
    }
}

/// Resolves on Ctrl+C or SIGTERM
///
/// # Panics
/// Panics if signal handlers cannot be installed.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

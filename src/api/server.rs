//! API server using Axum
//!
//! Serves the ingest/query endpoints, the WebSocket feed and static files.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use crate::config::ServerConfig;
use crate::error::Result;
use crate::relay::Relay;

use super::middleware::cors_layer;
use super::routes;

/// Shared state for API handlers
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(relay: Arc<Relay>) -> Self {
        Self {
            relay,
            started_at: Instant::now(),
        }
    }
}

/// API server
pub struct ApiServer {
    config: ServerConfig,
    state: AppState,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(config: ServerConfig, relay: Arc<Relay>) -> Self {
        Self {
            config,
            state: AppState::new(relay),
        }
    }

    /// Build the router
    pub fn build_router(&self) -> Router {
        let cors = cors_layer(&self.config.cors_origins);

        routes::create_router(self.state.clone(), &self.config.static_dir)
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the configured address and run until shutdown
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until shutdown
    pub async fn serve(
        &self,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let addr = listener.local_addr()?;
        let router = self.build_router();

        info!("Server running on http://{}", addr);
        info!("POST endpoint: http://{}/api/data", addr);
        info!("WebSocket feed: ws://{}/ws", addr);
        info!(static_dir = %self.config.static_dir.display(), "Serving static files");

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await?;

        info!("Server shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn test_config(host: &str) -> ServerConfig {
        ServerConfig {
            port: 0,
            host: host.to_string(),
            cors_origins: vec![],
            static_dir: PathBuf::from("does-not-exist"),
        }
    }

    #[tokio::test]
    async fn test_run_binds_hostname() {
        let server = ApiServer::new(test_config("localhost"), Arc::new(Relay::default()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        shutdown_tx.send(true).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), server.run(shutdown_rx))
            .await
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_run_unresolvable_host_is_io_error() {
        let server = ApiServer::new(test_config("no such host"), Arc::new(Relay::default()));
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let result = tokio::time::timeout(Duration::from_secs(5), server.run(shutdown_rx))
            .await
            .unwrap();
        assert!(matches!(result, Err(crate::error::RelayError::Io(_))));
    }
}

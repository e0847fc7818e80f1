//! API route definitions

use std::path::Path;

use axum::routing::get;
use axum::Router;
use tower_http::services::ServeDir;

use super::handlers;
use super::server::AppState;
use super::websocket;

/// Create the API router with all routes
///
/// Paths that match no route are served from `static_dir`.
pub fn create_router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/api/data",
            get(handlers::data::list_data).post(handlers::data::ingest_data),
        )
        .route("/ws", get(websocket::feed::feed_ws))
        .fallback_service(ServeDir::new(static_dir))
        .with_state(state)
}

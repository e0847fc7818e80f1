//! API server implementation
//!
//! Provides the ingest/query REST endpoints and the WebSocket push channel.

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod websocket;

pub use server::{ApiServer, AppState};

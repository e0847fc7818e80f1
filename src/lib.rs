//! Relay - Real-time Data Relay
//!
//! Accepts data over HTTP, keeps a bounded newest-first history in memory and
//! pushes every new entry to connected WebSocket clients.
//!
//! ## Features
//!
//! - `POST /api/data` ingest for JSON, form and plain bodies
//! - `GET /api/data` history snapshot (last 50 entries by default)
//! - `GET /ws` live feed: `initialData` snapshot on connect, `newData` per entry
//! - Static file serving and configurable CORS

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod relay;

pub use config::Config;
pub use error::{RelayError, Result};
pub use relay::Relay;

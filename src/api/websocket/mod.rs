//! WebSocket handlers

pub mod feed;

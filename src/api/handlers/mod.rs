//! API request handlers

pub mod data;
pub mod health;

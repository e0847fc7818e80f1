use thiserror::Error;

/// Unified error type for the relay
///
/// Ingest, query and broadcast never fail; errors only come from startup
/// (configuration, binding) and server I/O.
#[derive(Error, Debug)]
pub enum RelayError {
    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

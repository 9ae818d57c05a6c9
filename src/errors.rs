//! Client Error Types

use thiserror::Error;

/// Result type for client operations
pub type Result<T> = std::result::Result<T, TuioError>;

/// Errors surfaced by the TUIO client
#[derive(Error, Debug)]
pub enum TuioError {
    /// `connect()` was called on an already connected client
    #[error("client is already connected")]
    AlreadyConnected,

    /// An operation required a live connection
    #[error("client is not connected")]
    NotConnected,

    /// Binding the UDP listening socket failed
    #[error("failed to bind UDP socket on {addr}: {source}")]
    Bind {
        /// The address the bind was attempted on
        addr: String,
        /// The underlying socket error
        source: std::io::Error,
    },

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

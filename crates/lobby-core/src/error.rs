use thiserror::Error;

use crate::wire::DecodeError;

/// Result type alias for lobby operations
pub type Result<T> = std::result::Result<T, LobbyError>;

/// Errors that can occur in the lobby master and client roles
#[derive(Error, Debug)]
pub enum LobbyError {
    /// A wire message could not be decoded
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The transport refused an operation
    #[error("transport error: {0}")]
    Transport(String),

    /// Operation requires a live master connection
    #[error("not connected to a master server")]
    NotConnected,

    /// Configuration is invalid or unreadable
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

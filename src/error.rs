//! Error types for the K3 driver

use std::net::SocketAddr;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// K3 driver error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Listener could not bind its UDP port
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address the bind was attempted on
        addr: SocketAddr,
        /// Underlying socket error
        source: std::io::Error,
    },

    /// Send/receive failure on a session socket (timeouts excluded)
    #[error("Transport failure on {session} session: {source}")]
    Transport {
        /// Session name ("control", "data")
        session: &'static str,
        /// Underlying socket error
        source: std::io::Error,
    },

    /// Configuration file or value error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Robot gateway refused or failed a call
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// A session loop terminated; fatal for the process
    #[error("{0} session exited unexpectedly")]
    SessionExited(&'static str),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Config(e.to_string())
    }
}

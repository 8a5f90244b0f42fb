//! Error types for the FTP server

use thiserror::Error;

/// Result type alias for FTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// FTP error types
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed command line or unexpected framing on the control socket
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A path failed PathJail validation or a type/existence precondition
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Credential check failed
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Data-channel setup or transfer failure
    #[error("data connection error: {0}")]
    Connection(String),

    /// 60s inactivity timeout on a control or data socket
    #[error("operation timed out")]
    Timeout,

    /// Generic error
    #[error("{0}")]
    Other(String),
}

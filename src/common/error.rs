//! Error types for the application.

use thiserror::Error;

/// Configuration-related errors. All of these are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },

    #[error("Too many channels: {count} configured, at most {max} allowed")]
    TooManyChannels { count: usize, max: usize },

    #[error("Invalid pattern for channel '{channel}': {message}")]
    InvalidPattern { channel: String, message: String },
}

/// Connection-related errors for both the chat and console sockets.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Failed to connect to {addr}: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Connection closed by remote")]
    ConnectionClosed,

    #[error("Authentication failed: {reason}")]
    AuthFailed { reason: String },

    #[error("Authentication timed out after {secs}s")]
    AuthTimeout { secs: u64 },

    #[error("Line exceeds maximum length ({max} bytes)")]
    LineTooLong { max: usize },

    #[error("Cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConnectionError {
    /// Whether the enclosing loop must stop instead of reconnecting.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AuthFailed { .. } | Self::Cancelled)
    }
}

/// Donation store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store IO error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt store record at line {line}: {source}")]
    Corrupt {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result type alias for connection operations.
pub type ConnectionResult<T> = std::result::Result<T, ConnectionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(ConnectionError::AuthFailed { reason: "x".into() }.is_fatal());
        assert!(ConnectionError::Cancelled.is_fatal());
        // A silent server is retried like any other dropped login.
        assert!(!ConnectionError::AuthTimeout { secs: 30 }.is_fatal());
        assert!(!ConnectionError::ConnectionClosed.is_fatal());
        assert!(!ConnectionError::LineTooLong { max: 10 }.is_fatal());
    }
}

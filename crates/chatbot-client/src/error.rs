//! Error types for the chat client.
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use std::io;
use thiserror::Error;

/// Chat client errors.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Could not reach the server.
    ///
    /// Usually the server is not running or the host/port is wrong.
    #[error("Failed to connect to {addr}: {error}")]
    Connect { addr: String, error: String },

    /// The connection attempt did not complete in time.
    #[error("Timed out connecting to {addr}")]
    ConnectTimeout { addr: String },

    /// The server already signalled disconnect.
    #[error("Connection is closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Convenience alias for client results.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_error_mentions_address() {
        let err = ClientError::Connect {
            addr: "localhost:5555".to_string(),
            error: "connection refused".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("localhost:5555"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn test_io_error_conversion() {
        let err: ClientError = io::Error::new(io::ErrorKind::BrokenPipe, "pipe").into();
        assert!(matches!(err, ClientError::Io(_)));
    }
}

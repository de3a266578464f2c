//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Port outside the administrative range
    #[error("Invalid port {port} (expected {min}-{max})")]
    InvalidPort { port: u32, min: u16, max: u16 },

    /// Invalid field value
    #[error("Invalid {field}: {value} (expected {expected})")]
    InvalidFieldValue {
        field: String,
        value: String,
        expected: String,
    },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_port_display() {
        let err = DomainError::InvalidPort {
            port: 80,
            min: 1024,
            max: 65535,
        };
        let display = err.to_string();
        assert!(display.contains("80"));
        assert!(display.contains("1024-65535"));
    }
}

//! Server-wide run state and status reporting.

use std::fmt;

use crate::error::{DomainError, DomainResult};

/// Lowest port the server may be started on.
pub const MIN_PORT: u16 = 1024;

/// Highest port the server may be started on.
pub const MAX_PORT: u16 = 65535;

/// Validates that a port lies in the administrative range `1024..=65535`.
///
/// Takes a `u32` so that out-of-range operator input can be reported
/// instead of silently truncated.
pub fn validate_port(port: u32) -> DomainResult<u16> {
    match u16::try_from(port) {
        Ok(p) if p >= MIN_PORT => Ok(p),
        _ => Err(DomainError::InvalidPort {
            port,
            min: MIN_PORT,
            max: MAX_PORT,
        }),
    }
}

/// Run state of the server.
///
/// Transitions: Stopped -> Starting -> Running -> Stopping -> Stopped,
/// with Starting -> Stopped on a failed start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerStatus {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl ServerStatus {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Stopped => "Stopped",
            Self::Starting => "Starting",
            Self::Running => "Running",
            Self::Stopping => "Stopping",
        }
    }

    /// Encodes the status for atomic storage.
    #[must_use]
    pub const fn to_raw(self) -> u8 {
        match self {
            Self::Stopped => 0,
            Self::Starting => 1,
            Self::Running => 2,
            Self::Stopping => 3,
        }
    }

    /// Decodes a status stored with [`ServerStatus::to_raw`].
    #[must_use]
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Starting,
            2 => Self::Running,
            3 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Answer to the `@status` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    pub status: ServerStatus,
    pub port: u16,
    pub clients: usize,
    pub max_clients: usize,
}

impl StatusReport {
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status == ServerStatus::Running
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Server Status: {}", self.status)?;
        writeln!(f, "Port: {}", self.port)?;
        writeln!(f, "Connected clients: {}", self.clients)?;
        write!(f, "Max clients: {}", self.max_clients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_port_bounds() {
        assert_eq!(validate_port(1024), Ok(1024));
        assert_eq!(validate_port(65535), Ok(65535));
        assert!(validate_port(1023).is_err());
        assert!(validate_port(0).is_err());
        assert!(validate_port(65536).is_err());
    }

    #[test]
    fn test_validate_port_reports_original_value() {
        match validate_port(70000) {
            Err(DomainError::InvalidPort { port, .. }) => assert_eq!(port, 70000),
            other => panic!("Expected InvalidPort, got {other:?}"),
        }
    }

    #[test]
    fn test_server_status_raw_roundtrip() {
        for status in [
            ServerStatus::Stopped,
            ServerStatus::Starting,
            ServerStatus::Running,
            ServerStatus::Stopping,
        ] {
            assert_eq!(ServerStatus::from_raw(status.to_raw()), status);
        }
    }

    #[test]
    fn test_status_report_display() {
        let report = StatusReport {
            status: ServerStatus::Running,
            port: 5555,
            clients: 3,
            max_clients: 100,
        };
        assert!(report.is_running());
        let text = report.to_string();
        assert_eq!(text.lines().count(), 4);
        assert!(text.contains("Server Status: Running"));
        assert!(text.contains("Port: 5555"));
        assert!(text.contains("Connected clients: 3"));
        assert!(text.contains("Max clients: 100"));
    }
}

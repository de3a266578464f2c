//! Process-wide server run state.

use std::sync::atomic::{AtomicU16, AtomicU8, Ordering};

use chatbot_core::{ServerStatus, StatusReport};

/// Status, port and capacity of the server.
///
/// Readable from anywhere; only the lifecycle manager changes it.
#[derive(Debug)]
pub struct ServerState {
    status: AtomicU8,
    port: AtomicU16,
    max_clients: usize,
}

impl ServerState {
    pub fn new(port: u16, max_clients: usize) -> Self {
        Self {
            status: AtomicU8::new(ServerStatus::Stopped.to_raw()),
            port: AtomicU16::new(port),
            max_clients,
        }
    }

    pub fn status(&self) -> ServerStatus {
        ServerStatus::from_raw(self.status.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.status() == ServerStatus::Running
    }

    /// Port of the current (or most recent) listener.
    pub fn port(&self) -> u16 {
        self.port.load(Ordering::Acquire)
    }

    pub fn max_clients(&self) -> usize {
        self.max_clients
    }

    pub(crate) fn set_status(&self, status: ServerStatus) {
        self.status.store(status.to_raw(), Ordering::Release);
    }

    pub(crate) fn set_port(&self, port: u16) {
        self.port.store(port, Ordering::Release);
    }

    /// Builds a status report for the given client count.
    pub fn report(&self, clients: usize) -> StatusReport {
        StatusReport {
            status: self.status(),
            port: self.port(),
            clients,
            max_clients: self.max_clients,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_stopped() {
        let state = ServerState::new(5555, 100);
        assert_eq!(state.status(), ServerStatus::Stopped);
        assert!(!state.is_running());
    }

    #[test]
    fn test_report_reflects_state() {
        let state = ServerState::new(5555, 10);
        state.set_status(ServerStatus::Running);
        state.set_port(6000);
        let report = state.report(3);
        assert!(report.is_running());
        assert_eq!(report.port, 6000);
        assert_eq!(report.clients, 3);
        assert_eq!(report.max_clients, 10);
    }
}

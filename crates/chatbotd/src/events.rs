//! Server events and the bus that distributes them.
//!
//! Every component reports what happens through an [`EventBus`]. The bus
//! appends each event to the [`Journal`] (the server log that `@save` and
//! `@clear` operate on) and fans it out to any number of observers over a
//! `tokio::sync::broadcast` channel.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::broadcast;

use chatbot_core::SessionId;

use crate::journal::Journal;
use crate::session::CloseReason;

/// Broadcast buffer size; slow observers lag instead of blocking publishers.
const EVENT_BUFFER: usize = 256;

/// Something observable that happened in the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    ServerStarted { port: u16 },
    StartFailed { port: u32, error: String },
    ServerStopped,
    ClientConnected { id: SessionId, addr: String },
    ClientRejected { addr: String },
    ClientDisconnected { id: SessionId, reason: CloseReason },
    ClientMessage { id: SessionId, line: String },
    SessionError { id: SessionId, error: String },
    AcceptError { error: String },
    Broadcast { message: String, sent: usize },
    Kicked { id: SessionId, info: String },
    LogSaved { path: PathBuf },
    LogCleared,
    StragglersAbandoned { count: usize },
}

impl fmt::Display for ServerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServerStarted { port } => write!(f, "Server started on port: {port}"),
            Self::StartFailed { port, error } => {
                write!(f, "Server failed to start on port {port}: {error}")
            }
            Self::ServerStopped => write!(f, "Server stopped"),
            Self::ClientConnected { id, addr } => {
                write!(f, "Client {id} connected from: {addr}")
            }
            Self::ClientRejected { addr } => write!(
                f,
                "Server reached maximum clients limit. Rejecting connection from: {addr}"
            ),
            Self::ClientDisconnected { id, reason } => {
                write!(f, "Client {id} disconnected ({reason})")
            }
            Self::ClientMessage { id, line } => write!(f, "Client {id} says: {line}"),
            Self::SessionError { id, error } => {
                write!(f, "Client {id} connection error: {error}")
            }
            Self::AcceptError { error } => write!(f, "Connection error: {error}"),
            Self::Broadcast { message, sent } => {
                write!(f, "Broadcast sent to {sent} clients: {message}")
            }
            Self::Kicked { info, .. } => write!(f, "Kicked client: {info}"),
            Self::LogSaved { path } => write!(f, "Log saved to: {}", path.display()),
            Self::LogCleared => write!(f, "Log cleared"),
            Self::StragglersAbandoned { count } => write!(
                f,
                "{count} session worker(s) did not finish within the grace period"
            ),
        }
    }
}

/// Cheap-to-clone event publisher.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ServerEvent>,
    journal: Arc<Journal>,
}

impl EventBus {
    /// Creates a bus with a fresh journal.
    pub fn new() -> Self {
        Self::with_journal(Arc::new(Journal::new()))
    }

    /// Creates a bus that records into an existing journal.
    pub fn with_journal(journal: Arc<Journal>) -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER);
        Self { sender, journal }
    }

    /// Records the event in the journal and notifies observers.
    ///
    /// Having no observers is not an error.
    pub fn publish(&self, event: ServerEvent) {
        self.journal.record(&event.to_string());
        let _ = self.sender.send(event);
    }

    /// Subscribes an observer to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// The server log this bus writes to.
    pub fn journal(&self) -> &Arc<Journal> {
        &self.journal
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers_records() {
        let bus = EventBus::new();
        bus.publish(ServerEvent::ServerStarted { port: 5555 });
        assert!(bus.journal().contents().contains("Server started on port: 5555"));
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(ServerEvent::ClientConnected {
            id: SessionId::new(1),
            addr: "127.0.0.1:9000".to_string(),
        });
        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            ServerEvent::ClientConnected {
                id: SessionId::new(1),
                addr: "127.0.0.1:9000".to_string(),
            }
        );
    }

    #[test]
    fn test_display_messages() {
        let event = ServerEvent::Broadcast {
            message: "hi".to_string(),
            sent: 3,
        };
        assert_eq!(event.to_string(), "Broadcast sent to 3 clients: hi");

        let event = ServerEvent::ClientDisconnected {
            id: SessionId::new(4),
            reason: CloseReason::Timeout,
        };
        assert!(event.to_string().contains("Client 4 disconnected"));
    }

    #[test]
    fn test_clones_share_journal() {
        let bus = EventBus::new();
        let other = bus.clone();
        other.publish(ServerEvent::LogCleared);
        assert!(bus.journal().contents().contains("Log cleared"));
    }
}

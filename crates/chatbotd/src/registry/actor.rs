//! Registry actor - owns the session map and processes commands.
//!
//! The RegistryActor is the single owner of the live session set.
//! It receives commands via an mpsc channel and reports membership changes
//! on the event bus.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Response send failures are ignored (the caller went away)

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use chatbot_core::SessionId;

use super::commands::{RegistryCommand, RegistryError};
use crate::events::{EventBus, ServerEvent};
use crate::session::{CloseReason, SessionHandle};

/// The registry actor - owns all session entries.
///
/// Commands are processed sequentially in a single task, so a capacity
/// check and the insert that follows it are atomic with respect to every
/// other caller.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Live sessions, ordered by ID
    sessions: BTreeMap<SessionId, SessionHandle>,

    /// Capacity bound
    max_sessions: usize,

    /// Mirror of `sessions.len()` readable without a round trip
    count: Arc<AtomicUsize>,

    events: EventBus,
}

impl RegistryActor {
    /// Creates a new registry actor.
    ///
    /// # Arguments
    ///
    /// * `receiver` - Channel for receiving commands
    /// * `max_sessions` - Capacity bound
    /// * `count` - Shared counter kept equal to the number of entries
    /// * `events` - Bus for connect/disconnect events
    pub fn new(
        receiver: mpsc::Receiver<RegistryCommand>,
        max_sessions: usize,
        count: Arc<AtomicUsize>,
        events: EventBus,
    ) -> Self {
        Self {
            receiver,
            sessions: BTreeMap::new(),
            max_sessions,
            count,
            events,
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all handles dropped).
    pub async fn run(mut self) {
        debug!(max_sessions = self.max_sessions, "Registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        debug!(sessions = self.sessions.len(), "Registry actor stopped");
    }

    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Add {
                session,
                respond_to,
            } => {
                let result = self.handle_add(session);
                let _ = respond_to.send(result);
            }
            RegistryCommand::Remove {
                session_id,
                reason,
                respond_to,
            } => {
                let removed = self.handle_remove(session_id, reason);
                let _ = respond_to.send(removed);
            }
            RegistryCommand::Get {
                session_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.sessions.get(&session_id).cloned());
            }
            RegistryCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.sessions.values().cloned().collect());
            }
            RegistryCommand::Clear { respond_to } => {
                let removed = self.handle_clear();
                let _ = respond_to.send(removed);
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    fn handle_add(&mut self, session: SessionHandle) -> Result<(), RegistryError> {
        let id = session.id();

        if self.sessions.len() >= self.max_sessions {
            warn!(
                session_id = %id,
                current = self.sessions.len(),
                max = self.max_sessions,
                "Registry is full, rejecting session"
            );
            return Err(RegistryError::RegistryFull {
                max: self.max_sessions,
            });
        }

        if self.sessions.contains_key(&id) {
            debug!(session_id = %id, "Session already registered");
            return Err(RegistryError::SessionAlreadyExists(id));
        }

        let addr = session.addr().to_string();
        self.sessions.insert(id, session);
        self.sync_count();

        info!(
            session_id = %id,
            addr = %addr,
            total_sessions = self.sessions.len(),
            "Session registered"
        );
        self.events
            .publish(ServerEvent::ClientConnected { id, addr });

        Ok(())
    }

    fn handle_remove(&mut self, id: SessionId, reason: CloseReason) -> bool {
        if self.sessions.remove(&id).is_none() {
            debug!(session_id = %id, "Session already removed");
            return false;
        }
        self.sync_count();

        info!(
            session_id = %id,
            reason = %reason,
            total_sessions = self.sessions.len(),
            "Session removed"
        );
        self.events
            .publish(ServerEvent::ClientDisconnected { id, reason });
        true
    }

    fn handle_clear(&mut self) -> Vec<SessionHandle> {
        let removed: Vec<SessionHandle> =
            std::mem::take(&mut self.sessions).into_values().collect();
        self.sync_count();

        for session in &removed {
            self.events.publish(ServerEvent::ClientDisconnected {
                id: session.id(),
                reason: CloseReason::Forced,
            });
        }
        if !removed.is_empty() {
            info!(removed = removed.len(), "Registry cleared");
        }
        removed
    }

    fn sync_count(&self) {
        self.count.store(self.sessions.len(), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_session(id: u64) -> SessionHandle {
        let (ours, _theirs) = tokio::io::duplex(64);
        SessionHandle::new(
            SessionId::new(id),
            format!("10.0.0.{id}:4000"),
            Box::new(ours),
            Duration::from_millis(50),
        )
    }

    fn test_actor(max: usize) -> (RegistryActor, Arc<AtomicUsize>, EventBus) {
        let (_tx, rx) = mpsc::channel(8);
        let count = Arc::new(AtomicUsize::new(0));
        let events = EventBus::new();
        let actor = RegistryActor::new(rx, max, Arc::clone(&count), events.clone());
        (actor, count, events)
    }

    #[tokio::test]
    async fn test_add_respects_capacity() {
        let (mut actor, count, _events) = test_actor(2);
        assert!(actor.handle_add(test_session(1)).is_ok());
        assert!(actor.handle_add(test_session(2)).is_ok());
        assert_eq!(
            actor.handle_add(test_session(3)),
            Err(RegistryError::RegistryFull { max: 2 })
        );
        assert_eq!(count.load(Ordering::Acquire), 2);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let (mut actor, _count, _events) = test_actor(5);
        actor.handle_add(test_session(1)).unwrap();
        assert_eq!(
            actor.handle_add(test_session(1)),
            Err(RegistryError::SessionAlreadyExists(SessionId::new(1)))
        );
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (mut actor, count, events) = test_actor(5);
        actor.handle_add(test_session(1)).unwrap();
        assert!(actor.handle_remove(SessionId::new(1), CloseReason::Forced));
        assert!(!actor.handle_remove(SessionId::new(1), CloseReason::ClientClosed));
        assert_eq!(count.load(Ordering::Acquire), 0);

        let log = events.journal().contents();
        assert_eq!(log.matches("Client 1 disconnected").count(), 1);
    }

    #[tokio::test]
    async fn test_clear_returns_everything() {
        let (mut actor, count, _events) = test_actor(5);
        for id in 1..=3 {
            actor.handle_add(test_session(id)).unwrap();
        }
        let removed = actor.handle_clear();
        let ids: Vec<u64> = removed.iter().map(|s| s.id().get()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(actor.sessions.is_empty());
        assert_eq!(count.load(Ordering::Acquire), 0);
    }
}

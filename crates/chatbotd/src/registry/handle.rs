//! Client interface for interacting with the RegistryActor.
//!
//! The `RegistryHandle` provides a cheap-to-clone interface for sending
//! commands to the registry actor.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel errors are mapped to `RegistryError::ChannelClosed` or an empty result

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use chatbot_core::SessionId;

use super::commands::{RegistryCommand, RegistryError};
use crate::session::{CloseReason, SessionHandle};

// ============================================================================
// Registry Handle
// ============================================================================

/// Handle for interacting with the registry actor.
///
/// # Usage
///
/// ```ignore
/// let registry = spawn_registry(100, events);
///
/// registry.add(session).await?;
/// for session in registry.snapshot().await {
///     let _ = session.send_line("hello").await;
/// }
/// ```
#[derive(Clone)]
pub struct RegistryHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RegistryCommand>,

    /// Entry count maintained by the actor
    count: Arc<AtomicUsize>,

    /// Capacity bound enforced by the actor
    max_sessions: usize,
}

impl RegistryHandle {
    /// Create a new registry handle.
    ///
    /// # Arguments
    ///
    /// * `sender` - The command channel sender for communicating with the actor
    /// * `count` - Counter the actor keeps equal to its entry count
    /// * `max_sessions` - Capacity bound the actor enforces
    pub fn new(
        sender: mpsc::Sender<RegistryCommand>,
        count: Arc<AtomicUsize>,
        max_sessions: usize,
    ) -> Self {
        Self {
            sender,
            count,
            max_sessions,
        }
    }

    /// Register a session.
    ///
    /// # Errors
    ///
    /// - `RegistryError::RegistryFull` if the registry is at maximum capacity
    /// - `RegistryError::SessionAlreadyExists` if the ID is already registered
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn add(&self, session: SessionHandle) -> Result<(), RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Add {
                session,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Remove a session.
    ///
    /// Returns `true` if this call removed it; `false` if it was already
    /// gone or the actor is unreachable.
    pub async fn remove(&self, session_id: SessionId, reason: CloseReason) -> bool {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Remove {
                session_id,
                reason,
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return false;
        }

        rx.await.unwrap_or(false)
    }

    /// Get a single session by ID.
    pub async fn get(&self, session_id: SessionId) -> Option<SessionHandle> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Get {
                session_id,
                respond_to: tx,
            })
            .await
            .ok()?;

        rx.await.ok()?
    }

    /// Point-in-time copy of all sessions, ordered by ID.
    ///
    /// The returned vector is detached from the registry: sessions added or
    /// removed afterwards do not affect it.
    pub async fn snapshot(&self) -> Vec<SessionHandle> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Snapshot { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// First session in the snapshot matching `predicate`.
    pub async fn find_by<P>(&self, predicate: P) -> Option<SessionHandle>
    where
        P: Fn(&SessionHandle) -> bool,
    {
        self.snapshot().await.into_iter().find(|s| predicate(s))
    }

    /// Remove every session, returning the removed entries.
    pub async fn clear(&self) -> Vec<SessionHandle> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Clear { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Current number of sessions.
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity bound.
    pub fn capacity(&self) -> usize {
        self.max_sessions
    }

    /// Cheap pre-check before accepting work; `add` re-validates.
    pub fn has_capacity(&self) -> bool {
        self.len() < self.max_sessions
    }

    /// Check if the handle is still connected to the actor.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

//! Registry actor commands and errors.
//!
//! This module defines the message types for communicating with the `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors that can occur during registry operations
//!
//! All types are designed for async message passing and follow the panic-free policy.

use chatbot_core::SessionId;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::session::{CloseReason, SessionHandle};

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Each command carries a oneshot channel for the response, so callers get
/// request-response semantics without sharing the map itself.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Insert a session.
    ///
    /// # Errors
    /// - `RegistryError::RegistryFull` if at maximum capacity
    /// - `RegistryError::SessionAlreadyExists` if the ID is taken
    Add {
        session: SessionHandle,
        respond_to: oneshot::Sender<Result<(), RegistryError>>,
    },

    /// Remove a session. Responds `false` if it was not present.
    Remove {
        session_id: SessionId,
        reason: CloseReason,
        respond_to: oneshot::Sender<bool>,
    },

    /// Look up one session.
    Get {
        session_id: SessionId,
        respond_to: oneshot::Sender<Option<SessionHandle>>,
    },

    /// Copy of every registered session, ordered by ID.
    Snapshot {
        respond_to: oneshot::Sender<Vec<SessionHandle>>,
    },

    /// Remove every session, returning what was removed.
    Clear {
        respond_to: oneshot::Sender<Vec<SessionHandle>>,
    },
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The registry has reached its maximum session capacity.
    #[error("registry is full (max: {max} sessions)")]
    RegistryFull {
        /// Maximum number of sessions allowed
        max: usize,
    },

    /// A session with this ID already exists.
    #[error("session already exists: {0}")]
    SessionAlreadyExists(SessionId),

    /// The actor is gone.
    #[error("response channel closed")]
    ChannelClosed,
}

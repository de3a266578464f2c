//! Session registry using the Actor pattern.
//!
//! The registry is the authoritative set of live sessions. It receives
//! commands via a tokio mpsc channel, so every add/remove/snapshot is
//! atomic with respect to concurrent callers without a lock shared by
//! the session workers themselves.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │ Acceptor/       │────▶│  RegistryActor  │────▶│    EventBus     │
//! │ Controller/     │     │                 │     │  (observers)    │
//! │ Lifecycle       │     └─────────────────┘     └─────────────────┘
//! └─────────────────┘             │
//!         │   RegistryCommand     │
//!         │   (mpsc channel)      ▼
//!         ▼               BTreeMap<SessionId,
//!   add/remove/snapshot     SessionHandle>
//! ```
//!
//! Sessions never hold a registry handle. The task that runs a session
//! removes it once the worker returns.

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use tokio::sync::mpsc;

mod actor;
mod commands;
mod handle;

pub use actor::RegistryActor;
pub use commands::{RegistryCommand, RegistryError};
pub use handle::RegistryHandle;

use crate::events::EventBus;

/// Command channel buffer size
const COMMAND_BUFFER: usize = 256;

/// Spawn the registry actor and return a handle for interaction.
///
/// The actor runs until every handle has been dropped.
///
/// # Example
///
/// ```no_run
/// use chatbotd::events::EventBus;
/// use chatbotd::registry::spawn_registry;
///
/// #[tokio::main]
/// async fn main() {
///     let registry = spawn_registry(100, EventBus::new());
///     let sessions = registry.snapshot().await;
///     assert!(sessions.is_empty());
/// }
/// ```
pub fn spawn_registry(max_sessions: usize, events: EventBus) -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let count = Arc::new(AtomicUsize::new(0));

    let actor = RegistryActor::new(cmd_rx, max_sessions, Arc::clone(&count), events);
    tokio::spawn(actor.run());

    RegistryHandle::new(cmd_tx, count, max_sessions)
}

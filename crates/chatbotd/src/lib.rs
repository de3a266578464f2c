//! chatbot daemon - connection management core of the chat server
//!
//! This crate provides the server-side infrastructure:
//! - `session` - Per-connection worker and the shared handle used to close it
//! - `registry` - Session registry actor enforcing the capacity bound
//! - `server` - TCP acceptor
//! - `controller` - Administrative `@` commands
//! - `lifecycle` - Start/stop state machine
//! - `events` / `journal` - Observer bus and the in-memory server log
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       chatbotd                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐    │
//! │  │    Acceptor     │────▶│      RegistryActor          │    │
//! │  │  (TcpListener)  │     │  (authoritative session set)│    │
//! │  └────────┬────────┘     └──────────────┬──────────────┘    │
//! │           │                             ▲                   │
//! │           │ spawn                       │ snapshot/remove   │
//! │           ▼                             │                   │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐    │
//! │  │ Session worker  │     │ Controller / Lifecycle      │    │
//! │  │  (per client)   │     │ (operator commands)         │    │
//! │  └────────┬────────┘     └─────────────────────────────┘    │
//! │           │ events                                          │
//! │           ▼                                                 │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │ EventBus ──▶ Journal (server log) + subscribers     │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Per-session failures end that session only

pub mod config;
pub mod controller;
pub mod events;
pub mod journal;
pub mod lifecycle;
pub mod persist;
pub mod registry;
pub mod server;
pub mod session;
pub mod state;

pub use config::{ConfigError, ServerConfig};
pub use controller::{CommandError, CommandOutcome, Controller};
pub use events::{EventBus, ServerEvent};
pub use journal::Journal;
pub use lifecycle::{LifecycleError, LifecycleManager};
pub use persist::{FilePersister, Persister};
pub use registry::{spawn_registry, RegistryError, RegistryHandle};
pub use server::{AcceptContext, Acceptor, AcceptorHandle, ServerError};
pub use session::{CloseReason, Session, SessionError, SessionHandle, SessionSettings};
pub use state::ServerState;

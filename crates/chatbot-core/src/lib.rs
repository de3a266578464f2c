//! chatbot core - shared domain types
//!
//! This crate provides the domain types shared between the server
//! (chatbotd), the wire protocol crate and the terminal client.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod responder;
pub mod server;
pub mod session;

// Re-exports for convenience
pub use error::{DomainError, DomainResult};
pub use responder::{KeywordResponder, Responder};
pub use server::{validate_port, ServerStatus, StatusReport, MAX_PORT, MIN_PORT};
pub use session::{SessionId, SessionInfo, SessionStatus};

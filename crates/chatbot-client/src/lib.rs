//! chatbot client - library side of the `chatbot` terminal client
//!
//! The client is a thin relay: stdin lines go to the server, server lines
//! go to stdout, and the conversation ends on `__DISCONNECTED__` or
//! end-of-stream.

pub mod client;
pub mod error;

pub use client::{run_chat, ChatClient, ClientConfig, DISCONNECTED_MESSAGE};
pub use error::{ClientError, Result};

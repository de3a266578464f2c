//! chatbot protocol - wire vocabulary and administrative grammar
//!
//! The client protocol is newline-delimited UTF-8 text with no framing
//! beyond the delimiter. This crate owns every fixed line the server
//! emits and the `@`-prefixed operator command grammar.

pub mod command;
pub mod line;

pub use command::{AdminCommand, CommandParseError, HELP_TEXT};
pub use line::{
    broadcast_line, is_farewell, welcome_lines, ServerLine, BROADCAST_PREFIX,
    DISCONNECT_SENTINEL, FAREWELL, KICK_NOTICE, SERVER_FULL,
};

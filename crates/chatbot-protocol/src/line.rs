//! Fixed protocol lines and line classification.

use std::fmt::Display;

/// Sent best-effort before any server-initiated close.
///
/// Clients must treat this line exactly like end-of-stream.
pub const DISCONNECT_SENTINEL: &str = "__DISCONNECTED__";

/// Client phrase that ends a session after one final reply (case-insensitive).
pub const FAREWELL: &str = "goodbye";

/// Written to a connection refused because the server is at capacity.
pub const SERVER_FULL: &str = "Server full. Please try again later.";

/// Prefix of administrator broadcast lines.
pub const BROADCAST_PREFIX: &str = "[SERVER BROADCAST] ";

/// Sent to a session right before an administrator disconnects it.
pub const KICK_NOTICE: &str = "[SERVER] You have been disconnected by administrator";

/// The two informational lines every accepted client receives first.
pub fn welcome_lines(client_id: impl Display) -> [String; 2] {
    [
        format!("Welcome to the ChatBot Server! You are client #{client_id}"),
        format!("Type 'help' to see available phrases or '{FAREWELL}' to leave."),
    ]
}

/// Returns true if the (already trimmed or untrimmed) line is the farewell phrase.
#[must_use]
pub fn is_farewell(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case(FAREWELL)
}

/// Formats an administrator broadcast.
pub fn broadcast_line(message: &str) -> String {
    format!("{BROADCAST_PREFIX}{message}")
}

/// A line received by a client, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerLine {
    /// Ordinary text to display
    Text(String),
    /// The server is closing the connection
    Disconnect,
}

impl ServerLine {
    /// Classifies one raw line (line terminator optional).
    pub fn classify(raw: &str) -> Self {
        let line = raw.trim_end_matches(['\r', '\n']);
        if line == DISCONNECT_SENTINEL {
            Self::Disconnect
        } else {
            Self::Text(line.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welcome_lines_mention_id_and_farewell() {
        let [greeting, hint] = welcome_lines(12);
        assert!(greeting.contains("#12"));
        assert!(hint.contains(FAREWELL));
    }

    #[test]
    fn test_is_farewell_case_insensitive() {
        assert!(is_farewell("goodbye"));
        assert!(is_farewell("GoodBye"));
        assert!(is_farewell("  GOODBYE \r"));
        assert!(!is_farewell("good bye"));
        assert!(!is_farewell("goodbye now"));
    }

    #[test]
    fn test_broadcast_line() {
        assert_eq!(broadcast_line("hello"), "[SERVER BROADCAST] hello");
    }

    #[test]
    fn test_classify() {
        assert_eq!(ServerLine::classify("__DISCONNECTED__\n"), ServerLine::Disconnect);
        assert_eq!(ServerLine::classify("__DISCONNECTED__\r\n"), ServerLine::Disconnect);
        assert_eq!(
            ServerLine::classify("pong!\n"),
            ServerLine::Text("pong!".to_string())
        );
        // Sentinel must be the whole line
        assert_eq!(
            ServerLine::classify("x __DISCONNECTED__"),
            ServerLine::Text("x __DISCONNECTED__".to_string())
        );
    }
}

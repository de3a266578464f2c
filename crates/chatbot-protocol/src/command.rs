//! Administrative command grammar.
//!
//! Commands are `@`-prefixed words, case-insensitive, with the argument
//! being everything after the first run of whitespace:
//!
//! ```text
//! @list
//! @broadcast <message>
//! @kick <id|substring>
//! @shutdown
//! @save <filename>
//! @clear
//! @status
//! @help
//! ```

use std::str::FromStr;

use thiserror::Error;

/// Help text listing every administrative command.
pub const HELP_TEXT: &str = "Available commands:
@list - Show connected clients
@broadcast <msg> - Send message to all clients
@kick <client_id|ip> - Disconnect a client
@shutdown - Stop the server
@save <filename> - Save log to file
@clear - Clear the server log
@status - Show server status
@help - Show this help";

/// A parsed administrative command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    List,
    /// Message may be blank; blank messages are rejected at execution.
    Broadcast(String),
    Kick(String),
    Shutdown,
    Save(String),
    Clear,
    Status,
    Help,
}

impl AdminCommand {
    /// Returns the command word including the `@`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::List => "@list",
            Self::Broadcast(_) => "@broadcast",
            Self::Kick(_) => "@kick",
            Self::Shutdown => "@shutdown",
            Self::Save(_) => "@save",
            Self::Clear => "@clear",
            Self::Status => "@status",
            Self::Help => "@help",
        }
    }

    /// Parses one line of operator input.
    pub fn parse(input: &str) -> Result<Self, CommandParseError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(CommandParseError::Empty);
        }

        let (word, arg) = match input.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (input, ""),
        };

        let required = |usage: &'static str| {
            if arg.is_empty() {
                Err(CommandParseError::MissingArgument { usage })
            } else {
                Ok(arg.to_string())
            }
        };

        match word.to_lowercase().as_str() {
            "@list" => Ok(Self::List),
            "@broadcast" => Ok(Self::Broadcast(arg.to_string())),
            "@kick" => required("@kick <client_id or ip>").map(Self::Kick),
            "@shutdown" => Ok(Self::Shutdown),
            "@save" => required("@save <filename>").map(Self::Save),
            "@clear" => Ok(Self::Clear),
            "@status" => Ok(Self::Status),
            "@help" => Ok(Self::Help),
            _ => Err(CommandParseError::Unknown(input.to_string())),
        }
    }
}

impl FromStr for AdminCommand {
    type Err = CommandParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Errors produced while parsing operator input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,

    #[error("Usage: {usage}")]
    MissingArgument { usage: &'static str },

    #[error("Unknown command: {0} (type @help for available commands)")]
    Unknown(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(AdminCommand::parse("@list"), Ok(AdminCommand::List));
        assert_eq!(AdminCommand::parse("@shutdown"), Ok(AdminCommand::Shutdown));
        assert_eq!(AdminCommand::parse("@clear"), Ok(AdminCommand::Clear));
        assert_eq!(AdminCommand::parse("@status"), Ok(AdminCommand::Status));
        assert_eq!(AdminCommand::parse("@help"), Ok(AdminCommand::Help));
    }

    #[test]
    fn test_command_word_is_case_insensitive() {
        assert_eq!(AdminCommand::parse("@LIST"), Ok(AdminCommand::List));
        assert_eq!(
            AdminCommand::parse("@Kick 3"),
            Ok(AdminCommand::Kick("3".to_string()))
        );
    }

    #[test]
    fn test_argument_keeps_inner_whitespace() {
        assert_eq!(
            AdminCommand::parse("@broadcast   hello   world  "),
            Ok(AdminCommand::Broadcast("hello   world".to_string()))
        );
        assert_eq!(
            AdminCommand::parse("@broadcast\thi"),
            Ok(AdminCommand::Broadcast("hi".to_string()))
        );
    }

    #[test]
    fn test_broadcast_without_message_is_blank() {
        assert_eq!(
            AdminCommand::parse("@broadcast"),
            Ok(AdminCommand::Broadcast(String::new()))
        );
    }

    #[test]
    fn test_missing_argument() {
        assert!(matches!(
            AdminCommand::parse("@kick"),
            Err(CommandParseError::MissingArgument { .. })
        ));
        let err = AdminCommand::parse("@save   ").unwrap_err();
        assert_eq!(err.to_string(), "Usage: @save <filename>");
    }

    #[test]
    fn test_unknown_command_is_echoed() {
        let err = AdminCommand::parse("@dance now").unwrap_err();
        assert_eq!(err, CommandParseError::Unknown("@dance now".to_string()));
        assert!(err.to_string().contains("@dance now"));

        assert!(matches!(
            "list".parse::<AdminCommand>(),
            Err(CommandParseError::Unknown(_))
        ));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(AdminCommand::parse("   "), Err(CommandParseError::Empty));
    }

    #[test]
    fn test_help_lists_every_command() {
        for cmd in [
            "@list", "@broadcast", "@kick", "@shutdown", "@save", "@clear", "@status", "@help",
        ] {
            assert!(HELP_TEXT.contains(cmd), "help is missing {cmd}");
        }
    }
}

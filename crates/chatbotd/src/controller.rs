//! Administrative command execution.
//!
//! The [`Controller`] runs one `@` command per call against the current
//! registry snapshot and server state. Validation failures are returned
//! to the caller and change nothing.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Unknown or malformed input produces a `CommandError`, never a crash

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use chatbot_core::{ServerStatus, SessionInfo, StatusReport};
use chatbot_protocol::{broadcast_line, AdminCommand, CommandParseError, HELP_TEXT, KICK_NOTICE};

use crate::events::ServerEvent;
use crate::lifecycle::{LifecycleError, LifecycleManager};
use crate::persist::Persister;
use crate::session::{CloseReason, SessionHandle};

// ============================================================================
// Outcomes
// ============================================================================

/// Successful result of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Active sessions, ordered by ID
    List(Vec<SessionInfo>),
    Broadcast { sent: usize },
    /// Display info of the kicked session, captured before it closed
    Kicked(String),
    Shutdown,
    Saved(PathBuf),
    Cleared,
    Status(StatusReport),
    Help,
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List(sessions) => {
                write!(f, "Clients: {}", sessions.len())?;
                for (index, info) in sessions.iter().enumerate() {
                    write!(f, "\n{}. {}", index + 1, info.display_info())?;
                }
                Ok(())
            }
            Self::Broadcast { sent } => write!(f, "Broadcast sent to {sent} clients"),
            Self::Kicked(info) => write!(f, "Kicked client: {info}"),
            Self::Shutdown => write!(f, "Server stopped"),
            Self::Saved(path) => write!(f, "Log saved to: {}", path.display()),
            Self::Cleared => write!(f, "Log cleared"),
            Self::Status(report) => write!(f, "{report}"),
            Self::Help => f.write_str(HELP_TEXT),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Reasons a command was refused.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Broadcast message cannot be empty")]
    EmptyMessage,

    #[error("Client not found: {0}")]
    NotFound(String),

    #[error("Invalid filename: {0}. Use only letters, numbers, dots, hyphens and underscores.")]
    InvalidFilename(String),

    #[error("Unknown command: {0} (type @help for available commands)")]
    UnknownCommand(String),

    #[error("Usage: {usage}")]
    MissingArgument { usage: &'static str },

    #[error("Server is not running")]
    NotRunning,

    #[error("Save Error: {0}")]
    Persist(String),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl From<CommandParseError> for CommandError {
    fn from(err: CommandParseError) -> Self {
        match err {
            CommandParseError::Empty => Self::UnknownCommand(String::new()),
            CommandParseError::MissingArgument { usage } => Self::MissingArgument { usage },
            CommandParseError::Unknown(input) => Self::UnknownCommand(input),
        }
    }
}

/// Whether `name` is acceptable as a `@save` target.
///
/// Only `[a-zA-Z0-9_.-]` characters are allowed, and the name must not
/// refer to a directory (`.` or `..`).
pub fn is_valid_filename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

// ============================================================================
// Controller
// ============================================================================

/// Executes administrative commands.
#[derive(Clone)]
pub struct Controller {
    lifecycle: Arc<LifecycleManager>,
    persister: Arc<dyn Persister>,
}

impl Controller {
    pub fn new(lifecycle: Arc<LifecycleManager>, persister: Arc<dyn Persister>) -> Self {
        Self {
            lifecycle,
            persister,
        }
    }

    /// Parses and executes one line of operator input.
    pub async fn execute(&self, input: &str) -> Result<CommandOutcome, CommandError> {
        let command = AdminCommand::parse(input)?;
        debug!(command = command.name(), "Executing command");
        self.run(command).await
    }

    /// Executes an already parsed command.
    pub async fn run(&self, command: AdminCommand) -> Result<CommandOutcome, CommandError> {
        match command {
            AdminCommand::List => Ok(self.list().await),
            AdminCommand::Broadcast(message) => self.broadcast(&message).await,
            AdminCommand::Kick(target) => self.kick(&target).await,
            AdminCommand::Shutdown => self.shutdown().await,
            AdminCommand::Save(filename) => self.save(&filename),
            AdminCommand::Clear => Ok(self.clear()),
            AdminCommand::Status => Ok(CommandOutcome::Status(self.lifecycle.report())),
            AdminCommand::Help => Ok(CommandOutcome::Help),
        }
    }

    async fn list(&self) -> CommandOutcome {
        let sessions = self
            .lifecycle
            .registry()
            .snapshot()
            .await
            .iter()
            .filter(|s| !s.is_closed())
            .map(SessionHandle::info)
            .collect();
        CommandOutcome::List(sessions)
    }

    /// Sends the prefixed message to every welcomed session concurrently.
    ///
    /// Sessions still waiting for their welcome are skipped. Only
    /// successful deliveries are counted; a failed send is left to that
    /// session's own termination path.
    async fn broadcast(&self, message: &str) -> Result<CommandOutcome, CommandError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(CommandError::EmptyMessage);
        }
        self.require_running()?;

        let line = Arc::new(broadcast_line(message));
        let mut sends = JoinSet::new();
        let sessions = self.lifecycle.registry().snapshot().await;
        for session in sessions.into_iter().filter(SessionHandle::is_active) {
            let line = Arc::clone(&line);
            sends.spawn(async move {
                match session.send_line(&line).await {
                    Ok(()) => true,
                    Err(e) => {
                        debug!(session_id = %session.id(), error = %e, "Broadcast send failed");
                        false
                    }
                }
            });
        }

        let mut sent = 0usize;
        while let Some(result) = sends.join_next().await {
            if matches!(result, Ok(true)) {
                sent += 1;
            }
        }

        info!(sent, message = %message, "Broadcast delivered");
        self.lifecycle.events().publish(ServerEvent::Broadcast {
            message: message.to_string(),
            sent,
        });
        Ok(CommandOutcome::Broadcast { sent })
    }

    /// Notifies and force-closes the first session matching `target`.
    ///
    /// An exact numeric ID match wins; otherwise the first session whose
    /// display info contains `target` is chosen.
    async fn kick(&self, target: &str) -> Result<CommandOutcome, CommandError> {
        self.require_running()?;

        let registry = self.lifecycle.registry();

        let by_id = match target.parse::<u64>() {
            Ok(id) => {
                registry
                    .find_by(|s| !s.is_closed() && s.id().get() == id)
                    .await
            }
            Err(_) => None,
        };
        let found = match by_id {
            Some(session) => Some(session),
            None => {
                registry
                    .find_by(|s| !s.is_closed() && s.display_info().contains(target))
                    .await
            }
        };

        let Some(session) = found else {
            return Err(CommandError::NotFound(target.to_string()));
        };

        let id = session.id();
        let info = session.display_info();

        // A session that has not been welcomed yet only gets the sentinel
        if session.is_active() {
            if let Err(e) = session.send_line(KICK_NOTICE).await {
                debug!(session_id = %id, error = %e, "Kick notice not delivered");
            }
        }
        session.close();
        registry.remove(id, CloseReason::Forced).await;

        info!(session_id = %id, "Kicked client");
        self.lifecycle.events().publish(ServerEvent::Kicked {
            id,
            info: info.clone(),
        });
        Ok(CommandOutcome::Kicked(info))
    }

    async fn shutdown(&self) -> Result<CommandOutcome, CommandError> {
        if !matches!(
            self.lifecycle.status(),
            ServerStatus::Starting | ServerStatus::Running
        ) {
            return Err(CommandError::NotRunning);
        }
        info!("Shutdown command received");
        self.lifecycle.stop_server().await?;
        Ok(CommandOutcome::Shutdown)
    }

    fn save(&self, filename: &str) -> Result<CommandOutcome, CommandError> {
        if !is_valid_filename(filename) {
            warn!(filename = %filename, "Rejected save filename");
            return Err(CommandError::InvalidFilename(filename.to_string()));
        }

        let events = self.lifecycle.events();
        let content = events.journal().contents();
        let path = self
            .persister
            .persist(&content, filename)
            .map_err(|e| CommandError::Persist(e.to_string()))?;

        info!(path = %path.display(), "Log saved");
        events.publish(ServerEvent::LogSaved { path: path.clone() });
        Ok(CommandOutcome::Saved(path))
    }

    fn clear(&self) -> CommandOutcome {
        let events = self.lifecycle.events();
        events.journal().clear();
        events.publish(ServerEvent::LogCleared);
        CommandOutcome::Cleared
    }

    fn require_running(&self) -> Result<(), CommandError> {
        if self.lifecycle.is_running() {
            Ok(())
        } else {
            Err(CommandError::NotRunning)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatbot_core::{SessionId, SessionStatus};
    use chrono::Utc;

    #[test]
    fn test_filename_validation() {
        assert!(is_valid_filename("server.log"));
        assert!(is_valid_filename("log_2024-01-01.txt"));
        assert!(!is_valid_filename("../etc/passwd"));
        assert!(!is_valid_filename("a/b"));
        assert!(!is_valid_filename("a b"));
        assert!(!is_valid_filename(".."));
        assert!(!is_valid_filename(""));
    }

    #[test]
    fn test_list_rendering() {
        let now = Utc::now();
        let info = |id: u64, addr: &str| SessionInfo {
            id: SessionId::new(id),
            addr: addr.to_string(),
            status: SessionStatus::Active,
            connected_at: now,
            last_activity: now,
        };
        let outcome = CommandOutcome::List(vec![info(1, "10.0.0.1:1"), info(4, "10.0.0.2:2")]);
        assert_eq!(
            outcome.to_string(),
            "Clients: 2\n1. ID: 1-10.0.0.1:1\n2. ID: 4-10.0.0.2:2"
        );
        assert_eq!(CommandOutcome::List(Vec::new()).to_string(), "Clients: 0");
    }

    #[test]
    fn test_status_rendering() {
        let outcome = CommandOutcome::Status(StatusReport {
            status: ServerStatus::Running,
            port: 5555,
            clients: 2,
            max_clients: 100,
        });
        let text = outcome.to_string();
        assert!(text.starts_with("Server Status: Running"));
        assert!(text.ends_with("Max clients: 100"));
    }

    #[test]
    fn test_parse_errors_map_to_command_errors() {
        assert!(matches!(
            CommandError::from(CommandParseError::Unknown("@foo".into())),
            CommandError::UnknownCommand(s) if s == "@foo"
        ));
        assert!(matches!(
            CommandError::from(CommandParseError::MissingArgument { usage: "@save <filename>" }),
            CommandError::MissingArgument { .. }
        ));
    }
}

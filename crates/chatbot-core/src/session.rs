//! Session identity and point-in-time session views.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

// ============================================================================
// Session ID
// ============================================================================

/// Identifier of a client session.
///
/// IDs are assigned in increasing order when a connection is accepted and
/// are never reused for the lifetime of the server process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Creates a SessionId from its numeric value.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl From<u64> for SessionId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// ============================================================================
// Session Status
// ============================================================================

/// Connection state of a session.
///
/// - **Connecting**: accepted, welcome lines not yet delivered
/// - **Active**: in the read/reply loop
/// - **Closed**: terminal; no further I/O happens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Connecting,
    Active,
    Closed,
}

impl SessionStatus {
    /// Returns the display label for this status.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }

    /// Encodes the status for atomic storage.
    #[must_use]
    pub const fn to_raw(self) -> u8 {
        match self {
            Self::Connecting => 0,
            Self::Active => 1,
            Self::Closed => 2,
        }
    }

    /// Decodes a status stored with [`SessionStatus::to_raw`].
    ///
    /// Unknown values decode as `Closed`.
    #[must_use]
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Connecting,
            1 => Self::Active,
            _ => Self::Closed,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Session Info
// ============================================================================

/// Read-only snapshot of a session, safe to hold while the session keeps running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: SessionId,
    /// Remote address as a display string
    pub addr: String,
    pub status: SessionStatus,
    pub connected_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl SessionInfo {
    /// Returns the administrative display string.
    ///
    /// `ID: 3-127.0.0.1:40122` while the session is live and
    /// `ID: 3-[Disconnected]` once it has closed.
    #[must_use]
    pub fn display_info(&self) -> String {
        if self.status == SessionStatus::Closed {
            format!("ID: {}-[Disconnected]", self.id)
        } else {
            format!("ID: {}-{}", self.id, self.addr)
        }
    }

    /// Seconds since the last line was received.
    #[must_use]
    pub fn idle_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_activity).num_seconds().max(0)
    }
}

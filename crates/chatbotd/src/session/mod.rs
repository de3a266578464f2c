//! Client sessions.
//!
//! A session is split in two:
//! - [`SessionHandle`]: cheap-to-clone shared state that the registry stores
//!   and the controller uses (send a line, force-close, inspect).
//! - [`Session`]: the worker that owns the read half and runs the
//!   welcome / read / reply loop until the connection ends.
//!
//! # Closing
//!
//! Every termination path converges on the same routine:
//! 1. status becomes `Closed` and the cancellation token fires, so the
//!    worker stops reading
//! 2. the worker takes the writer out of its slot, attempts the
//!    `__DISCONNECTED__` sentinel and shuts the write half down
//!
//! Taking the writer out of an `Option` makes step 2 happen exactly once no
//! matter how many times `close()` races with natural termination.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - I/O errors end the affected session only

mod worker;

pub use worker::{Session, SessionSettings, MAX_LINE_BYTES};

use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use chatbot_core::{SessionId, SessionInfo, SessionStatus};
use chatbot_protocol::DISCONNECT_SENTINEL;

/// Type-erased read half of a client connection.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Type-erased write half of a client connection.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Client sent the farewell phrase
    Farewell,
    /// Client closed its end (EOF)
    ClientClosed,
    /// No input within the idle timeout
    Timeout,
    /// Read failed (reset, invalid UTF-8, oversized line)
    ReadError,
    /// A line could not be delivered
    SendFailure,
    /// Closed by kick or shutdown
    Forced,
}

impl CloseReason {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Farewell => "farewell",
            Self::ClientClosed => "client closed",
            Self::Timeout => "idle timeout",
            Self::ReadError => "read error",
            Self::SendFailure => "send failure",
            Self::Forced => "closed by server",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors that can occur on a session's connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session is closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Write timeout")]
    WriteTimeout,

    #[error("Line too long (max: {max} bytes)")]
    LineTooLong { max: usize },
}

/// Shared, cloneable view of a live session.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<SessionShared>,
}

struct SessionShared {
    id: SessionId,
    addr: String,
    connected_at: DateTime<Utc>,
    status: AtomicU8,
    /// Unix milliseconds of the last received line
    last_activity_ms: AtomicI64,
    /// `None` once the connection has been released
    writer: Mutex<Option<BufWriter<BoxedWriter>>>,
    cancel: CancellationToken,
    write_timeout: Duration,
}

impl SessionHandle {
    /// Creates the handle for a freshly accepted connection.
    pub fn new(
        id: SessionId,
        addr: impl Into<String>,
        writer: BoxedWriter,
        write_timeout: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            inner: Arc::new(SessionShared {
                id,
                addr: addr.into(),
                connected_at: now,
                status: AtomicU8::new(SessionStatus::Connecting.to_raw()),
                last_activity_ms: AtomicI64::new(now.timestamp_millis()),
                writer: Mutex::new(Some(BufWriter::new(writer))),
                cancel: CancellationToken::new(),
                write_timeout,
            }),
        }
    }

    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    pub fn addr(&self) -> &str {
        &self.inner.addr
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus::from_raw(self.inner.status.load(Ordering::Acquire))
    }

    pub fn is_closed(&self) -> bool {
        self.status() == SessionStatus::Closed
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        let ms = self.inner.last_activity_ms.load(Ordering::Relaxed);
        DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or(self.inner.connected_at)
    }

    /// Point-in-time snapshot of this session.
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.inner.id,
            addr: self.inner.addr.clone(),
            status: self.status(),
            connected_at: self.inner.connected_at,
            last_activity: self.last_activity(),
        }
    }

    /// `ID: <id>-<addr>`, or `ID: <id>-[Disconnected]` once closed.
    pub fn display_info(&self) -> String {
        self.info().display_info()
    }

    /// Sends one line, bounded by the write timeout.
    ///
    /// Fails with [`SessionError::Closed`] once the session is closing; a
    /// failed send does not close the session by itself.
    pub async fn send_line(&self, line: &str) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }

        let mut slot = self.inner.writer.lock().await;
        let writer = slot.as_mut().ok_or(SessionError::Closed)?;

        match timeout(self.inner.write_timeout, write_line(writer, line)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SessionError::Io(e.to_string())),
            Err(_) => Err(SessionError::WriteTimeout),
        }
    }

    /// Forces the session to close.
    ///
    /// Idempotent and safe to race with the worker's own termination.
    /// Returns `true` only for the call that moved the session to `Closed`.
    pub fn close(&self) -> bool {
        let previous = self
            .inner
            .status
            .swap(SessionStatus::Closed.to_raw(), Ordering::AcqRel);
        self.inner.cancel.cancel();
        SessionStatus::from_raw(previous) != SessionStatus::Closed
    }

    /// Token cancelled when the session starts closing.
    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// True once the welcome has started going out and until close.
    pub fn is_active(&self) -> bool {
        self.status() == SessionStatus::Active
    }

    /// Moves Connecting -> Active and writes `lines` while holding the writer.
    ///
    /// Anything sent after observing `Active` queues behind the welcome.
    /// Returns `Ok(false)` without writing if the session was closed first.
    pub(crate) async fn send_welcome(&self, lines: &[String]) -> Result<bool, SessionError> {
        let mut slot = self.inner.writer.lock().await;

        let activated = self
            .inner
            .status
            .compare_exchange(
                SessionStatus::Connecting.to_raw(),
                SessionStatus::Active.to_raw(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if !activated {
            return Ok(false);
        }

        let writer = slot.as_mut().ok_or(SessionError::Closed)?;
        for line in lines {
            match timeout(self.inner.write_timeout, write_line(writer, line)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(SessionError::Io(e.to_string())),
                Err(_) => return Err(SessionError::WriteTimeout),
            }
        }
        Ok(true)
    }

    pub(crate) fn touch(&self) {
        self.inner
            .last_activity_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    /// Closes the session and releases the connection.
    ///
    /// Only the first caller finds the writer in its slot; it attempts the
    /// disconnect sentinel when `send_sentinel` is set and shuts the write
    /// half down. Later callers do nothing.
    pub(crate) async fn release(&self, send_sentinel: bool) {
        self.close();

        let taken = self.inner.writer.lock().await.take();
        let Some(mut writer) = taken else {
            return;
        };

        if send_sentinel {
            let sent = timeout(
                self.inner.write_timeout,
                write_line(&mut writer, DISCONNECT_SENTINEL),
            )
            .await;
            if !matches!(sent, Ok(Ok(()))) {
                debug!(session_id = %self.inner.id, "Disconnect sentinel not delivered");
            }
        }

        match timeout(self.inner.write_timeout, writer.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(session_id = %self.inner.id, error = %e, "Write half shutdown failed");
            }
            Err(_) => debug!(session_id = %self.inner.id, "Write half shutdown timed out"),
        }
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.inner.id)
            .field("addr", &self.inner.addr)
            .field("status", &self.status())
            .finish()
    }
}

async fn write_line<W>(writer: &mut W, line: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

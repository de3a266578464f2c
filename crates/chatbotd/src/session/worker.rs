//! The per-connection read/reply loop.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use chatbot_core::Responder;
use chatbot_protocol::{is_farewell, welcome_lines};

use super::{BoxedReader, CloseReason, SessionError, SessionHandle};
use crate::config::ServerConfig;
use crate::events::{EventBus, ServerEvent};

/// Maximum accepted input line (64 KiB)
pub const MAX_LINE_BYTES: usize = 65_536;

/// Timing knobs for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub idle_timeout: Duration,
    /// Inclusive bounds in milliseconds
    pub reply_delay_ms: (u64, u64),
}

impl From<&ServerConfig> for SessionSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            idle_timeout: config.idle_timeout(),
            reply_delay_ms: config.reply_delay_ms(),
        }
    }
}

/// Worker for one client connection.
///
/// Created by the acceptor after the handle has been registered; consumed
/// by [`Session::run`].
pub struct Session {
    handle: SessionHandle,
    reader: BufReader<BoxedReader>,
    responder: Arc<dyn Responder>,
    events: EventBus,
    settings: SessionSettings,
}

impl Session {
    pub fn new(
        handle: SessionHandle,
        reader: BoxedReader,
        responder: Arc<dyn Responder>,
        events: EventBus,
        settings: SessionSettings,
    ) -> Self {
        Self {
            handle,
            reader: BufReader::new(reader),
            responder,
            events,
            settings,
        }
    }

    /// Runs the session until the connection ends.
    ///
    /// Always releases the connection before returning; the caller is
    /// responsible for removing the session from the registry.
    pub async fn run(mut self) -> CloseReason {
        let id = self.handle.id();
        debug!(session_id = %id, addr = %self.handle.addr(), "Session started");

        let reason = self.drive().await;

        // A connection that just failed a write will not take the sentinel either.
        let send_sentinel = reason != CloseReason::SendFailure;
        self.handle.release(send_sentinel).await;

        info!(session_id = %id, reason = %reason, "Session ended");
        reason
    }

    async fn drive(&mut self) -> CloseReason {
        let id = self.handle.id();

        match self.handle.send_welcome(&welcome_lines(id)).await {
            Ok(true) => {}
            Ok(false) => return CloseReason::Forced,
            Err(e) => return self.send_failed(e),
        }

        let cancel = self.handle.cancel_token();
        let mut buf = String::new();

        loop {
            buf.clear();
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => return CloseReason::Forced,
                r = timeout(
                    self.settings.idle_timeout,
                    read_bounded_line(&mut self.reader, &mut buf),
                ) => r,
            };

            match read {
                Err(_) => {
                    debug!(session_id = %id, "Session idle timeout");
                    return CloseReason::Timeout;
                }
                Ok(Err(e)) => {
                    warn!(session_id = %id, error = %e, "Read failed");
                    self.events.publish(ServerEvent::SessionError {
                        id,
                        error: e.to_string(),
                    });
                    return CloseReason::ReadError;
                }
                Ok(Ok(0)) => {
                    debug!(session_id = %id, "Client sent EOF");
                    return CloseReason::ClientClosed;
                }
                Ok(Ok(_)) => {}
            }

            self.handle.touch();

            let line = buf.trim();
            if line.is_empty() {
                continue;
            }

            self.events.publish(ServerEvent::ClientMessage {
                id,
                line: line.to_string(),
            });

            let reply = self.responder.reply(line);
            let farewell = is_farewell(line);

            if !farewell {
                let delay = self.reply_delay();
                if !delay.is_zero() {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return CloseReason::Forced,
                        _ = sleep(delay) => {}
                    }
                }
            }

            if let Err(e) = self.handle.send_line(&reply).await {
                return self.send_failed(e);
            }

            if farewell {
                return CloseReason::Farewell;
            }
        }
    }

    /// Classifies a failed send: a concurrent close wins over the I/O error.
    fn send_failed(&self, error: SessionError) -> CloseReason {
        if error == SessionError::Closed || self.handle.is_closed() {
            return CloseReason::Forced;
        }
        let id = self.handle.id();
        warn!(session_id = %id, error = %error, "Send failed");
        self.events.publish(ServerEvent::SessionError {
            id,
            error: error.to_string(),
        });
        CloseReason::SendFailure
    }

    fn reply_delay(&self) -> Duration {
        let (min, max) = self.settings.reply_delay_ms;
        if max == 0 {
            return Duration::ZERO;
        }
        let min = min.min(max);
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

/// Reads one line, refusing to buffer more than [`MAX_LINE_BYTES`].
async fn read_bounded_line(
    reader: &mut BufReader<BoxedReader>,
    buf: &mut String,
) -> Result<usize, SessionError> {
    let limit = MAX_LINE_BYTES as u64 + 1;
    let n = reader
        .take(limit)
        .read_line(buf)
        .await
        .map_err(|e| SessionError::Io(e.to_string()))?;

    if n > MAX_LINE_BYTES && !buf.ends_with('\n') {
        return Err(SessionError::LineTooLong {
            max: MAX_LINE_BYTES,
        });
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatbot_core::{SessionId, SessionStatus};
    use tokio::io::{AsyncWriteExt, DuplexStream};

    struct Harness {
        handle: SessionHandle,
        client_rx: BufReader<tokio::io::ReadHalf<DuplexStream>>,
        client_tx: tokio::io::WriteHalf<DuplexStream>,
        task: tokio::task::JoinHandle<CloseReason>,
        events: EventBus,
    }

    fn spawn_session(idle: Duration) -> Harness {
        let (server_side, client_side) = tokio::io::duplex(8 * 1024);
        let (server_rx, server_tx) = tokio::io::split(server_side);
        let (client_rx, client_tx) = tokio::io::split(client_side);

        let events = EventBus::new();
        let handle = SessionHandle::new(
            SessionId::new(5),
            "test-peer",
            Box::new(server_tx),
            Duration::from_millis(500),
        );
        let responder: Arc<dyn Responder> = Arc::new(|input: &str| format!("echo: {input}"));
        let session = Session::new(
            handle.clone(),
            Box::new(server_rx),
            responder,
            events.clone(),
            SessionSettings {
                idle_timeout: idle,
                reply_delay_ms: (0, 0),
            },
        );
        let task = tokio::spawn(session.run());

        Harness {
            handle,
            client_rx: BufReader::new(client_rx),
            client_tx,
            task,
            events,
        }
    }

    impl Harness {
        async fn recv(&mut self) -> String {
            let mut line = String::new();
            timeout(Duration::from_secs(2), self.client_rx.read_line(&mut line))
                .await
                .expect("read timed out")
                .expect("read failed");
            line.trim_end().to_string()
        }

        async fn send(&mut self, line: &str) {
            self.client_tx.write_all(line.as_bytes()).await.unwrap();
            self.client_tx.write_all(b"\n").await.unwrap();
            self.client_tx.flush().await.unwrap();
        }

        async fn skip_welcome(&mut self) {
            let first = self.recv().await;
            assert!(first.contains("#5"), "unexpected greeting: {first}");
            self.recv().await;
        }
    }

    #[tokio::test]
    async fn test_welcome_then_active() {
        let mut h = spawn_session(Duration::from_secs(5));
        h.skip_welcome().await;
        h.send("").await;
        h.send("ping").await;
        assert_eq!(h.recv().await, "echo: ping");
        assert_eq!(h.handle.status(), SessionStatus::Active);
        h.handle.close();
        assert_eq!(h.task.await.unwrap(), CloseReason::Forced);
    }

    #[tokio::test]
    async fn test_blank_lines_ignored() {
        let mut h = spawn_session(Duration::from_secs(5));
        h.skip_welcome().await;
        h.send("   ").await;
        h.send("\t").await;
        h.send("a").await;
        assert_eq!(h.recv().await, "echo: a");
        h.handle.close();
        h.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_farewell_replies_then_closes() {
        let mut h = spawn_session(Duration::from_secs(5));
        h.skip_welcome().await;
        h.send("GoodBye").await;
        h.send("after").await;
        assert_eq!(h.recv().await, "echo: GoodBye");
        assert_eq!(h.recv().await, "__DISCONNECTED__");
        assert_eq!(h.recv().await, "");
        assert_eq!(h.task.await.unwrap(), CloseReason::Farewell);
        assert!(h.handle.is_closed());
    }

    #[tokio::test]
    async fn test_idle_timeout_closes() {
        let mut h = spawn_session(Duration::from_millis(100));
        h.skip_welcome().await;
        assert_eq!(h.recv().await, "__DISCONNECTED__");
        assert_eq!(h.task.await.unwrap(), CloseReason::Timeout);
    }

    #[tokio::test]
    async fn test_client_eof() {
        let mut h = spawn_session(Duration::from_secs(5));
        h.skip_welcome().await;
        h.client_tx.shutdown().await.unwrap();
        assert_eq!(h.task.await.unwrap(), CloseReason::ClientClosed);
    }

    #[tokio::test]
    async fn test_forced_close_sends_sentinel() {
        let mut h = spawn_session(Duration::from_secs(5));
        h.skip_welcome().await;
        assert!(h.handle.close());
        assert_eq!(h.recv().await, "__DISCONNECTED__");
        assert_eq!(h.task.await.unwrap(), CloseReason::Forced);
        // Second close after natural termination is a no-op
        assert!(!h.handle.close());
    }

    #[tokio::test]
    async fn test_messages_are_observed() {
        let mut h = spawn_session(Duration::from_secs(5));
        h.skip_welcome().await;
        h.send("hello there").await;
        h.recv().await;
        assert!(h
            .events
            .journal()
            .contents()
            .contains("Client 5 says: hello there"));
        h.handle.close();
        h.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_oversized_line_is_read_error() {
        let mut h = spawn_session(Duration::from_secs(5));
        h.skip_welcome().await;
        let big = vec![b'x'; MAX_LINE_BYTES + 10];
        // The duplex buffer is smaller than the line; write concurrently.
        let mut tx = h.client_tx;
        let writer = tokio::spawn(async move {
            let _ = tx.write_all(&big).await;
            tx
        });
        assert_eq!(h.task.await.unwrap(), CloseReason::ReadError);
        drop(writer);
    }
}

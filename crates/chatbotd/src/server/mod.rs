//! TCP acceptor for the chat server.
//!
//! The acceptor:
//! - Owns the listening socket
//! - Enforces the client capacity bound before any session is built
//! - Registers each accepted connection and runs its [`Session`] on a
//!   tracked task
//! - Stops on a `CancellationToken`; dropping the listener is part of the
//!   loop's exit, so `stop()` returning means the port is free
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │    Acceptor     │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ├──────────────── at capacity ──▶ "Server full..." then close
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ RegistryHandle  │◀────│ Session worker  │
//! │     add()       │     │ (TaskTracker)   │
//! └─────────────────┘     └─────────────────┘
//!                           remove() on exit
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Accept errors are logged and the loop continues

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use chatbot_core::{validate_port, DomainError, Responder, SessionId};
use chatbot_protocol::SERVER_FULL;

use crate::events::{EventBus, ServerEvent};
use crate::registry::{RegistryError, RegistryHandle};
use crate::session::{Session, SessionHandle, SessionSettings};
use crate::state::ServerState;

/// Pause after a failed accept so a persistent error (e.g. EMFILE) does not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Everything the acceptor needs to build and run sessions.
#[derive(Clone)]
pub struct AcceptContext {
    pub registry: RegistryHandle,
    pub events: EventBus,
    pub responder: Arc<dyn Responder>,
    pub state: Arc<ServerState>,
    /// Source of session IDs; shared across restarts so IDs are never reused
    pub ids: Arc<AtomicU64>,
    pub tracker: TaskTracker,
    pub settings: SessionSettings,
    pub write_timeout: Duration,
    pub reject_timeout: Duration,
}

/// A bound, not yet running, listener.
pub struct Acceptor {
    listener: TcpListener,
    local_addr: SocketAddr,
    ctx: AcceptContext,
}

impl Acceptor {
    /// Binds the listening socket.
    ///
    /// # Errors
    ///
    /// - `ServerError::InvalidPort` if `port` is outside `1024..=65535`
    /// - `ServerError::Bind` if the address is unavailable
    pub async fn bind(ip: IpAddr, port: u32, ctx: AcceptContext) -> Result<Self, ServerError> {
        let port = validate_port(port)?;
        let addr = SocketAddr::new(ip, port);

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr,
                error: e.to_string(),
            })?;
        let local_addr = listener.local_addr().map_err(|e| ServerError::Bind {
            addr,
            error: e.to_string(),
        })?;

        info!(addr = %local_addr, "Chat server listening");

        Ok(Self {
            listener,
            local_addr,
            ctx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts the accept loop on its own task.
    pub fn spawn(self) -> AcceptorHandle {
        let cancel = CancellationToken::new();
        let local_addr = self.local_addr;
        let task = tokio::spawn(self.run(cancel.clone()));

        AcceptorHandle {
            cancel,
            task,
            local_addr,
        }
    }

    async fn run(self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("Acceptor stop requested");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => self.handle_connection(stream, peer).await,
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            self.ctx.events.publish(ServerEvent::AcceptError {
                                error: e.to_string(),
                            });
                            sleep(ACCEPT_ERROR_BACKOFF).await;
                        }
                    }
                }
            }
        }

        // `self.listener` is dropped here, closing the socket
        info!(addr = %self.local_addr, "Acceptor stopped");
    }

    async fn handle_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let ctx = &self.ctx;
        let addr = peer.to_string();

        if !ctx.state.is_running() {
            debug!(addr = %addr, "Dropping connection, server not running");
            return;
        }

        if !ctx.registry.has_capacity() {
            self.reject(stream, addr);
            return;
        }

        if let Err(e) = stream.set_nodelay(true) {
            debug!(addr = %addr, error = %e, "Failed to set TCP_NODELAY");
        }

        let id = SessionId::new(ctx.ids.fetch_add(1, Ordering::Relaxed));
        let (reader, writer) = stream.into_split();
        let handle = SessionHandle::new(id, addr.clone(), Box::new(writer), ctx.write_timeout);

        match ctx.registry.add(handle.clone()).await {
            Ok(()) => {}
            Err(RegistryError::RegistryFull { .. }) => {
                // Lost a race with a concurrent accept; reject through the handle
                self.publish_rejected(addr);
                let limit = ctx.reject_timeout;
                ctx.tracker.spawn(async move {
                    let _ = timeout(limit, handle.send_line(SERVER_FULL)).await;
                    handle.release(false).await;
                });
                return;
            }
            Err(e) => {
                warn!(session_id = %id, error = %e, "Failed to register session");
                ctx.tracker.spawn(async move { handle.release(false).await });
                return;
            }
        }

        let session = Session::new(
            handle,
            Box::new(reader),
            Arc::clone(&ctx.responder),
            ctx.events.clone(),
            ctx.settings,
        );
        let registry = ctx.registry.clone();

        ctx.tracker.spawn(async move {
            let reason = session.run().await;
            registry.remove(id, reason).await;
        });
    }

    /// Sends the rejection line on a separate task and closes the socket.
    fn reject(&self, mut stream: TcpStream, addr: String) {
        self.publish_rejected(addr);

        let limit = self.ctx.reject_timeout;
        self.ctx.tracker.spawn(async move {
            let rejected = timeout(limit, async {
                stream.write_all(SERVER_FULL.as_bytes()).await?;
                stream.write_all(b"\n").await?;
                stream.shutdown().await
            })
            .await;
            if !matches!(rejected, Ok(Ok(()))) {
                debug!("Rejection message not delivered");
            }
        });
    }

    fn publish_rejected(&self, addr: String) {
        warn!(
            addr = %addr,
            max = self.ctx.registry.capacity(),
            "Server full, rejecting connection"
        );
        self.ctx.events.publish(ServerEvent::ClientRejected { addr });
    }
}

/// Control handle for a running accept loop.
pub struct AcceptorHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    local_addr: SocketAddr,
}

impl AcceptorHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting and waits until the listener is closed.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            error!(error = %e, "Acceptor task failed");
        }
    }
}

/// Errors that can occur while starting the acceptor.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: SocketAddr, error: String },

    #[error(transparent)]
    InvalidPort(#[from] DomainError),
}

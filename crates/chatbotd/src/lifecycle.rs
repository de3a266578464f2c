//! Start/stop coordination for the whole server.
//!
//! ```text
//! Stopped ──start_server──▶ Starting ──bind ok──▶ Running
//!    ▲                          │                    │
//!    └────────── bind failed ───┘               stop_server
//!    │                                               ▼
//!    └──────────── drained (or grace expired) ── Stopping
//! ```
//!
//! The registry, event bus and ID allocator live as long as the manager,
//! so a restart keeps the log and never reuses a session ID.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - A failed start always ends in `Stopped`

use std::net::SocketAddr;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use chatbot_core::{validate_port, DomainError, Responder, ServerStatus, StatusReport};

use crate::config::ServerConfig;
use crate::events::{EventBus, ServerEvent};
use crate::registry::{spawn_registry, RegistryHandle};
use crate::server::{AcceptContext, Acceptor, AcceptorHandle, ServerError};
use crate::session::SessionSettings;
use crate::state::ServerState;

/// Owns the server's shared pieces and drives its state machine.
pub struct LifecycleManager {
    config: ServerConfig,
    state: Arc<ServerState>,
    events: EventBus,
    registry: RegistryHandle,
    responder: Arc<dyn Responder>,
    ids: Arc<AtomicU64>,
    tracker: TaskTracker,
    /// Running acceptor; the mutex also serializes start and stop
    acceptor: Mutex<Option<AcceptorHandle>>,
}

impl LifecycleManager {
    /// Creates a stopped server. Must be called inside a tokio runtime.
    pub fn new(config: ServerConfig, responder: Arc<dyn Responder>, events: EventBus) -> Self {
        let registry = spawn_registry(config.max_clients, events.clone());
        let state = Arc::new(ServerState::new(config.port, config.max_clients));

        Self {
            config,
            state,
            events,
            registry,
            responder,
            ids: Arc::new(AtomicU64::new(1)),
            tracker: TaskTracker::new(),
            acceptor: Mutex::new(None),
        }
    }

    /// Validates `port`, binds it and starts accepting.
    ///
    /// Returns the bound address.
    ///
    /// # Errors
    ///
    /// - `LifecycleError::AlreadyRunning` unless the server is stopped
    /// - `LifecycleError::InvalidPort` if `port` is outside `1024..=65535`
    /// - `LifecycleError::Start` if the socket could not be bound
    pub async fn start_server(&self, port: u32) -> Result<SocketAddr, LifecycleError> {
        let mut slot = self.acceptor.lock().await;
        if slot.is_some() || self.state.status() != ServerStatus::Stopped {
            return Err(LifecycleError::AlreadyRunning);
        }

        let port = match validate_port(port) {
            Ok(port) => port,
            Err(e) => {
                warn!(port, error = %e, "Refusing to start");
                self.events.publish(ServerEvent::StartFailed {
                    port,
                    error: e.to_string(),
                });
                return Err(LifecycleError::InvalidPort(e));
            }
        };

        self.state.set_status(ServerStatus::Starting);
        self.state.set_port(port);

        let ctx = self.accept_context();
        match Acceptor::bind(self.config.bind_address, u32::from(port), ctx).await {
            Ok(acceptor) => {
                let addr = acceptor.local_addr();
                self.state.set_status(ServerStatus::Running);
                *slot = Some(acceptor.spawn());

                info!(addr = %addr, max_clients = self.config.max_clients, "Server started");
                self.events.publish(ServerEvent::ServerStarted { port });
                Ok(addr)
            }
            Err(e) => {
                self.state.set_status(ServerStatus::Stopped);
                warn!(addr = %self.config.listen_addr(port), error = %e, "Server failed to start");
                self.events.publish(ServerEvent::StartFailed {
                    port: u32::from(port),
                    error: e.to_string(),
                });
                Err(LifecycleError::Start(e))
            }
        }
    }

    /// Stops accepting, closes every session and waits for the workers.
    ///
    /// Workers still running after the grace period are abandoned.
    ///
    /// # Errors
    ///
    /// `LifecycleError::NotRunning` if there is nothing to stop.
    pub async fn stop_server(&self) -> Result<(), LifecycleError> {
        let mut slot = self.acceptor.lock().await;
        let Some(acceptor) = slot.take() else {
            return Err(LifecycleError::NotRunning);
        };

        self.state.set_status(ServerStatus::Stopping);
        info!("Stopping server");

        acceptor.stop().await;

        let sessions = self.registry.snapshot().await;
        let mut closed = 0usize;
        for session in &sessions {
            if session.close() {
                closed += 1;
            }
        }
        info!(sessions = sessions.len(), closed, "Closed active sessions");

        self.tracker.close();
        if timeout(self.config.shutdown_grace(), self.tracker.wait())
            .await
            .is_err()
        {
            let count = self.tracker.len();
            warn!(count, "Abandoning session workers after grace period");
            self.events
                .publish(ServerEvent::StragglersAbandoned { count });
        }

        self.registry.clear().await;
        self.tracker.reopen();

        self.state.set_status(ServerStatus::Stopped);
        info!("Server stopped");
        self.events.publish(ServerEvent::ServerStopped);
        Ok(())
    }

    pub fn status(&self) -> ServerStatus {
        self.state.status()
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Current status report (`@status`).
    pub fn report(&self) -> StatusReport {
        self.state.report(self.registry.len())
    }

    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }

    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Address the acceptor is bound to, while running.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.acceptor
            .lock()
            .await
            .as_ref()
            .map(AcceptorHandle::local_addr)
    }

    fn accept_context(&self) -> AcceptContext {
        AcceptContext {
            registry: self.registry.clone(),
            events: self.events.clone(),
            responder: Arc::clone(&self.responder),
            state: Arc::clone(&self.state),
            ids: Arc::clone(&self.ids),
            tracker: self.tracker.clone(),
            settings: SessionSettings::from(&self.config),
            write_timeout: self.config.write_timeout(),
            reject_timeout: self.config.reject_timeout(),
        }
    }
}

/// Errors from starting or stopping the server.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Server is already running")]
    AlreadyRunning,

    #[error("Server is not running")]
    NotRunning,

    #[error(transparent)]
    InvalidPort(DomainError),

    #[error(transparent)]
    Start(#[from] ServerError),
}

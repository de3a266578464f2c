//! Shared helpers for the chatbotd integration tests.
//!
//! Tests CAN use `.unwrap()` and `.expect()`; production code behavior is
//! checked through assertions.

#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use chatbot_core::Responder;
use chatbot_protocol::DISCONNECT_SENTINEL;
use chatbotd::{
    CommandError, CommandOutcome, Controller, EventBus, FilePersister, LifecycleManager,
    ServerConfig,
};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};

// ============================================================================
// Constants
// ============================================================================

/// Maximum time to wait for any single line
pub const RECV_TIMEOUT: Duration = Duration::from_secs(3);

/// Maximum time to wait for the registry to reach an expected size
pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(3);

/// Interval between registry polls
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Test Server
// ============================================================================

/// A started server with its controller and an isolated save directory.
pub struct TestServer {
    pub lifecycle: Arc<LifecycleManager>,
    pub controller: Controller,
    pub addr: SocketAddr,
    pub save_dir: TempDir,
}

impl TestServer {
    /// Starts a server with test-friendly defaults.
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    /// Starts a server after letting the caller adjust the configuration.
    pub async fn spawn_with(adjust: impl FnOnce(&mut ServerConfig)) -> Self {
        let save_dir = tempfile::tempdir().expect("create temp dir");

        let mut config = ServerConfig {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            reply_delay_min_ms: 0,
            reply_delay_max_ms: 0,
            idle_timeout_ms: 10_000,
            write_timeout_ms: 1_000,
            reject_timeout_ms: 500,
            shutdown_grace_ms: 2_000,
            save_dir: save_dir.path().to_path_buf(),
            ..ServerConfig::default()
        };
        adjust(&mut config);

        let persister = Arc::new(FilePersister::new(config.save_dir.clone()));
        let responder: Arc<dyn Responder> = Arc::new(|input: &str| format!("echo: {input}"));
        let lifecycle = Arc::new(LifecycleManager::new(config, responder, EventBus::new()));

        let addr = lifecycle
            .start_server(free_port())
            .await
            .expect("start server");
        let controller = Controller::new(Arc::clone(&lifecycle), persister);

        Self {
            lifecycle,
            controller,
            addr,
            save_dir,
        }
    }

    pub fn port(&self) -> u32 {
        u32::from(self.addr.port())
    }

    /// Connects a raw client without reading anything.
    pub async fn connect(&self) -> TestClient {
        TestClient::connect(self.addr).await
    }

    /// Connects and consumes the two welcome lines, returning the session ID.
    pub async fn connect_welcomed(&self) -> (TestClient, u64) {
        let mut client = self.connect().await;
        let id = client.expect_welcome().await;
        (client, id)
    }

    pub async fn execute(&self, input: &str) -> Result<CommandOutcome, CommandError> {
        self.controller.execute(input).await
    }

    /// Waits until the registry holds exactly `n` sessions.
    pub async fn wait_for_clients(&self, n: usize) {
        let registry = self.lifecycle.registry();
        let settled = timeout(SETTLE_TIMEOUT, async {
            while registry.len() != n {
                sleep(POLL_INTERVAL).await;
            }
        })
        .await;
        assert!(
            settled.is_ok(),
            "registry has {} sessions, expected {n}",
            registry.len()
        );
    }

    pub fn journal(&self) -> String {
        self.lifecycle.events().journal().contents()
    }

    pub async fn shutdown(&self) {
        let _ = self.lifecycle.stop_server().await;
    }
}

/// Finds a port that is currently free on loopback.
pub fn free_port() -> u32 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind probe");
    u32::from(listener.local_addr().expect("probe addr").port())
}

// ============================================================================
// Test Client
// ============================================================================

/// Line-oriented test client.
pub struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    pub local_addr: SocketAddr,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect to server");
        let local_addr = stream.local_addr().expect("local addr");
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
            local_addr,
        }
    }

    /// Receives one line without its terminator; `None` at end-of-stream.
    pub async fn recv(&mut self) -> Option<String> {
        let mut line = String::new();
        let n = timeout(RECV_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for a line")
            .unwrap_or(0);
        if n == 0 {
            None
        } else {
            Some(line.trim_end_matches(['\r', '\n']).to_string())
        }
    }

    /// Receives one line, failing the test at end-of-stream.
    pub async fn recv_line(&mut self) -> String {
        self.recv().await.expect("unexpected end of stream")
    }

    pub async fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Reads the two welcome lines and returns the announced session ID.
    pub async fn expect_welcome(&mut self) -> u64 {
        let greeting = self.recv_line().await;
        let hint = self.recv_line().await;
        assert!(hint.contains("goodbye"), "unexpected hint: {hint}");

        let id = greeting
            .rsplit('#')
            .next()
            .and_then(|s| s.trim().parse().ok());
        id.unwrap_or_else(|| panic!("no session id in greeting: {greeting}"))
    }

    /// Asserts the server sends the sentinel and then closes the stream.
    pub async fn expect_disconnect(&mut self) {
        assert_eq!(self.recv().await.as_deref(), Some(DISCONNECT_SENTINEL));
        assert_eq!(self.recv().await, None);
    }
}

//! Line-oriented connection to the chat server.
//!
//! This module provides:
//! - [`ChatClient`]: one TCP connection that sends lines and classifies
//!   what the server sends back
//! - [`run_chat`]: the interactive loop used by the `chatbot` binary
//!
//! The server may end the conversation at any time. Receiving
//! `__DISCONNECTED__`, end-of-stream or a read error all mean the same thing:
//! the conversation is over.
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use std::time::Duration;

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines,
};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chatbot_protocol::ServerLine;

use crate::error::{ClientError, Result};

/// Printed once the server ends the conversation.
pub const DISCONNECTED_MESSAGE: &str = "Disconnected from server.";

// ============================================================================
// Configuration
// ============================================================================

/// Where and how to connect.
///
/// # Example
///
/// ```rust
/// use chatbot_client::ClientConfig;
///
/// let config = ClientConfig {
///     port: 6000,
///     ..Default::default()
/// };
/// assert_eq!(config.addr(), "localhost:6000");
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5555,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    /// `host:port` as passed to the resolver.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ============================================================================
// Chat Client
// ============================================================================

/// One connection to the chat server.
pub struct ChatClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
    closed: bool,
}

impl ChatClient {
    /// Connects to the server.
    ///
    /// # Errors
    ///
    /// - `ClientError::Connect` if the server refused or could not be resolved
    /// - `ClientError::ConnectTimeout` if the attempt exceeded the timeout
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let addr = config.addr();
        debug!(addr = %addr, "Connecting to server");

        let stream = match timeout(config.connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(ClientError::Connect {
                    addr,
                    error: e.to_string(),
                })
            }
            Err(_) => return Err(ClientError::ConnectTimeout { addr }),
        };

        info!(addr = %addr, "Connected to server");
        Ok(Self::from_stream(stream))
    }

    /// Wraps an already connected stream.
    pub fn from_stream(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
            closed: false,
        }
    }

    /// True once the server has ended the conversation.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Sends one line.
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        if self.closed {
            return Err(ClientError::Closed);
        }
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Receives the next server line.
    ///
    /// End-of-stream is reported as [`ServerLine::Disconnect`], exactly like
    /// the sentinel. Cancel safe.
    pub async fn recv(&mut self) -> Result<ServerLine> {
        if self.closed {
            return Ok(ServerLine::Disconnect);
        }

        let line = match self.lines.next_line().await {
            Ok(Some(raw)) => ServerLine::classify(&raw),
            Ok(None) => ServerLine::Disconnect,
            Err(e) => {
                self.closed = true;
                return Err(e.into());
            }
        };

        if line == ServerLine::Disconnect {
            debug!("Server ended the conversation");
            self.closed = true;
        }
        Ok(line)
    }

    /// Stops sending; the server sees end-of-stream and closes its side.
    pub async fn finish(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

// ============================================================================
// Interactive Loop
// ============================================================================

/// Relays `input` lines to the server and server lines to `output`.
///
/// Returns after the server disconnects (having written
/// [`DISCONNECTED_MESSAGE`]) or when `cancel` fires. End of `input` half-closes
/// the connection and keeps reading until the server hangs up.
pub async fn run_chat<I, O>(
    mut client: ChatClient,
    input: I,
    mut output: O,
    cancel: CancellationToken,
) -> Result<()>
where
    I: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let mut input = input.lines();
    let mut input_open = true;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Chat cancelled");
                let _ = client.finish().await;
                return Ok(());
            }

            received = client.recv() => {
                match received {
                    Ok(ServerLine::Text(text)) => write_line(&mut output, &text).await?,
                    Ok(ServerLine::Disconnect) => {
                        write_line(&mut output, DISCONNECTED_MESSAGE).await?;
                        return Ok(());
                    }
                    Err(e) => {
                        warn!(error = %e, "Connection lost");
                        write_line(&mut output, DISCONNECTED_MESSAGE).await?;
                        return Ok(());
                    }
                }
            }

            typed = input.next_line(), if input_open => {
                match typed? {
                    Some(line) => {
                        if let Err(e) = client.send_line(&line).await {
                            debug!(error = %e, "Send failed, waiting for server to close");
                        }
                    }
                    None => {
                        debug!("Input closed");
                        input_open = false;
                        if let Err(e) = client.finish().await {
                            debug!(error = %e, "Failed to half-close connection");
                        }
                    }
                }
            }
        }
    }
}

async fn write_line<O>(output: &mut O, line: &str) -> Result<()>
where
    O: AsyncWrite + Unpin,
{
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}

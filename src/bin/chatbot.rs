//! chatbot - terminal client for the chatbot server
//!
//! Relays stdin to the server and the server's replies to stdout until the
//! server disconnects.
//!
//! # Usage
//!
//! ```text
//! chatbot                       # localhost:5555
//! chatbot --host 10.0.0.5 -p 6000
//! RUST_LOG=chatbot_client=debug chatbot   # diagnostics on stderr
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use chatbot_client::{run_chat, ChatClient, ClientConfig};

/// Bound on runtime shutdown; a pending stdin read can never finish on its own.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(100);

/// chatbot - talk to a chatbot server
#[derive(Parser, Debug)]
#[command(name = "chatbot", version, about)]
struct Args {
    /// Server host name or address
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Server port
    #[arg(short, long, env = "CHATBOT_PORT", default_value_t = 5555)]
    port: u16,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Silent unless RUST_LOG is set; stdout carries only the conversation
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let result = runtime.block_on(run(args));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    result
}

async fn run(args: Args) -> Result<()> {
    let config = ClientConfig {
        host: args.host,
        port: args.port,
        ..Default::default()
    };

    let client = ChatClient::connect(&config)
        .await
        .with_context(|| format!("Could not connect to {}", config.addr()))?;

    let cancel_token = CancellationToken::new();
    let interrupt_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt_token.cancel();
        }
    });

    run_chat(
        client,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        cancel_token,
    )
    .await
    .context("Chat session failed")?;

    Ok(())
}

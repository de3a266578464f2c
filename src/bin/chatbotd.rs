//! chatbot daemon - TCP chat bot server with an operator console
//!
//! Starts the server and then reads administrative `@` commands from stdin,
//! printing each result. The server log (every connect, message, broadcast
//! and error) is echoed to stdout as it happens.
//!
//! # Usage
//!
//! ```bash
//! # Start on the default port (5555)
//! chatbotd
//!
//! # Custom port and capacity
//! chatbotd --port 6000 --max-clients 20
//!
//! # Port from the environment, settings from a file
//! CHATBOT_PORT=6000 chatbotd --config ./chatbot.toml
//!
//! # Enable debug logging (stderr)
//! RUST_LOG=chatbotd=debug chatbotd
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: stop the server and exit
//! - `@shutdown`: same as a signal
//! - stdin EOF: keep serving until a signal arrives

use std::net::IpAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use chatbot_core::KeywordResponder;
use chatbotd::{CommandOutcome, Controller, EventBus, FilePersister, LifecycleManager, ServerConfig};

/// Bound on runtime shutdown; a pending stdin read can never finish on its own.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(200);

/// chatbot daemon - line-oriented TCP chat bot server
#[derive(Parser, Debug)]
#[command(name = "chatbotd", version, about)]
struct Args {
    /// TOML configuration file (default: ~/.config/chatbot/config.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (1024-65535)
    #[arg(short, long, env = "CHATBOT_PORT")]
    port: Option<u32>,

    /// Interface to bind
    #[arg(long)]
    bind: Option<IpAddr>,

    /// Maximum number of concurrent clients
    #[arg(long)]
    max_clients: Option<usize>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let result = runtime.block_on(run_daemon(args));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    result
}

/// Loads configuration with CLI/env overrides applied.
fn load_config(args: &Args) -> Result<(ServerConfig, u32)> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ServerConfig::load_default().context("Failed to load default config")?,
    };

    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    if let Some(max_clients) = args.max_clients {
        config.max_clients = max_clients;
    }
    config.validate().context("Invalid configuration")?;

    let port = args.port.unwrap_or(u32::from(config.port));
    Ok((config, port))
}

async fn run_daemon(args: Args) -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("chatbotd=info".parse()?)
                .add_directive("chatbot_core=info".parse()?)
                .add_directive("chatbot_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "chatbot daemon starting"
    );

    let (config, port) = load_config(&args)?;
    let save_dir = config.save_dir.clone();

    let events = EventBus::new();
    spawn_log_printer(events.subscribe());

    let lifecycle = Arc::new(LifecycleManager::new(
        config,
        Arc::new(KeywordResponder),
        events,
    ));
    let addr = lifecycle
        .start_server(port)
        .await
        .with_context(|| format!("Failed to start server on port {port}"))?;
    println!("Server listening on {addr}. Type @help for commands.");

    let controller = Controller::new(
        Arc::clone(&lifecycle),
        Arc::new(FilePersister::new(save_dir)),
    );

    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    run_console(&controller, &cancel_token).await;

    if lifecycle.is_running() {
        if let Err(e) = lifecycle.stop_server().await {
            warn!(error = %e, "Stop failed");
        }
    }

    info!("chatbot daemon stopped");
    Ok(())
}

/// Executes stdin commands until `@shutdown` or cancellation.
async fn run_console(controller: &Controller, cancel_token: &CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,

            line = lines.next_line(), if stdin_open => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        info!("Console input closed; serving until signalled");
                        stdin_open = false;
                        continue;
                    }
                    Err(e) => {
                        warn!(error = %e, "Console read failed");
                        stdin_open = false;
                        continue;
                    }
                };

                if line.trim().is_empty() {
                    continue;
                }

                match controller.execute(&line).await {
                    Ok(CommandOutcome::Shutdown) => {
                        println!("{}", CommandOutcome::Shutdown);
                        break;
                    }
                    Ok(outcome) => println!("{outcome}"),
                    Err(e) => println!("{e}"),
                }
            }
        }
    }
}

/// Prints every server event to stdout as it is published.
fn spawn_log_printer(mut events: broadcast::Receiver<chatbotd::ServerEvent>) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let now = chrono::Local::now().format("%Y/%m/%d %H:%M:%S");
                    println!("[{now}] {event}");
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "Log printer lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}

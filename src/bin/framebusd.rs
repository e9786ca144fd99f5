//! framebus hub daemon - shared switchboard for frames in separate processes
//!
//! Frames connect over a Unix socket; the hub assigns frame ids, arbitrates
//! session ownership and relays packets between them.
//!
//! # Usage
//!
//! ```bash
//! # Start the hub (foreground)
//! framebusd start
//!
//! # Custom socket and limits
//! framebusd --socket /run/user/1000/framebus.sock --config hub.toml start
//!
//! # Check whether a hub answers on the socket
//! framebusd status
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use framebus_connector::{FrameId, SOCKET_ENV_VAR};
use framebus_hub::registry::{spawn_switchboard, SwitchboardEvent, SwitchboardHandle};
use framebus_hub::server::HubServer;
use framebus_hub::HubConfig;
use framebus_protocol::{encode_line, parse_hub_message, FrameMessage, HubMessage};

/// How long `status` waits for the hub to answer
const STATUS_TIMEOUT: Duration = Duration::from_secs(2);

/// framebus hub - session-scoped messaging between frames
#[derive(Parser, Debug)]
#[command(name = "framebusd", version, about)]
struct Args {
    /// Socket path (overrides config file and FRAMEBUS_SOCKET)
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    /// TOML file with hub settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the hub in the foreground
    Start,
    /// Check whether a hub is answering on the socket
    Status,
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("framebus").join("hub.toml"))
}

/// Builds the hub configuration: file, then environment, then flags.
fn load_config(args: &Args) -> Result<HubConfig> {
    let mut config = match &args.config {
        Some(path) => HubConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => match default_config_path().filter(|p| p.exists()) {
            Some(path) => HubConfig::load(&path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => HubConfig::default(),
        },
    };

    if let Ok(path) = env::var(SOCKET_ENV_VAR) {
        config.socket_path = PathBuf::from(path);
    }
    if let Some(path) = &args.socket {
        config.socket_path = path.clone();
    }
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    match args.command.unwrap_or(Command::Start) {
        Command::Start => run_hub(config),
        Command::Status => {
            let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
            match runtime.block_on(probe_hub(&config.socket_path)) {
                Ok(frame_id) => {
                    println!("Hub is running");
                    println!("Socket: {}", config.socket_path.display());
                    println!("Probe frame: {frame_id}");
                    Ok(())
                }
                Err(e) => {
                    println!("Hub is not running: {e:#}");
                    process::exit(1);
                }
            }
        }
    }
}

#[tokio::main]
async fn run_hub(config: HubConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("framebusd=info".parse()?)
                .add_directive("framebus_hub=info".parse()?)
                .add_directive("framebus_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "framebus hub starting"
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

    let switchboard = spawn_switchboard(config.switchboard);
    info!(
        max_frames = config.switchboard.max_frames,
        max_sessions = config.switchboard.max_sessions,
        "Switchboard started"
    );
    tokio::spawn(log_events(switchboard.clone(), cancel_token.clone()));

    let server = HubServer::new(config, switchboard, cancel_token);

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("framebus hub stopped");
    Ok(())
}

/// Mirrors switchboard events into the log until shutdown.
async fn log_events(switchboard: SwitchboardHandle, cancel_token: CancellationToken) {
    let mut events = switchboard.subscribe();

    loop {
        let event = tokio::select! {
            _ = cancel_token.cancelled() => break,
            event = events.recv() => event,
        };

        match event {
            Ok(SwitchboardEvent::SessionClaimed { session_id, owner }) => {
                info!(session_id = %session_id, owner = %owner, "Session claimed");
            }
            Ok(SwitchboardEvent::SessionJoined {
                session_id,
                frame_id,
                display_name,
            }) => {
                info!(
                    session_id = %session_id,
                    frame_id = %frame_id,
                    display_name = %display_name,
                    "Session joined"
                );
            }
            Ok(other) => debug!(event = ?other, "Switchboard event"),
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event log lagging");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Performs a handshake and a ping against the hub, then disconnects.
async fn probe_hub(socket_path: &Path) -> Result<FrameId> {
    let stream = UnixStream::connect(socket_path)
        .await
        .with_context(|| format!("cannot connect to {}", socket_path.display()))?;
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    writer
        .write_all(encode_line(&FrameMessage::connect(Some("framebusd status".into())))?.as_bytes())
        .await?;
    let reply = timeout(STATUS_TIMEOUT, lines.next_line())
        .await
        .context("hub did not answer")??
        .context("hub closed the connection")?;

    let frame_id = match parse_hub_message(&reply)? {
        HubMessage::Connected { frame_id, .. } => frame_id,
        HubMessage::Rejected { reason, .. } => bail!("hub rejected probe: {reason}"),
        other => bail!("unexpected reply: {other:?}"),
    };

    writer.write_all(encode_line(&FrameMessage::ping(1))?.as_bytes()).await?;
    let pong = timeout(STATUS_TIMEOUT, lines.next_line())
        .await
        .context("hub did not answer ping")??
        .context("hub closed the connection")?;
    if !matches!(parse_hub_message(&pong)?, HubMessage::Pong { seq: 1 }) {
        bail!("unexpected reply to ping");
    }

    writer.write_all(encode_line(&FrameMessage::disconnect())?.as_bytes()).await?;
    Ok(frame_id)
}

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

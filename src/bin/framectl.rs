//! framectl - a command-line frame for a running framebus hub
//!
//! Useful for poking at sessions from a shell while real frames are
//! connected.
//!
//! # Usage
//!
//! ```bash
//! framectl create 1                       # claim session 1 and hold it
//! framectl join 1 --name Diagram          # join session 1 and stay joined
//! framectl listen 1 --topic select        # print packets as JSON lines
//! framectl send 1 --topic select '{"node": 7}'
//! framectl describe 1
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use framebus_connector::{
    SessionId, SocketProvider, SocketProviderConfig, TopicReceiver, WindowConnector,
};

/// framectl - command-line frame for framebus
#[derive(Parser, Debug)]
#[command(name = "framectl", version, about)]
struct Args {
    /// Hub socket path (defaults to FRAMEBUS_SOCKET, then /tmp/framebus.sock)
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Claim ownership of a session and hold it until interrupted
    Create {
        session: String,
        /// Print packets on these topics while holding the session
        #[arg(long = "topic")]
        topics: Vec<String>,
    },
    /// Join an owned session and stay joined until interrupted
    Join {
        session: String,
        #[arg(long, default_value = "framectl")]
        name: String,
    },
    /// Join a session and print every packet on a topic as a JSON line
    Listen {
        session: String,
        #[arg(long)]
        topic: String,
        #[arg(long, default_value = "framectl")]
        name: String,
    },
    /// Claim or join a session, then broadcast one JSON payload
    Send {
        session: String,
        #[arg(long)]
        topic: String,
        /// Payload as JSON; bare words are sent as strings
        data: String,
        #[arg(long, default_value = "framectl")]
        name: String,
    },
    /// Show the owner and members of a session
    Describe { session: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("framectl=warn".parse()?)
                .add_directive("framebus_connector=warn".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut config = SocketProviderConfig::from_env();
    if let Some(path) = args.socket {
        config.socket_path = path;
    }
    config.display_name = Some("framectl".into());
    let provider = SocketProvider::new(config);

    let connector = WindowConnector::connect(&provider)
        .await
        .context("Failed to connect to hub (is framebusd running?)")?;
    info!(frame_id = %connector.frame_id(), "Connected");

    let result = run(&connector, args.command).await;
    connector.close();
    result
}

async fn run(connector: &WindowConnector, command: Command) -> Result<()> {
    match command {
        Command::Create { session, topics } => {
            let session = SessionId::from(session);
            if !connector.create_session(session.clone()).await? {
                bail!("Session {session} is already owned by another frame");
            }
            println!("Created session {session} as {}", connector.frame_id());

            let receivers: Vec<_> = topics.into_iter().map(|t| connector.receiver(t)).collect();
            for receiver in receivers {
                tokio::spawn(print_packets(receiver));
            }

            tokio::signal::ctrl_c().await.context("Failed to wait for Ctrl+C")?;
            Ok(())
        }

        Command::Join { session, name } => {
            let session = SessionId::from(session);
            if !connector.join_session(session.clone(), name).await? {
                bail!("Session {session} has no owner yet");
            }
            println!("Joined session {session} as {}", connector.frame_id());

            // A closed connection leaves a member nothing can reach.
            tokio::signal::ctrl_c().await.context("Failed to wait for Ctrl+C")?;
            Ok(())
        }

        Command::Listen { session, topic, name } => {
            let session = SessionId::from(session);
            // Subscribe first so nothing arriving right after the join is missed
            let receiver = connector.receiver(topic);
            if !connector.join_session(session.clone(), name).await? {
                bail!("Session {session} has no owner yet");
            }

            tokio::select! {
                _ = print_packets(receiver) => {}
                _ = tokio::signal::ctrl_c() => {}
            }
            Ok(())
        }

        Command::Send {
            session,
            topic,
            data,
            name,
        } => {
            let session = SessionId::from(session);
            let payload = parse_payload(&data);

            if !connector.create_session(session.clone()).await?
                && !connector.join_session(session.clone(), name).await?
            {
                bail!("Could not claim or join session {session}");
            }

            connector.broadcast(&topic, &payload)?;
            // Requests share the connection with sends, so a reply proves the
            // broadcast reached the hub
            connector.describe_session(session).await?;
            debug!(topic = %topic, "Broadcast flushed");
            Ok(())
        }

        Command::Describe { session } => {
            match connector.describe_session(session.as_str()).await? {
                Some(info) => println!("{}", serde_json::to_string_pretty(&info)?),
                None => bail!("Session {session} does not exist"),
            }
            Ok(())
        }
    }
}

/// Parses `data` as JSON, falling back to a plain string.
fn parse_payload(data: &str) -> Value {
    serde_json::from_str(data).unwrap_or_else(|_| Value::String(data.to_string()))
}

async fn print_packets(mut receiver: TopicReceiver) {
    while let Some(packet) = receiver.recv().await {
        match serde_json::to_string(&packet) {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("Failed to encode packet: {e}"),
        }
    }
}

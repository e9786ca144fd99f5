//! framebus Hub - Frame/session switchboard and socket server
//!
//! This crate owns the state a connection provider shares between frames:
//! - `registry` - Switchboard actor: frame registry, session registry, packet delivery
//! - `server` - Unix socket server exposing a switchboard to frames in other processes
//! - `config` - Hub and switchboard limits, loadable from TOML
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      framebus hub                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │   HubServer     │────▶│     SwitchboardActor        │   │
//! │  │ (Unix Socket)   │     │ (frames + sessions owner)   │   │
//! │  └────────┬────────┘     └──────────────┬──────────────┘   │
//! │           │                             │                   │
//! │           │ connections                 │ per-frame inbound │
//! │           ▼                             ▼                   │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │ConnectionHandler│◀────│  mpsc::UnboundedSender      │   │
//! │  │  (per frame)    │     │  (one per registered frame) │   │
//! │  └─────────────────┘     └─────────────────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The in-memory provider in `framebus-connector` drives the same
//! switchboard directly, without the socket layer.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod config;
pub mod registry;
pub mod server;

pub use config::{ConfigError, HubConfig, SwitchboardConfig};

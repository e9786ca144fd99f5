//! Switchboard using the Actor pattern.
//!
//! The switchboard is the shared state behind a connection provider: the
//! frame registry, the session registry, and packet delivery. It receives
//! commands via an unbounded tokio mpsc channel so that packet sends never
//! wait on the actor.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │ Frames / Hub    │────▶│ SwitchboardActor│────▶│ Frame inbound    │
//! └─────────────────┘     └─────────────────┘     └──────────────────┘
//!         │                       │                       │
//!         │ SwitchboardCommand    │ owns                  │ Packet
//!         │ (mpsc channel)        │                       │ (mpsc per frame)
//!         ▼                       ▼                       ▼
//!    Register/Claim/        BTreeMap<FrameId, _>    Connector dispatch
//!    Join/Deliver           SessionTable            or socket writer
//! ```

use tokio::sync::{broadcast, mpsc};

mod actor;
mod commands;
mod handle;
mod sessions;

pub use actor::SwitchboardActor;
pub use commands::{SwitchboardCommand, SwitchboardError, SwitchboardEvent};
pub use handle::SwitchboardHandle;
pub use sessions::{ClaimOutcome, JoinOutcome, SessionTable};

use crate::config::SwitchboardConfig;

/// Event channel buffer size
const EVENT_BUFFER: usize = 100;

/// Spawn a switchboard actor on the current tokio runtime and return a handle.
///
/// The actor stops once every clone of the handle has been dropped.
///
/// # Example
///
/// ```no_run
/// use framebus_hub::registry::spawn_switchboard;
/// use framebus_hub::SwitchboardConfig;
///
/// #[tokio::main]
/// async fn main() {
///     let handle = spawn_switchboard(SwitchboardConfig::default());
///     let sessions = handle.list_sessions().await;
/// }
/// ```
pub fn spawn_switchboard(config: SwitchboardConfig) -> SwitchboardHandle {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

    let actor = SwitchboardActor::new(cmd_rx, event_tx.clone(), config);
    tokio::spawn(actor.run());

    SwitchboardHandle::new(cmd_tx, event_tx)
}

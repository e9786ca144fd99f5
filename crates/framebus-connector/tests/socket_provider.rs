//! Connector behavior against a live hub over the Unix socket provider.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::path::PathBuf;
use std::time::Duration;

use framebus_connector::{
    ConnectorError, Packet, SessionState, SocketProvider, SocketProviderConfig, TopicReceiver,
    TransportError, WindowConnector,
};
use framebus_hub::registry::{spawn_switchboard, SwitchboardHandle};
use framebus_hub::server::HubServer;
use framebus_hub::{HubConfig, SwitchboardConfig};
use serde_json::json;
use tempfile::TempDir;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Constants
// ============================================================================

/// Maximum time to wait for the hub socket to appear
const SOCKET_WAIT_TIMEOUT: Duration = Duration::from_millis(500);

const SOCKET_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long to wait before concluding a packet will not arrive
const SILENCE: Duration = Duration::from_millis(150);

/// Upper bound for a packet that should arrive
const DELIVERY: Duration = Duration::from_secs(2);

// ============================================================================
// Test Helpers
// ============================================================================

/// Hub running on a socket in a temporary directory.
struct TestHub {
    socket_path: PathBuf,
    switchboard: SwitchboardHandle,
    cancel_token: CancellationToken,
    _temp_dir: TempDir,
}

impl TestHub {
    async fn spawn() -> Self {
        Self::spawn_with(SwitchboardConfig::default()).await
    }

    async fn spawn_with(limits: SwitchboardConfig) -> Self {
        let temp_dir = tempfile::tempdir().expect("create temp dir");
        let socket_path = temp_dir.path().join("hub.sock");

        let switchboard = spawn_switchboard(limits);
        let cancel_token = CancellationToken::new();
        let config = HubConfig {
            socket_path: socket_path.clone(),
            switchboard: limits,
            ..HubConfig::default()
        };
        let server = HubServer::new(config, switchboard.clone(), cancel_token.clone());

        tokio::spawn(async move {
            let _ = server.run().await;
        });

        let start = tokio::time::Instant::now();
        while start.elapsed() < SOCKET_WAIT_TIMEOUT && !socket_path.exists() {
            sleep(SOCKET_POLL_INTERVAL).await;
        }
        assert!(
            socket_path.exists(),
            "Hub socket did not appear within {SOCKET_WAIT_TIMEOUT:?}"
        );

        Self {
            socket_path,
            switchboard,
            cancel_token,
            _temp_dir: temp_dir,
        }
    }

    fn provider(&self) -> SocketProvider {
        SocketProvider::new(SocketProviderConfig {
            socket_path: self.socket_path.clone(),
            display_name: None,
        })
    }

    async fn connectors(&self, n: usize) -> Vec<WindowConnector> {
        let provider = self.provider();
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(WindowConnector::connect(&provider).await.unwrap());
        }
        out
    }

    /// Polls until the switchboard holds `expected` frames.
    async fn wait_for_frames(&self, expected: usize) {
        let start = tokio::time::Instant::now();
        while start.elapsed() < DELIVERY {
            if self.switchboard.frame_count().await == expected {
                return;
            }
            sleep(SOCKET_POLL_INTERVAL).await;
        }
        panic!("switchboard never reached {expected} frames");
    }
}

impl Drop for TestHub {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn expect_packet(rx: &mut TopicReceiver) -> Packet {
    timeout(DELIVERY, rx.recv())
        .await
        .expect("packet within deadline")
        .expect("receiver still open")
}

async fn expect_silence(rx: &mut TopicReceiver) {
    assert!(
        timeout(SILENCE, rx.recv()).await.is_err(),
        "unexpected packet on {}",
        rx.topic()
    );
}

// ============================================================================
// Core Scenarios
// ============================================================================

#[tokio::test]
async fn test_broadcast_reaches_joined_members_only() {
    let hub = TestHub::spawn().await;
    let [a, b, c] = <[_; 3]>::try_from(hub.connectors(3).await).unwrap();

    assert!(a.create_session(1u32).await.unwrap());
    assert!(b.join_session(1u32, "Diagram").await.unwrap());
    assert!(c.join_session(1u32, "Diagram").await.unwrap());

    let mut rx_a = a.receiver("test");
    let mut rx_b = b.receiver("test");
    let mut rx_c = c.receiver("test");

    a.broadcast("test", "bar").unwrap();

    assert_eq!(expect_packet(&mut rx_b).await.data, json!("bar"));
    assert_eq!(expect_packet(&mut rx_c).await.data, json!("bar"));
    expect_silence(&mut rx_a).await;
    expect_silence(&mut rx_b).await;
    expect_silence(&mut rx_c).await;
}

#[tokio::test]
async fn test_unicast_reaches_destination_only() {
    let hub = TestHub::spawn().await;
    let [a, b, c] = <[_; 3]>::try_from(hub.connectors(3).await).unwrap();

    assert!(a.create_session(1u32).await.unwrap());
    assert!(!b.create_session(1u32).await.unwrap());
    assert!(!c.create_session(1u32).await.unwrap());

    let mut rx_a = a.receiver("test");
    let mut rx_b = b.receiver("test");
    let mut rx_c = c.receiver("test");

    a.unicast("test", "bar", b.frame_id()).unwrap();

    assert_eq!(expect_packet(&mut rx_b).await.data, json!("bar"));
    expect_silence(&mut rx_a).await;
    expect_silence(&mut rx_c).await;
}

#[tokio::test]
async fn test_failed_create_is_not_membership() {
    let hub = TestHub::spawn().await;
    let [a, b] = <[_; 2]>::try_from(hub.connectors(2).await).unwrap();

    assert!(a.create_session(1u32).await.unwrap());
    assert!(!b.create_session(1u32).await.unwrap());

    let mut rx_b = b.receiver("test");
    a.broadcast("test", "bar").unwrap();
    expect_silence(&mut rx_b).await;
}

// ============================================================================
// Hub Behavior
// ============================================================================

#[tokio::test]
async fn test_describe_over_socket() {
    let hub = TestHub::spawn().await;
    let [a, b] = <[_; 2]>::try_from(hub.connectors(2).await).unwrap();

    assert!(a.describe_session("graph").await.unwrap().is_none());
    assert!(!b.join_session("graph", "Diagram").await.unwrap());
    assert!(a.create_session("graph").await.unwrap());
    assert!(b.join_session("graph", "Diagram").await.unwrap());
    assert_eq!(b.session_state(), SessionState::Member("graph".into()));

    let info = b.describe_session("graph").await.unwrap().expect("session exists");
    assert_eq!(info.owner, a.frame_id());
    assert_eq!(info.members.len(), 2);
    assert_eq!(info.display_names().collect::<Vec<_>>(), vec!["Diagram"]);
}

#[tokio::test]
async fn test_ordered_delivery_over_socket() {
    let hub = TestHub::spawn().await;
    let [a, b] = <[_; 2]>::try_from(hub.connectors(2).await).unwrap();

    assert!(a.create_session(1u32).await.unwrap());
    assert!(b.join_session(1u32, "Diagram").await.unwrap());

    let mut rx = b.receiver("tick");
    for i in 0..100 {
        a.broadcast("tick", &i).unwrap();
    }
    for i in 0..100 {
        assert_eq!(expect_packet(&mut rx).await.data, json!(i));
    }
}

#[tokio::test]
async fn test_oversized_broadcast_keeps_sender_connected() {
    let hub = TestHub::spawn().await;
    let [a, b] = <[_; 2]>::try_from(hub.connectors(2).await).unwrap();

    assert!(a.create_session(1u32).await.unwrap());
    assert!(b.join_session(1u32, "Diagram").await.unwrap());
    let mut rx_b = b.receiver("test");

    a.broadcast("test", &"x".repeat(2 * 1024 * 1024)).unwrap();
    a.broadcast("test", "small").unwrap();

    assert_eq!(expect_packet(&mut rx_b).await.data, json!("small"));
    expect_silence(&mut rx_b).await;

    // The connection still answers requests.
    assert!(a.create_session(2u32).await.unwrap());
    assert_eq!(hub.switchboard.frame_count().await, 2);
}

#[tokio::test]
async fn test_closed_connector_unregisters() {
    let hub = TestHub::spawn().await;
    let [a, b] = <[_; 2]>::try_from(hub.connectors(2).await).unwrap();
    hub.wait_for_frames(2).await;

    let b_id = b.frame_id();
    b.close();
    hub.wait_for_frames(1).await;

    a.unicast("test", "bar", b_id).unwrap();
    assert!(a.describe_session("none").await.unwrap().is_none());
}

#[tokio::test]
async fn test_frame_limit_rejects_connect() {
    let hub = TestHub::spawn_with(SwitchboardConfig {
        max_frames: 1,
        ..SwitchboardConfig::default()
    })
    .await;
    let provider = hub.provider();

    let _first = WindowConnector::connect(&provider).await.unwrap();
    let err = WindowConnector::connect(&provider).await.unwrap_err();
    assert!(matches!(
        err,
        ConnectorError::Transport(TransportError::Rejected(_))
    ));
}

#[tokio::test]
async fn test_hub_shutdown_fails_pending_requests() {
    let hub = TestHub::spawn().await;
    let [a] = <[_; 1]>::try_from(hub.connectors(1).await).unwrap();

    hub.cancel_token.cancel();
    sleep(SILENCE).await;

    let err = a.create_session(1u32).await.unwrap_err();
    assert!(matches!(
        err,
        ConnectorError::Transport(TransportError::Disconnected)
    ));
}

//! Integration tests for the switchboard actor.
//!
//! These tests drive `spawn_switchboard()` through its handle the way the
//! in-memory provider and the hub server do.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::collections::HashSet;
use std::time::Duration;

use framebus_core::{FrameId, Packet, Route, SessionId, SessionRole};
use framebus_hub::registry::{spawn_switchboard, SwitchboardError, SwitchboardEvent};
use framebus_hub::SwitchboardConfig;
use serde_json::json;
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_millis(200);

// ============================================================================
// Frame Registry
// ============================================================================

#[tokio::test]
async fn test_frame_ids_are_unique() {
    let handle = spawn_switchboard(SwitchboardConfig::default());

    let mut seen = HashSet::new();
    for _ in 0..20 {
        let (frame_id, _inbound) = handle.register_frame().await.expect("should register");
        assert!(seen.insert(frame_id), "frame id {frame_id} was reused");
    }
    assert_eq!(handle.frame_count().await, 20);
}

#[tokio::test]
async fn test_frame_capacity_is_enforced() {
    let handle = spawn_switchboard(SwitchboardConfig {
        max_frames: 2,
        max_sessions: 4,
    });

    let (first, _rx1) = handle.register_frame().await.unwrap();
    let _second = handle.register_frame().await.unwrap();

    let result = handle.register_frame().await;
    assert!(matches!(result, Err(SwitchboardError::TooManyFrames { max: 2 })));

    // Freeing a slot allows a new registration with a fresh id
    handle.unregister_frame(first);
    let (third, _rx3) = handle.register_frame().await.unwrap();
    assert_eq!(third, FrameId::new(3));
}

// ============================================================================
// Session Registry
// ============================================================================

#[tokio::test]
async fn test_concurrent_claims_have_single_winner() {
    let handle = spawn_switchboard(SwitchboardConfig::default());

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let handle = handle.clone();
        tasks.push(tokio::spawn(async move {
            let (frame_id, _inbound) = handle.register_frame().await.unwrap();
            handle
                .claim_session(frame_id, SessionId::from(1u32))
                .await
                .unwrap()
        }));
    }

    let mut winners = 0;
    for task in tasks {
        if task.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);

    let info = handle.describe_session(SessionId::from(1u32)).await.unwrap();
    assert_eq!(info.members.len(), 1, "losing claimers must not become members");
}

#[tokio::test]
async fn test_join_before_create_fails_then_succeeds() {
    let handle = spawn_switchboard(SwitchboardConfig::default());
    let (owner, _rx_owner) = handle.register_frame().await.unwrap();
    let (viewer, _rx_viewer) = handle.register_frame().await.unwrap();
    let session = SessionId::from("inspection-7");

    assert!(!handle.join_session(viewer, session.clone(), "Diagram").await.unwrap());
    assert!(handle.describe_session(session.clone()).await.is_none());

    assert!(handle.claim_session(owner, session.clone()).await.unwrap());
    assert!(handle.join_session(viewer, session.clone(), "Diagram").await.unwrap());

    let info = handle.describe_session(session).await.unwrap();
    assert_eq!(info.owner, owner);
    assert_eq!(info.members.len(), 2);
    assert_eq!(info.members[1].role, SessionRole::Member);
    assert_eq!(info.members[1].display_name.as_deref(), Some("Diagram"));
}

#[tokio::test]
async fn test_list_sessions() {
    let handle = spawn_switchboard(SwitchboardConfig::default());
    let (frame_id, _rx) = handle.register_frame().await.unwrap();

    for id in ["b", "a", "c"] {
        assert!(handle.claim_session(frame_id, SessionId::from(id)).await.unwrap());
    }

    let ids: Vec<String> = handle
        .list_sessions()
        .await
        .into_iter()
        .map(|s| s.session_id.to_string())
        .collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

// ============================================================================
// Delivery
// ============================================================================

#[tokio::test]
async fn test_broadcast_reaches_everyone_but_sender() {
    let handle = spawn_switchboard(SwitchboardConfig::default());
    let (a, mut rx_a) = handle.register_frame().await.unwrap();
    let (_b, mut rx_b) = handle.register_frame().await.unwrap();
    let (_c, mut rx_c) = handle.register_frame().await.unwrap();

    handle.deliver(
        Route::Broadcast,
        Packet::broadcast("test", json!("bar"), a, SessionId::from(1u32)),
    );

    for rx in [&mut rx_b, &mut rx_c] {
        let packet = timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(packet.data, json!("bar"));
    }
    assert!(timeout(RECV_TIMEOUT, rx_a.recv()).await.is_err());
}

#[tokio::test]
async fn test_per_sender_order_is_preserved() {
    let handle = spawn_switchboard(SwitchboardConfig::default());
    let (a, _rx_a) = handle.register_frame().await.unwrap();
    let (b, mut rx_b) = handle.register_frame().await.unwrap();

    for n in 0..50 {
        let packet = Packet::unicast("seq", json!(n), a, b);
        handle.deliver(packet.route(), packet);
    }

    for n in 0..50 {
        let packet = timeout(RECV_TIMEOUT, rx_b.recv()).await.unwrap().unwrap();
        assert_eq!(packet.data, json!(n));
    }
}

#[tokio::test]
async fn test_unregistered_frame_receives_nothing() {
    let handle = spawn_switchboard(SwitchboardConfig::default());
    let (a, _rx_a) = handle.register_frame().await.unwrap();
    let (b, mut rx_b) = handle.register_frame().await.unwrap();

    handle.unregister_frame(b);
    let packet = Packet::unicast("test", json!(1), a, b);
    handle.deliver(packet.route(), packet);

    // Channel closes once the switchboard drops the sender
    let result = timeout(RECV_TIMEOUT, rx_b.recv()).await.unwrap();
    assert!(result.is_none());
}

// ============================================================================
// Events
// ============================================================================

#[tokio::test]
async fn test_events_are_published() {
    let handle = spawn_switchboard(SwitchboardConfig::default());
    let mut events = handle.subscribe();

    let (a, _rx) = handle.register_frame().await.unwrap();
    handle.claim_session(a, SessionId::from(5u32)).await.unwrap();
    handle.unregister_frame(a);

    let expected = [
        SwitchboardEvent::FrameRegistered { frame_id: a },
        SwitchboardEvent::SessionClaimed {
            session_id: SessionId::from(5u32),
            owner: a,
        },
        SwitchboardEvent::FrameUnregistered { frame_id: a },
    ];
    for want in expected {
        let got = timeout(RECV_TIMEOUT, events.recv()).await.unwrap().unwrap();
        assert_eq!(got, want);
    }
}

#[tokio::test]
async fn test_actor_stops_when_handles_dropped() {
    let handle = spawn_switchboard(SwitchboardConfig::default());
    let (_a, mut rx) = handle.register_frame().await.unwrap();
    drop(handle);

    // The actor owns the inbound sender; once it stops the channel closes
    let result = timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
    assert!(result.is_none());
}

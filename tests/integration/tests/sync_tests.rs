//! Send pipeline and realtime sync integration tests
//!
//! Full-stack scenarios over the in-process harness: gate, coordinator,
//! engine, and local store working against the in-memory gateway.

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;

use integration_tests::{unique_content, wait_for, TestHarness};
use relay_core::{ChannelKind, Collection, DeliveryState, StoreGateway};
use relay_sync::ConnectionStatus;

// ============================================================================
// Optimistic send
// ============================================================================

#[tokio::test]
async fn test_send_confirms_optimistic_entry_in_place() {
    let h = TestHarness::new();
    let convo = h.seed_conversation(ChannelKind::Webchat).await.unwrap();
    h.open_conversation(convo).await.unwrap();

    let accepted = h.session.send_message("Hola, como estas?").unwrap();
    assert!(accepted);

    wait_for(|| h.gateway.row_count(Collection::Messages) == 1)
        .await
        .unwrap();
    wait_for(|| {
        h.store
            .messages(convo)
            .first()
            .is_some_and(|m| m.delivery == DeliveryState::Confirmed)
    })
    .await
    .unwrap();

    // The engine also observes the insert through the feed; the merge must
    // recognize the already-reconciled id rather than append a duplicate
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let messages = h.store.messages(convo);
    assert_eq!(messages.len(), 1);
    assert!(!messages[0].id.is_local());
}

#[tokio::test]
async fn test_identical_resend_within_window_is_dropped() {
    let h = TestHarness::new();
    let convo = h.seed_conversation(ChannelKind::Webchat).await.unwrap();
    h.open_conversation(convo).await.unwrap();

    assert!(h.session.send_message("Hola").unwrap());
    assert!(!h.session.send_message("Hola").unwrap());

    wait_for(|| h.gateway.row_count(Collection::Messages) == 1)
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(h.gateway.row_count(Collection::Messages), 1);
}

#[tokio::test]
async fn test_rapid_edits_collapse_to_last_content() {
    let h = TestHarness::new();
    let convo = h.seed_conversation(ChannelKind::Webchat).await.unwrap();
    h.open_conversation(convo).await.unwrap();

    // Distinct contents inside one debounce interval: all pass dedup, only
    // the trailing one fires
    assert!(h.session.send_message("dra").unwrap());
    assert!(h.session.send_message("draft in prog").unwrap());
    assert!(h.session.send_message("draft in progress").unwrap());

    wait_for(|| h.gateway.row_count(Collection::Messages) == 1)
        .await
        .unwrap();
    wait_for(|| {
        h.store
            .messages(convo)
            .first()
            .is_some_and(|m| m.content == "draft in progress")
    })
    .await
    .unwrap();
    assert_eq!(h.store.messages(convo).len(), 1);
}

#[tokio::test]
async fn test_persist_failure_rolls_back_and_restores_draft() {
    let h = TestHarness::new();
    let convo = h.seed_conversation(ChannelKind::Webchat).await.unwrap();
    h.open_conversation(convo).await.unwrap();
    h.gateway.fail_next_insert("store down");

    let content = unique_content("doomed");
    h.session.send_message(&content).unwrap();

    // The optimistic entry disappears and the typed content comes back
    wait_for(|| h.session.compose().snapshot() == content)
        .await
        .unwrap();
    assert!(h.store.messages(convo).is_empty());
    assert_eq!(h.gateway.row_count(Collection::Messages), 0);
}

#[tokio::test]
async fn test_provider_dispatch_runs_after_durability() {
    let h = TestHarness::new();
    let convo = h.seed_conversation(ChannelKind::Whatsapp).await.unwrap();
    h.open_conversation(convo).await.unwrap();

    h.session.send_message("Mensaje saliente").unwrap();
    wait_for(|| h.dispatch.sent.load(std::sync::atomic::Ordering::SeqCst) == 1)
        .await
        .unwrap();
    assert_eq!(h.gateway.row_count(Collection::Messages), 1);
}

// ============================================================================
// Realtime merge
// ============================================================================

#[tokio::test]
async fn test_inbound_messages_merge_in_timestamp_order() {
    let h = TestHarness::new();
    let convo = h.seed_conversation(ChannelKind::Webchat).await.unwrap();
    h.open_conversation(convo).await.unwrap();

    let now = Utc::now();
    // Later message arrives first
    h.gateway
        .insert(
            Collection::Messages,
            json!({
                "conversation_id": convo,
                "content": "second",
                "sender": "client",
                "sender_name": "Client",
                "is_automated": false,
                "created_at": now,
            }),
        )
        .await
        .unwrap();
    h.gateway
        .insert(
            Collection::Messages,
            json!({
                "conversation_id": convo,
                "content": "first",
                "sender": "client",
                "sender_name": "Client",
                "is_automated": false,
                "created_at": now - ChronoDuration::seconds(10),
            }),
        )
        .await
        .unwrap();

    wait_for(|| h.store.messages(convo).len() == 2).await.unwrap();
    let messages = h.store.messages(convo);
    assert_eq!(messages[0].content, "first");
    assert_eq!(messages[1].content, "second");
}

#[tokio::test]
async fn test_redelivered_rows_do_not_duplicate() {
    let h = TestHarness::new();
    let convo = h.seed_conversation(ChannelKind::Webchat).await.unwrap();
    h.open_conversation(convo).await.unwrap();

    let stored = h
        .gateway
        .insert(
            Collection::Messages,
            json!({
                "conversation_id": convo,
                "content": "entrante",
                "sender": "client",
                "sender_name": "Client",
                "is_automated": false,
            }),
        )
        .await
        .unwrap();
    wait_for(|| h.store.messages(convo).len() == 1).await.unwrap();

    // The same row surfaces again, as after an update event or a resync
    h.gateway
        .update(
            Collection::Messages,
            relay_core::Filter::field("id", stored["id"].clone()),
            json!({ "content": "entrante" }),
        )
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(h.store.messages(convo).len(), 1);
}

#[tokio::test]
async fn test_transport_drop_recovers_missed_messages() {
    let h = TestHarness::new();
    let convo = h.seed_conversation(ChannelKind::Webchat).await.unwrap();
    h.open_conversation(convo).await.unwrap();

    h.gateway.interrupt_feed();
    h.gateway
        .insert(
            Collection::Messages,
            json!({
                "conversation_id": convo,
                "content": "perdido durante la caida",
                "sender": "client",
                "sender_name": "Client",
                "is_automated": false,
            }),
        )
        .await
        .unwrap();

    // Reconnect resyncs cold and closes the gap
    wait_for(|| h.store.messages(convo).len() == 1).await.unwrap();
    wait_for(|| h.session.connection_status() == ConnectionStatus::Connected)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_inbound_message_bumps_conversation_activity() {
    let h = TestHarness::new();
    let convo = h.seed_conversation(ChannelKind::Webchat).await.unwrap();
    h.open_conversation(convo).await.unwrap();
    let before = h.store.conversation(convo).unwrap().last_message_at;

    h.gateway
        .insert(
            Collection::Messages,
            json!({
                "conversation_id": convo,
                "content": "actividad",
                "sender": "client",
                "sender_name": "Client",
                "is_automated": false,
                "created_at": before + ChronoDuration::seconds(30),
            }),
        )
        .await
        .unwrap();

    wait_for(|| h.store.conversation(convo).unwrap().last_message_at > before)
        .await
        .unwrap();
}

// ============================================================================
// Session lifecycle
// ============================================================================

#[tokio::test]
async fn test_sign_out_tears_down_local_state() {
    let h = TestHarness::new();
    let convo = h.seed_conversation(ChannelKind::Webchat).await.unwrap();
    h.open_conversation(convo).await.unwrap();

    h.session.sign_out();
    assert_eq!(h.session.connection_status(), ConnectionStatus::Disconnected);
    assert_eq!(h.store.conversation_count(), 0);

    // No event after sign-out may repopulate the store
    h.gateway
        .insert(
            Collection::Messages,
            json!({
                "conversation_id": convo,
                "content": "tarde",
                "sender": "client",
                "sender_name": "Client",
                "is_automated": false,
            }),
        )
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(h.store.conversation_count(), 0);
}

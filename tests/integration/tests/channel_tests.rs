//! Channel registry and verification lifecycle integration tests

use std::sync::atomic::Ordering;

use integration_tests::{test_sync_config, test_verification_config, TestHarness};
use relay_common::VerificationConfig;
use relay_channels::{HardDeleteConfirmation, InstanceRole, VerificationEvent};
use relay_core::{
    ChannelKind, ChallengeStatus, ConnectionState, ProviderConfig, ProviderVariant,
};

fn expired_verification_config() -> VerificationConfig {
    VerificationConfig {
        validity_mins: 0,
        ..test_verification_config()
    }
}

// ============================================================================
// Composite connected predicate
// ============================================================================

#[tokio::test]
async fn test_channel_is_live_only_with_flag_and_credentials() {
    let h = TestHarness::new();
    let connection = h
        .registry
        .provision(h.principal, ProviderVariant::CloudApi)
        .await
        .unwrap();

    // Freshly provisioned: flag says connecting, no credentials
    let snapshot = h
        .registry
        .channel_state(h.principal, ChannelKind::Whatsapp)
        .await
        .unwrap();
    assert_eq!(snapshot.state, ConnectionState::Connecting);

    // Partial credentials never flip the channel live
    h.registry
        .apply_config(
            h.principal,
            connection.id,
            ProviderConfig::WhatsappCloud {
                access_token: Some("tok".into()),
                phone_number_id: None,
                webhook_verified: false,
            },
        )
        .await
        .unwrap();
    let snapshot = h
        .registry
        .channel_state(h.principal, ChannelKind::Whatsapp)
        .await
        .unwrap();
    assert_ne!(snapshot.state, ConnectionState::Connected);

    // Complete credentials do
    h.registry
        .apply_config(
            h.principal,
            connection.id,
            ProviderConfig::WhatsappCloud {
                access_token: Some("tok".into()),
                phone_number_id: Some("5215550001".into()),
                webhook_verified: true,
            },
        )
        .await
        .unwrap();
    let snapshot = h
        .registry
        .channel_state(h.principal, ChannelKind::Whatsapp)
        .await
        .unwrap();
    assert_eq!(snapshot.state, ConnectionState::Connected);
}

#[tokio::test]
async fn test_duplicate_provisioning_labels_orphans() {
    let h = TestHarness::new();
    let first = h
        .registry
        .provision(h.principal, ProviderVariant::BotApi)
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    h.registry
        .provision(h.principal, ProviderVariant::BotApi)
        .await
        .unwrap();

    let snapshot = h
        .registry
        .channel_state(h.principal, ChannelKind::Telegram)
        .await
        .unwrap();
    assert_eq!(snapshot.instances.len(), 2);
    assert_eq!(snapshot.instances[0].connection.id, first.id);
    assert_eq!(snapshot.instances[0].role, InstanceRole::Primary);
    assert_eq!(snapshot.instances[1].role, InstanceRole::Orphan);

    let removed = h
        .registry
        .cleanup_orphans(h.principal, ChannelKind::Telegram)
        .await
        .unwrap();
    assert_eq!(removed, 1);
}

#[tokio::test]
async fn test_hard_delete_needs_confirmation_and_tears_down() {
    let h = TestHarness::new();
    let connection = h
        .registry
        .provision(h.principal, ProviderVariant::BridgeSession)
        .await
        .unwrap();

    let err = h
        .registry
        .disconnect_hard(h.principal, connection.id, HardDeleteConfirmation::Declined)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "HARD_DELETE_NOT_CONFIRMED");
    assert_eq!(h.dispatch.teardowns.load(Ordering::SeqCst), 0);

    h.registry
        .disconnect_hard(h.principal, connection.id, HardDeleteConfirmation::Confirmed)
        .await
        .unwrap();
    assert_eq!(h.dispatch.teardowns.load(Ordering::SeqCst), 1);

    let snapshot = h
        .registry
        .channel_state(h.principal, ChannelKind::Whatsapp)
        .await
        .unwrap();
    assert!(snapshot.instances.is_empty());
    assert_eq!(snapshot.state, ConnectionState::Disconnected);
}

// ============================================================================
// Verification lifecycle
// ============================================================================

#[tokio::test]
async fn test_verification_completes_through_poll() {
    let h = TestHarness::new();
    let connection = h
        .registry
        .provision(h.principal, ProviderVariant::BridgeSession)
        .await
        .unwrap();
    let mut events = h.verification.subscribe_events();

    let challenge = h.verification.generate_code(connection.id).await.unwrap();
    h.verification
        .complete_challenge(challenge.id, &challenge.code)
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(
        events.try_recv().unwrap(),
        VerificationEvent::Completed {
            connection_id: connection.id,
            challenge_id: challenge.id,
        }
    );
    assert!(!h.verification.is_polling(connection.id));
}

#[tokio::test]
async fn test_expired_challenge_cannot_complete() {
    let h = TestHarness::with_config(test_sync_config(), expired_verification_config());
    let connection = h
        .registry
        .provision(h.principal, ProviderVariant::BridgeSession)
        .await
        .unwrap();

    let challenge = h.verification.generate_code(connection.id).await.unwrap();
    let err = h
        .verification
        .complete_challenge(challenge.id, &challenge.code)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "CHALLENGE_EXPIRED");
}

#[tokio::test]
async fn test_sweeper_expires_and_stops_polling() {
    let h = TestHarness::with_config(test_sync_config(), expired_verification_config());
    let connection = h
        .registry
        .provision(h.principal, ProviderVariant::BridgeSession)
        .await
        .unwrap();
    let mut events = h.verification.subscribe_events();

    let challenge = h.verification.generate_code(connection.id).await.unwrap();
    h.verification.start_sweeper();

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(
        events.try_recv().unwrap(),
        VerificationEvent::Expired {
            connection_id: connection.id,
            challenge_id: challenge.id,
        }
    );
    assert!(!h.verification.is_polling(connection.id));

    let active = h
        .verification
        .active_challenge(connection.id)
        .await
        .unwrap();
    assert!(active.is_none());
}

#[tokio::test]
async fn test_new_code_supersedes_previous_pending() {
    let h = TestHarness::new();
    let connection = h
        .registry
        .provision(h.principal, ProviderVariant::BridgeSession)
        .await
        .unwrap();

    let first = h.verification.generate_code(connection.id).await.unwrap();
    let second = h.verification.generate_code(connection.id).await.unwrap();

    let active = h
        .verification
        .active_challenge(connection.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(active.id, second.id);
    assert_eq!(active.status, ChallengeStatus::Pending);

    // The superseded code is dead even if presented in time
    let err = h
        .verification
        .complete_challenge(first.id, &first.code)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "CHALLENGE_EXPIRED");
}

//! Integration tests for the vault lifecycle.
//!
//! These drive the client core (controller, state view, input builder,
//! decryption handshake) against the in-process devnet, with a manual
//! clock standing in for block time.

use std::sync::Arc;

use fhevault_contracts::{Devnet, DevnetError};
use fhevault_protocol::chain::VaultContract;
use fhevault_protocol::crypto::signer::{LocalSigner, Signer};
use fhevault_protocol::fhe::EncryptedInputBuilder;
use fhevault_protocol::types::{ActionKind, EncryptedInput, LockDuration, LockRequest};
use fhevault_protocol::vault::{VaultEvent, VaultPhase};
use fhevault_protocol::{ClientConfig, FheSession, ManualClock, VaultController, VaultError};

const ONE: u64 = 1_000_000_000_000_000_000;
const GENESIS: u64 = 1_700_000_000;

struct Harness {
    config: ClientConfig,
    clock: Arc<ManualClock>,
    devnet: Arc<Devnet>,
    controller: VaultController,
    signer: Arc<LocalSigner>,
}

/// Helper: a fresh devnet with one connected account.
fn harness() -> Harness {
    let config = ClientConfig::devnet();
    let clock = Arc::new(ManualClock::new(GENESIS));
    let devnet = Arc::new(Devnet::new(&config, clock.clone()));
    let controller = VaultController::new(
        &config,
        devnet.clone(),
        FheSession::ready(devnet.clone()),
        clock.clone(),
    );
    let signer = Arc::new(LocalSigner::random());
    controller.connect(signer.clone());
    Harness {
        config,
        clock,
        devnet,
        controller,
        signer,
    }
}

// ---------------------------------------------------------------------------
// Stake
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fresh_account_has_no_position() {
    let h = harness();
    let snap = h.controller.refresh().await.unwrap();
    assert_eq!(snap.available, 0);
    assert!(snap.encrypted_balance.is_zero());
    assert!(!snap.lock.active);
    assert_eq!(h.controller.phase(), Some(VaultPhase::NoPosition));
    assert_eq!(h.controller.decrypt_balance().await.unwrap(), 0);
}

#[tokio::test]
async fn stake_sets_both_representations() {
    let h = harness();
    h.controller.stake("1").await.unwrap();

    let snap = h.controller.snapshot().unwrap();
    assert_eq!(snap.available, ONE);
    assert!(!snap.encrypted_balance.is_zero());
    assert_eq!(h.controller.phase(), Some(VaultPhase::Staked));
    assert_eq!(h.controller.decrypt_balance().await.unwrap(), ONE);
}

#[tokio::test]
async fn stake_overflow_is_reverted_by_the_contract() {
    let h = harness();
    h.controller.stake("18.446744073709551615").await.unwrap();
    let block = h.devnet.block_number();

    let err = h.controller.stake("0.000000000000000001").await.unwrap_err();
    match err {
        VaultError::SubmissionFailed { action, reason } => {
            assert_eq!(action, ActionKind::Stake);
            assert!(reason.contains("Balance overflow"), "{reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(h.devnet.block_number(), block);
    assert_eq!(h.controller.snapshot().unwrap().available, u64::MAX);
}

// ---------------------------------------------------------------------------
// Lock & release
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lock_moves_available_into_lock() {
    let h = harness();
    h.controller.stake("2").await.unwrap();
    h.controller
        .lock("1", LockDuration::from_days(7))
        .await
        .unwrap();

    let snap = h.controller.snapshot().unwrap();
    assert_eq!(snap.available, ONE);
    assert!(snap.lock.active);
    assert_eq!(snap.lock.plain_amount, ONE);
    assert_eq!(snap.lock.unlock_time, GENESIS + 7 * 86_400);
    assert_eq!(h.controller.phase(), Some(VaultPhase::Locked));

    assert_eq!(h.controller.decrypt_lock().await.unwrap(), ONE);
    // Locked funds stay inside the encrypted total.
    assert_eq!(h.controller.decrypt_balance().await.unwrap(), 2 * ONE);
}

#[tokio::test]
async fn lock_above_available_is_rejected_locally() {
    let h = harness();
    h.controller.stake("1").await.unwrap();
    let block = h.devnet.block_number();

    let err = h
        .controller
        .lock("1.5", LockDuration::from_secs(3_600))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        VaultError::InsufficientAvailableBalance {
            action: ActionKind::Lock,
            available,
            requested,
        } if available == ONE && requested == ONE + ONE / 2
    ));
    assert_eq!(h.devnet.block_number(), block, "nothing was submitted");
}

#[tokio::test]
async fn second_lock_while_active_is_rejected() {
    let h = harness();
    h.controller.stake("3").await.unwrap();
    h.controller
        .lock("1", LockDuration::from_secs(60))
        .await
        .unwrap();

    let err = h
        .controller
        .lock("1", LockDuration::from_secs(60))
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::LockAlreadyActive { unlock_time } if unlock_time == GENESIS + 60));
}

#[tokio::test]
async fn release_before_maturity_is_rejected() {
    let h = harness();
    h.controller.stake("2").await.unwrap();
    h.controller
        .lock("1", LockDuration::from_secs(3_600))
        .await
        .unwrap();
    h.clock.advance(3_599);

    let err = h.controller.release_lock().await.unwrap_err();
    assert!(matches!(err, VaultError::LockNotMatured { .. }));
    assert!(h.controller.snapshot().unwrap().lock.active);
}

#[tokio::test]
async fn stake_lock_mature_release_scenario() {
    let h = harness();
    h.controller.stake("2.0").await.unwrap();
    h.controller
        .lock("1.0", LockDuration::from_secs(3_600))
        .await
        .unwrap();
    assert_eq!(h.controller.snapshot().unwrap().available, ONE);
    assert!(!h.controller.snapshot().unwrap().can_release);

    h.clock.advance(3_601);
    let snap = h.controller.refresh().await.unwrap();
    assert!(snap.can_release);
    assert_eq!(h.controller.phase(), Some(VaultPhase::Maturing));

    h.controller.release_lock().await.unwrap();
    let snap = h.controller.snapshot().unwrap();
    assert_eq!(snap.available, 2 * ONE);
    assert!(!snap.lock.active);
    assert_eq!(snap.lock.plain_amount, 0);
    assert!(snap.lock.encrypted_amount.is_zero());
    assert_eq!(h.controller.phase(), Some(VaultPhase::Staked));
    assert_eq!(h.controller.format_amount(snap.available), "2");
}

#[tokio::test]
async fn encrypted_input_cannot_be_replayed() {
    let h = harness();
    let account = h.signer.address();
    h.controller.stake("5").await.unwrap();

    let builder = EncryptedInputBuilder::new(FheSession::ready(h.devnet.clone()));
    let input = builder
        .build(h.devnet.address(), account, ONE)
        .await
        .unwrap();
    let replay = EncryptedInput {
        handle: input.handle,
        proof: input.proof.clone(),
    };

    h.devnet
        .lock(
            account,
            LockRequest {
                plain_amount: ONE,
                duration_secs: 1,
                input,
            },
        )
        .await
        .unwrap();
    h.clock.advance(1);
    h.devnet.release_lock(account).await.unwrap();

    let err = h
        .devnet
        .lock(
            account,
            LockRequest {
                plain_amount: ONE,
                duration_secs: 1,
                input: replay,
            },
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already used"), "{err}");
}

// ---------------------------------------------------------------------------
// Redeem
// ---------------------------------------------------------------------------

#[tokio::test]
async fn redeem_reduces_available_and_encrypted_total() {
    let h = harness();
    h.controller.stake("1.5").await.unwrap();
    h.controller.redeem("0.5").await.unwrap();

    assert_eq!(h.controller.snapshot().unwrap().available, ONE);
    assert_eq!(h.controller.decrypt_balance().await.unwrap(), ONE);

    let err = h.controller.redeem("1.000000000000000001").await.unwrap_err();
    assert!(matches!(
        err,
        VaultError::InsufficientAvailableBalance { action: ActionKind::Redeem, .. }
    ));
}

#[tokio::test]
async fn locked_funds_cannot_be_redeemed() {
    let h = harness();
    h.controller.stake("2").await.unwrap();
    h.controller
        .lock("1.5", LockDuration::from_days(1))
        .await
        .unwrap();

    let err = h.controller.redeem("1").await.unwrap_err();
    assert!(matches!(err, VaultError::InsufficientAvailableBalance { .. }));
    h.controller.redeem("0.5").await.unwrap();
    assert_eq!(h.controller.decrypt_balance().await.unwrap(), 3 * ONE / 2);
}

// ---------------------------------------------------------------------------
// Events & persistence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn confirmed_actions_are_followed_by_a_refresh() {
    let h = harness();
    let mut events = h.controller.subscribe();
    h.controller.stake("1").await.unwrap();

    assert!(matches!(
        events.recv().await.unwrap(),
        VaultEvent::ActionConfirmed { action: ActionKind::Stake, .. }
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        VaultEvent::Refreshed { account, .. } if account == h.signer.address()
    ));
}

#[tokio::test]
async fn devnet_state_survives_save_and_load() {
    let h = harness();
    h.controller.stake("2").await.unwrap();
    h.controller
        .lock("0.5", LockDuration::from_secs(600))
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("devnet.json");
    h.devnet.save(&path).unwrap();

    let reloaded = Arc::new(Devnet::load_or_create(&path, &h.config, h.clock.clone()).unwrap());
    assert_eq!(reloaded.block_number(), h.devnet.block_number());

    let controller = VaultController::new(
        &h.config,
        reloaded.clone(),
        FheSession::ready(reloaded),
        h.clock.clone(),
    );
    controller.connect(h.signer.clone());
    let snap = controller.refresh().await.unwrap();
    assert_eq!(snap.available, 3 * ONE / 2);
    assert_eq!(controller.decrypt_lock().await.unwrap(), ONE / 2);
}

#[tokio::test]
async fn devnet_state_for_another_vault_is_refused() {
    let h = harness();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("devnet.json");
    h.devnet.save(&path).unwrap();

    let mut other = h.config.clone();
    other.vault_address = fhevault_protocol::Address::derive(b"some other vault");
    let err = Devnet::load_or_create(&path, &other, h.clock.clone())
        .err()
        .expect("mismatch must be refused");
    assert!(matches!(err, DevnetError::VaultMismatch { .. }));
}

#[tokio::test]
async fn missing_state_file_starts_from_genesis() {
    let h = harness();
    let dir = tempfile::tempdir().unwrap();
    let devnet = Devnet::load_or_create(&dir.path().join("absent.json"), &h.config, h.clock.clone())
        .unwrap();
    assert_eq!(devnet.block_number(), 0);
}

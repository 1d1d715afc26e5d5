//! Integration tests for the user-decryption handshake.
//!
//! Authorization statements are produced by the client and judged by the
//! devnet co-processor: validity window, domain-separated signature,
//! contract scope and ACL all have to line up.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use fhevault_contracts::Devnet;
use fhevault_protocol::chain::VaultContract;
use fhevault_protocol::crypto::ephemeral::AuthorizationKeypair;
use fhevault_protocol::crypto::keys::WalletKeypair;
use fhevault_protocol::crypto::signer::{LocalSigner, Signer};
use fhevault_protocol::crypto::typed_data::TypedMessage;
use fhevault_protocol::decryption::{DecryptionAuthorizer, DecryptionClient};
use fhevault_protocol::fhe::{
    CoprocessorError, EncryptedBatch, EncryptedInputBuffer, FheCoprocessor, UserDecryptRequest,
};
use fhevault_protocol::types::{Handle, HandleContractPair, LockDuration};
use fhevault_protocol::vault::DecryptedPosition;
use fhevault_protocol::{ClientConfig, FheSession, ManualClock, VaultController, VaultError};

const ONE: u64 = 1_000_000_000_000_000_000;
const DAY: u64 = 86_400;

/// Forwards to the devnet and counts decryption requests.
struct CountingCoprocessor {
    inner: Arc<Devnet>,
    decrypts: AtomicUsize,
}

#[async_trait]
impl FheCoprocessor for CountingCoprocessor {
    async fn encrypt(&self, buffer: EncryptedInputBuffer) -> Result<EncryptedBatch, CoprocessorError> {
        self.inner.encrypt(buffer).await
    }

    async fn user_decrypt(
        &self,
        request: UserDecryptRequest<'_>,
    ) -> Result<HashMap<Handle, String>, CoprocessorError> {
        self.decrypts.fetch_add(1, Ordering::SeqCst);
        self.inner.user_decrypt(request).await
    }
}

struct Harness {
    config: ClientConfig,
    clock: Arc<ManualClock>,
    devnet: Arc<Devnet>,
    coprocessor: Arc<CountingCoprocessor>,
    controller: VaultController,
    alice: Arc<LocalSigner>,
}

fn harness() -> Harness {
    let config = ClientConfig::devnet();
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let devnet = Arc::new(Devnet::new(&config, clock.clone()));
    let coprocessor = Arc::new(CountingCoprocessor {
        inner: devnet.clone(),
        decrypts: AtomicUsize::new(0),
    });
    let controller = VaultController::new(
        &config,
        devnet.clone(),
        FheSession::ready(coprocessor.clone()),
        clock.clone(),
    );
    let alice = Arc::new(LocalSigner::random());
    controller.connect(alice.clone());
    Harness {
        config,
        clock,
        devnet,
        coprocessor,
        controller,
        alice,
    }
}

impl Harness {
    fn authorizer(&self) -> DecryptionAuthorizer {
        DecryptionAuthorizer::new(self.config.decryption_domain(), self.clock.clone())
    }

    fn client(&self) -> DecryptionClient {
        DecryptionClient::new(FheSession::ready(self.devnet.clone()), self.clock.clone())
    }

    fn decrypts(&self) -> usize {
        self.coprocessor.decrypts.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sequential_sessions_never_share_a_keypair() {
    let h = harness();
    h.controller.stake("1").await.unwrap();
    let handle = h.controller.snapshot().unwrap().encrypted_balance;
    let vault = h.devnet.address();
    let pairs = [HandleContractPair { handle, contract_address: vault }];

    let first = h.authorizer().authorize(&[vault], Some(h.alice.as_ref())).await.unwrap();
    let second = h.authorizer().authorize(&[vault], Some(h.alice.as_ref())).await.unwrap();
    assert_ne!(first.keypair.public_key_bytes(), second.keypair.public_key_bytes());

    assert_eq!(h.client().decrypt(&pairs, first).await.unwrap()[&handle], ONE);
    assert_eq!(h.client().decrypt(&pairs, second).await.unwrap()[&handle], ONE);
}

#[tokio::test]
async fn another_account_cannot_decrypt() {
    let h = harness();
    h.controller.stake("1").await.unwrap();
    let handle = h.controller.snapshot().unwrap().encrypted_balance;
    let vault = h.devnet.address();

    let bob = LocalSigner::random();
    let session = h.authorizer().authorize(&[vault], Some(&bob)).await.unwrap();
    let err = h
        .client()
        .decrypt(&[HandleContractPair { handle, contract_address: vault }], session)
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::DecryptionFailed(reason) if reason.contains("not allowed")));
}

#[tokio::test]
async fn signature_for_another_chain_is_refused() {
    let h = harness();
    h.controller.stake("1").await.unwrap();
    let handle = h.controller.snapshot().unwrap().encrypted_balance;
    let vault = h.devnet.address();

    let mut foreign = h.config.decryption_domain();
    foreign.chain_id = 11_155_111;
    let session = DecryptionAuthorizer::new(foreign, h.clock.clone())
        .authorize(&[vault], Some(h.alice.as_ref()))
        .await
        .unwrap();
    let err = h
        .client()
        .decrypt(&[HandleContractPair { handle, contract_address: vault }], session)
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::DecryptionFailed(_)));
}

#[tokio::test]
async fn expired_statement_is_caught_before_submission() {
    let h = harness();
    h.controller.stake("1").await.unwrap();
    let handle = h.controller.snapshot().unwrap().encrypted_balance;
    let vault = h.devnet.address();

    let session = h.authorizer().authorize(&[vault], Some(h.alice.as_ref())).await.unwrap();
    h.clock.advance(7 * DAY + 1);
    let err = h
        .client()
        .decrypt(&[HandleContractPair { handle, contract_address: vault }], session)
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::AuthorizationExpired { .. }));
}

#[tokio::test]
async fn coprocessor_rejects_stale_window_on_its_own() {
    let h = harness();
    let key = WalletKeypair::generate();
    let user = key.address();
    h.devnet.stake(user, 10).await.unwrap();
    let handle = h.devnet.get_encrypted_balance(user).await.unwrap();
    let vault = h.devnet.address();

    let session = AuthorizationKeypair::generate();
    let start = 1_700_000_000 - 8 * DAY;
    let message = TypedMessage::user_decrypt(
        h.config.decryption_domain(),
        session.public_key_bytes(),
        vec![vault],
        start,
        7,
    );
    let signature = key.sign_digest(&message.signing_hash()).to_hex();
    let pairs = [HandleContractPair { handle, contract_address: vault }];

    let result = h
        .devnet
        .user_decrypt(UserDecryptRequest {
            pairs: &pairs,
            keypair: &session,
            signature_hex: &signature,
            contracts: &[vault],
            user,
            start_timestamp: start,
            duration_days: 7,
        })
        .await;
    assert!(matches!(result, Err(CoprocessorError::Rejected(reason)) if reason.contains("expired")));
}

// ---------------------------------------------------------------------------
// Controller decryption
// ---------------------------------------------------------------------------

#[tokio::test]
async fn zero_sentinel_never_reaches_the_coprocessor() {
    let h = harness();
    assert_eq!(h.controller.decrypt_balance().await.unwrap(), 0);
    assert_eq!(h.decrypts(), 0);
}

#[tokio::test]
async fn cached_values_are_dropped_after_mutations() {
    let h = harness();
    h.controller.stake("1").await.unwrap();

    assert_eq!(h.controller.decrypt_balance().await.unwrap(), ONE);
    assert_eq!(h.controller.decrypt_balance().await.unwrap(), ONE);
    assert_eq!(h.decrypts(), 1, "second read is served from the cache");

    h.controller.stake("1").await.unwrap();
    assert_eq!(h.controller.decrypt_balance().await.unwrap(), 2 * ONE);
    assert_eq!(h.decrypts(), 2);
}

#[tokio::test]
async fn position_is_decrypted_in_one_batch() {
    let h = harness();
    h.controller.stake("3").await.unwrap();
    h.controller
        .lock("1.25", LockDuration::from_days(30))
        .await
        .unwrap();

    let position = h.controller.decrypt_position().await.unwrap();
    assert_eq!(
        position,
        DecryptedPosition {
            total: 3 * ONE,
            locked: Some(ONE + ONE / 4),
        }
    );
    assert_eq!(h.decrypts(), 1);
}

#[tokio::test]
async fn position_without_lock_has_no_locked_amount() {
    let h = harness();
    h.controller.stake("0.5").await.unwrap();
    let position = h.controller.decrypt_position().await.unwrap();
    assert_eq!(position.total, ONE / 2);
    assert_eq!(position.locked, None);
}

#[tokio::test]
async fn disconnect_clears_decrypted_values() {
    let h = harness();
    h.controller.stake("1").await.unwrap();
    h.controller.decrypt_balance().await.unwrap();

    h.controller.disconnect();
    assert!(matches!(
        h.controller.decrypt_balance().await,
        Err(VaultError::SignerUnavailable)
    ));
    h.controller.connect(h.alice.clone());
    h.controller.decrypt_balance().await.unwrap();
    assert_eq!(h.decrypts(), 2);
    assert_eq!(h.alice.address(), h.controller.account().unwrap());
}

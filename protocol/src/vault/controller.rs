//! # Vault Controller
//!
//! Orchestrates user actions against the vault state machine:
//!
//! ```text
//! NoPosition --stake--> Staked <--release-- Maturing
//!                         |                    ^
//!                        lock                time passes
//!                         v                    |
//!                       Locked ----------------+
//! ```
//!
//! Every mutation follows the same path: claim the action's slot, parse and
//! guard against a fresh snapshot, submit, await the receipt, then clear
//! decrypted values and refresh. A failed or reverted submission leaves
//! local state untouched apart from the surfaced error, so there is never
//! optimistic state to roll back.
//!
//! Local guards are fast paths for obviously doomed submissions. The
//! contract remains the authority and reverts on its own.

use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::inflight::InFlight;
use super::state::{VaultEvent, VaultPhase, VaultSnapshot, VaultStateView};
use crate::amount::AmountCodec;
use crate::chain::{ContractError, VaultContract};
use crate::clock::Clock;
use crate::config::ClientConfig;
use crate::crypto::signer::Signer;
use crate::decryption::{DecryptedValues, DecryptionAuthorizer, DecryptionCache, DecryptionClient};
use crate::error::{Result, VaultError};
use crate::fhe::{EncryptedInputBuilder, FheSession};
use crate::types::{ActionKind, Address, Handle, HandleContractPair, LockDuration, LockRequest, TxReceipt};

/// Cleartext view of a position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecryptedPosition {
    /// Total confidential balance, available plus locked.
    pub total: u64,
    /// Locked amount, if a lock is active.
    pub locked: Option<u64>,
}

/// Drives one account's interaction with the vault.
pub struct VaultController {
    codec: AmountCodec,
    contract: Arc<dyn VaultContract>,
    inputs: EncryptedInputBuilder,
    authorizer: DecryptionAuthorizer,
    decryptor: DecryptionClient,
    view: VaultStateView,
    cache: DecryptionCache,
    inflight: InFlight,
    signer: RwLock<Option<Arc<dyn Signer>>>,
    clock: Arc<dyn Clock>,
}

impl VaultController {
    pub fn new(
        config: &ClientConfig,
        contract: Arc<dyn VaultContract>,
        fhe: FheSession,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let authorizer = DecryptionAuthorizer::new(config.decryption_domain(), clock.clone())
            .with_validity_days(config.authorization_validity_days);
        Self {
            codec: config.codec(),
            view: VaultStateView::new(contract.clone(), clock.clone()),
            inputs: EncryptedInputBuilder::new(fhe.clone()),
            decryptor: DecryptionClient::new(fhe, clock.clone()),
            authorizer,
            contract,
            cache: DecryptionCache::new(),
            inflight: InFlight::new(),
            signer: RwLock::new(None),
            clock,
        }
    }

    // -----------------------------------------------------------------------
    // Wallet
    // -----------------------------------------------------------------------

    /// Attaches a wallet. Anything cached for a previous account is dropped.
    pub fn connect(&self, signer: Arc<dyn Signer>) {
        info!(account = %signer.address(), "wallet connected");
        self.cache.clear();
        self.view.invalidate();
        *self.signer.write() = Some(signer);
    }

    pub fn disconnect(&self) {
        if let Some(signer) = self.signer.write().take() {
            info!(account = %signer.address(), "wallet disconnected");
        }
        self.cache.clear();
        self.view.invalidate();
    }

    pub fn account(&self) -> Option<Address> {
        self.signer.read().as_ref().map(|s| s.address())
    }

    fn signer(&self) -> Result<Arc<dyn Signer>> {
        self.signer.read().clone().ok_or(VaultError::SignerUnavailable)
    }

    // -----------------------------------------------------------------------
    // State
    // -----------------------------------------------------------------------

    pub fn view(&self) -> &VaultStateView {
        &self.view
    }

    /// The cached snapshot of the connected account, if any.
    pub fn snapshot(&self) -> Option<VaultSnapshot> {
        let account = self.account()?;
        self.view.current().filter(|s| s.account == account)
    }

    pub async fn refresh(&self) -> Result<VaultSnapshot> {
        let account = self.signer()?.address();
        self.view.refresh(account).await
    }

    /// Phase of the connected account per the cached snapshot.
    pub fn phase(&self) -> Option<VaultPhase> {
        self.snapshot().map(|s| s.phase(self.clock.now()))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VaultEvent> {
        self.view.subscribe()
    }

    pub fn codec(&self) -> &AmountCodec {
        &self.codec
    }

    pub fn format_amount(&self, units: u64) -> String {
        self.codec.to_decimal_string(units)
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Deposits `amount` of the native asset.
    pub async fn stake(&self, amount: &str) -> Result<TxReceipt> {
        let _permit = self.inflight.try_acquire(ActionKind::Stake)?;
        let units = self.codec.to_units(amount)?;
        let account = self.signer()?.address();

        self.confirm(ActionKind::Stake, account, self.contract.stake(account, units))
            .await
    }

    /// Withdraws `amount` from the available balance.
    pub async fn redeem(&self, amount: &str) -> Result<TxReceipt> {
        let _permit = self.inflight.try_acquire(ActionKind::Redeem)?;
        let units = self.codec.to_units(amount)?;
        let account = self.signer()?.address();

        let snapshot = self.view.refresh(account).await?;
        if units > snapshot.available {
            debug!(%account, requested = units, available = snapshot.available, "redeem guard failed");
            return Err(VaultError::InsufficientAvailableBalance {
                action: ActionKind::Redeem,
                available: snapshot.available,
                requested: units,
            });
        }

        self.confirm(ActionKind::Redeem, account, self.contract.redeem(account, units))
            .await
    }

    /// Locks `amount` of the available balance for `duration`.
    pub async fn lock(&self, amount: &str, duration: LockDuration) -> Result<TxReceipt> {
        let _permit = self.inflight.try_acquire(ActionKind::Lock)?;
        let units = self.codec.to_units(amount)?;
        if duration.is_zero() {
            return Err(VaultError::InvalidDuration);
        }
        let account = self.signer()?.address();

        let snapshot = self.view.refresh(account).await?;
        if snapshot.lock.active {
            debug!(%account, unlock_time = snapshot.lock.unlock_time, "lock guard failed: already active");
            return Err(VaultError::LockAlreadyActive {
                unlock_time: snapshot.lock.unlock_time,
            });
        }
        if units > snapshot.available {
            debug!(%account, requested = units, available = snapshot.available, "lock guard failed");
            return Err(VaultError::InsufficientAvailableBalance {
                action: ActionKind::Lock,
                available: snapshot.available,
                requested: units,
            });
        }

        // Minted per attempt; moved into the submission below.
        let input = self
            .inputs
            .build(self.contract.address(), account, units)
            .await?;
        let request = LockRequest {
            plain_amount: units,
            duration_secs: duration.as_secs(),
            input,
        };

        self.confirm(ActionKind::Lock, account, self.contract.lock(account, request))
            .await
    }

    /// Releases a matured lock back into the available balance.
    pub async fn release_lock(&self) -> Result<TxReceipt> {
        let _permit = self.inflight.try_acquire(ActionKind::Release)?;
        let account = self.signer()?.address();

        let snapshot = self.view.refresh(account).await?;
        if !snapshot.lock.active {
            return Err(VaultError::NoActiveLock);
        }
        if !snapshot.can_release {
            return Err(VaultError::LockNotMatured {
                unlock_time: snapshot.lock.unlock_time,
            });
        }

        self.confirm(ActionKind::Release, account, self.contract.release_lock(account))
            .await
    }

    async fn confirm<F>(&self, action: ActionKind, account: Address, submission: F) -> Result<TxReceipt>
    where
        F: Future<Output = std::result::Result<TxReceipt, ContractError>>,
    {
        info!(%action, %account, "submitting transaction");
        let receipt = match submission.await {
            Ok(receipt) if receipt.succeeded() => receipt,
            Ok(receipt) => {
                return Err(self.submission_failed(
                    action,
                    format!("transaction {} reverted", receipt.tx_hash),
                ))
            }
            Err(e) => return Err(self.submission_failed(action, e.to_string())),
        };

        info!(%action, %account, tx = %receipt.tx_hash, block = receipt.block_number, "transaction confirmed");
        self.cache.clear();
        self.view.invalidate();
        self.view.emit(VaultEvent::ActionConfirmed {
            action,
            tx_hash: receipt.tx_hash.clone(),
        });

        // The action is mined; a failed read must not make the caller resubmit.
        if let Err(e) = self.view.refresh(account).await {
            warn!(%action, %account, error = %e, "refresh after confirmation failed");
        }
        Ok(receipt)
    }

    fn submission_failed(&self, action: ActionKind, reason: String) -> VaultError {
        warn!(%action, %reason, "submission failed");
        self.view.emit(VaultEvent::ActionFailed {
            action,
            reason: reason.clone(),
        });
        VaultError::SubmissionFailed { action, reason }
    }

    // -----------------------------------------------------------------------
    // Decryption
    // -----------------------------------------------------------------------

    /// Decrypts the total confidential balance. Zero before the first stake.
    pub async fn decrypt_balance(&self) -> Result<u64> {
        let _permit = self.inflight.try_acquire(ActionKind::DecryptBalance)?;
        let signer = self.signer()?;
        let snapshot = self.view.refresh(signer.address()).await?;

        let handle = snapshot.encrypted_balance;
        let values = self.decrypt_handles(&signer, &[handle]).await?;
        values
            .get(&handle)
            .copied()
            .ok_or(VaultError::DecryptionIncomplete(handle))
    }

    /// Decrypts the amount under the active lock.
    pub async fn decrypt_lock(&self) -> Result<u64> {
        let _permit = self.inflight.try_acquire(ActionKind::DecryptLock)?;
        let signer = self.signer()?;
        let snapshot = self.view.refresh(signer.address()).await?;
        if !snapshot.lock.active {
            return Err(VaultError::NoActiveLock);
        }

        let handle = snapshot.lock.encrypted_amount;
        let values = self.decrypt_handles(&signer, &[handle]).await?;
        values
            .get(&handle)
            .copied()
            .ok_or(VaultError::DecryptionIncomplete(handle))
    }

    /// Decrypts total and locked amounts under a single authorization.
    pub async fn decrypt_position(&self) -> Result<DecryptedPosition> {
        let _balance = self.inflight.try_acquire(ActionKind::DecryptBalance)?;
        let _lock = self.inflight.try_acquire(ActionKind::DecryptLock)?;
        let signer = self.signer()?;
        let snapshot = self.view.refresh(signer.address()).await?;

        let mut handles = vec![snapshot.encrypted_balance];
        if snapshot.lock.active {
            handles.push(snapshot.lock.encrypted_amount);
        }
        let values = self.decrypt_handles(&signer, &handles).await?;
        let lookup = |handle: Handle| {
            values
                .get(&handle)
                .copied()
                .ok_or(VaultError::DecryptionIncomplete(handle))
        };

        Ok(DecryptedPosition {
            total: lookup(snapshot.encrypted_balance)?,
            locked: if snapshot.lock.active {
                Some(lookup(snapshot.lock.encrypted_amount)?)
            } else {
                None
            },
        })
    }

    /// Resolves handles through the Zero short-circuit, then the cache, then
    /// one fresh authorized session for whatever is left.
    async fn decrypt_handles(
        &self,
        signer: &Arc<dyn Signer>,
        handles: &[Handle],
    ) -> Result<DecryptedValues> {
        let mut resolved = DecryptedValues::new();
        let mut pending: Vec<Handle> = Vec::new();
        for handle in handles {
            if handle.is_zero() {
                // Policy: the sentinel means "never encrypted", so it is zero
                // without asking the co-processor.
                resolved.insert(*handle, 0);
            } else if let Some(value) = self.cache.get(handle) {
                debug!(%handle, "decryption cache hit");
                resolved.insert(*handle, value);
            } else if !pending.contains(handle) {
                pending.push(*handle);
            }
        }
        if pending.is_empty() {
            return Ok(resolved);
        }

        let contract = self.contract.address();
        let session = self
            .authorizer
            .authorize(&[contract], Some(signer.as_ref()))
            .await?;
        let pairs: Vec<HandleContractPair> = pending
            .iter()
            .map(|handle| HandleContractPair {
                handle: *handle,
                contract_address: contract,
            })
            .collect();

        let values = self.decryptor.decrypt(&pairs, session).await?;
        for (handle, value) in values {
            self.cache.insert(handle, value);
            resolved.insert(handle, value);
        }
        Ok(resolved)
    }
}

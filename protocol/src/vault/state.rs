//! # Vault State View
//!
//! Assembles the four contract reads into one immutable [`VaultSnapshot`].
//!
//! The reads are issued in parallel and joined. They are not atomic with
//! respect to each other or to concurrent transactions, so a snapshot is
//! advisory: good for guards and display, never a substitute for the
//! contract's own checks.
//!
//! ## Last one wins
//!
//! Every fetch takes a sequence number when it starts. A completed fetch
//! replaces the cached snapshot only if nothing newer has landed in the
//! meantime, so a slow refresh can never overwrite the result of a later
//! one. Nothing is queued or coalesced beyond that.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::TryFutureExt;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::chain::{ContractError, VaultContract};
use crate::clock::Clock;
use crate::config::EVENT_CHANNEL_CAPACITY;
use crate::error::{Result, VaultError};
use crate::types::{ActionKind, Address, Handle, LockInfo, ReadKind};

// ---------------------------------------------------------------------------
// Snapshot & phase
// ---------------------------------------------------------------------------

/// Where an account stands, as observed through a snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum VaultPhase {
    /// Never staked: the encrypted balance is still the Zero sentinel.
    NoPosition,
    /// Has a position and no active lock.
    Staked,
    /// Active lock, not yet releasable.
    Locked,
    /// Active lock past its unlock time and releasable.
    Maturing,
}

impl fmt::Display for VaultPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VaultPhase::NoPosition => "no position",
            VaultPhase::Staked => "staked",
            VaultPhase::Locked => "locked",
            VaultPhase::Maturing => "maturing",
        };
        f.write_str(name)
    }
}

/// One combined read of an account's vault state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VaultSnapshot {
    pub account: Address,
    pub available: u64,
    pub lock: LockInfo,
    pub can_release: bool,
    /// Handle of the total confidential balance (available + locked).
    pub encrypted_balance: Handle,
    /// Clock time at which the reads were issued.
    pub fetched_at: u64,
    pub sequence: u64,
}

impl VaultSnapshot {
    pub fn phase(&self, now: u64) -> VaultPhase {
        if self.lock.active {
            if self.can_release && self.lock.is_matured(now) {
                VaultPhase::Maturing
            } else {
                VaultPhase::Locked
            }
        } else if self.encrypted_balance.is_zero() {
            VaultPhase::NoPosition
        } else {
            VaultPhase::Staked
        }
    }

    /// Whether the account has ever staked.
    pub fn has_position(&self) -> bool {
        !self.encrypted_balance.is_zero()
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Notifications for UI-style consumers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VaultEvent {
    /// A refresh completed and became the current snapshot.
    Refreshed { account: Address, sequence: u64 },
    ActionConfirmed { action: ActionKind, tx_hash: String },
    ActionFailed { action: ActionKind, reason: String },
}

// ---------------------------------------------------------------------------
// View
// ---------------------------------------------------------------------------

fn read_failed(read: ReadKind) -> impl FnOnce(ContractError) -> VaultError {
    move |e| VaultError::ReadFailed {
        read,
        reason: e.to_string(),
    }
}

/// Cached, refreshable view of one vault contract.
pub struct VaultStateView {
    contract: Arc<dyn VaultContract>,
    clock: Arc<dyn Clock>,
    current: RwLock<Option<VaultSnapshot>>,
    next_sequence: AtomicU64,
    events: broadcast::Sender<VaultEvent>,
}

impl VaultStateView {
    pub fn new(contract: Arc<dyn VaultContract>, clock: Arc<dyn Clock>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            contract,
            clock,
            current: RwLock::new(None),
            next_sequence: AtomicU64::new(1),
            events,
        }
    }

    /// Performs the four reads for `account` without touching the cache.
    pub async fn snapshot(&self, account: Address) -> Result<VaultSnapshot> {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let fetched_at = self.clock.now();

        let (available, lock, can_release, encrypted_balance) = futures::try_join!(
            self.contract
                .get_available_balance(account)
                .map_err(read_failed(ReadKind::AvailableBalance)),
            self.contract
                .get_lock_info(account)
                .map_err(read_failed(ReadKind::LockInfo)),
            self.contract
                .can_release(account)
                .map_err(read_failed(ReadKind::CanRelease)),
            self.contract
                .get_encrypted_balance(account)
                .map_err(read_failed(ReadKind::EncryptedBalance)),
        )?;

        if !lock.is_consistent() {
            return Err(VaultError::ReadFailed {
                read: ReadKind::LockInfo,
                reason: "inactive lock carries an amount".into(),
            });
        }

        Ok(VaultSnapshot {
            account,
            available,
            lock,
            can_release,
            encrypted_balance,
            fetched_at,
            sequence,
        })
    }

    /// Re-reads `account` and makes the result current, unless a newer
    /// refresh has already landed.
    pub async fn refresh(&self, account: Address) -> Result<VaultSnapshot> {
        let snapshot = self.snapshot(account).await?;

        if self.install(&snapshot) {
            info!(
                %account,
                available = snapshot.available,
                lock_active = snapshot.lock.active,
                can_release = snapshot.can_release,
                sequence = snapshot.sequence,
                "vault state refreshed"
            );
            self.emit(VaultEvent::Refreshed {
                account,
                sequence: snapshot.sequence,
            });
        } else {
            debug!(%account, sequence = snapshot.sequence, "stale refresh superseded");
        }
        Ok(snapshot)
    }

    /// Makes `snapshot` current unless a newer one for the same account is
    /// already installed.
    fn install(&self, snapshot: &VaultSnapshot) -> bool {
        let mut current = self.current.write();
        let newer_exists = current
            .as_ref()
            .map(|c| c.account == snapshot.account && c.sequence > snapshot.sequence)
            .unwrap_or(false);
        if newer_exists {
            return false;
        }
        *current = Some(snapshot.clone());
        true
    }

    /// The cached snapshot, if any.
    pub fn current(&self) -> Option<VaultSnapshot> {
        self.current.read().clone()
    }

    /// Drops the cached snapshot.
    pub fn invalidate(&self) {
        *self.current.write() = None;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VaultEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: VaultEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub fn contract(&self) -> &Arc<dyn VaultContract> {
        &self.contract
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::types::{LockRequest, TxReceipt};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Serves fixed reads; optionally fails one of them.
    struct FixedVault {
        available: u64,
        lock: LockInfo,
        handle: Handle,
        fail: Option<ReadKind>,
        reads: Mutex<u32>,
    }

    impl FixedVault {
        fn new(available: u64, lock: LockInfo, handle: Handle) -> Self {
            Self {
                available,
                lock,
                handle,
                fail: None,
                reads: Mutex::new(0),
            }
        }

        fn check(&self, read: ReadKind) -> std::result::Result<(), ContractError> {
            *self.reads.lock() += 1;
            if self.fail == Some(read) {
                return Err(ContractError::Transport("rpc timeout".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl VaultContract for FixedVault {
        fn address(&self) -> Address {
            Address::derive(b"vault")
        }
        async fn stake(&self, _from: Address, _value: u64) -> std::result::Result<TxReceipt, ContractError> {
            unimplemented!()
        }
        async fn redeem(&self, _from: Address, _amount: u64) -> std::result::Result<TxReceipt, ContractError> {
            unimplemented!()
        }
        async fn lock(&self, _from: Address, _request: LockRequest) -> std::result::Result<TxReceipt, ContractError> {
            unimplemented!()
        }
        async fn release_lock(&self, _from: Address) -> std::result::Result<TxReceipt, ContractError> {
            unimplemented!()
        }
        async fn get_available_balance(&self, _account: Address) -> std::result::Result<u64, ContractError> {
            self.check(ReadKind::AvailableBalance)?;
            Ok(self.available)
        }
        async fn get_lock_info(&self, _account: Address) -> std::result::Result<LockInfo, ContractError> {
            self.check(ReadKind::LockInfo)?;
            Ok(self.lock)
        }
        async fn can_release(&self, _account: Address) -> std::result::Result<bool, ContractError> {
            self.check(ReadKind::CanRelease)?;
            Ok(self.lock.active)
        }
        async fn get_encrypted_balance(&self, _account: Address) -> std::result::Result<Handle, ContractError> {
            self.check(ReadKind::EncryptedBalance)?;
            Ok(self.handle)
        }
    }

    fn view(vault: FixedVault) -> VaultStateView {
        VaultStateView::new(Arc::new(vault), Arc::new(ManualClock::new(500)))
    }

    fn active_lock(unlock_time: u64) -> LockInfo {
        LockInfo {
            active: true,
            unlock_time,
            encrypted_amount: Handle::from_bytes([2; 32]),
            plain_amount: 10,
        }
    }

    #[tokio::test]
    async fn snapshot_combines_all_reads() {
        let v = view(FixedVault::new(90, active_lock(400), Handle::from_bytes([1; 32])));
        let snap = v.snapshot(Address::derive(b"alice")).await.unwrap();
        assert_eq!(snap.available, 90);
        assert!(snap.can_release);
        assert_eq!(snap.fetched_at, 500);
        assert_eq!(snap.phase(500), VaultPhase::Maturing);
        assert!(v.current().is_none(), "snapshot() must not touch the cache");
    }

    #[tokio::test]
    async fn failed_read_names_the_read() {
        let mut vault = FixedVault::new(1, LockInfo::inactive(), Handle::ZERO);
        vault.fail = Some(ReadKind::CanRelease);
        let err = view(vault).refresh(Address::derive(b"a")).await.unwrap_err();
        assert!(matches!(err, VaultError::ReadFailed { read: ReadKind::CanRelease, .. }));
    }

    #[tokio::test]
    async fn inconsistent_lock_record_is_refused() {
        let bad = LockInfo {
            active: false,
            unlock_time: 0,
            encrypted_amount: Handle::ZERO,
            plain_amount: 5,
        };
        let err = view(FixedVault::new(1, bad, Handle::ZERO))
            .snapshot(Address::derive(b"a"))
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::ReadFailed { read: ReadKind::LockInfo, .. }));
    }

    #[tokio::test]
    async fn refresh_installs_and_notifies() {
        let v = view(FixedVault::new(7, LockInfo::inactive(), Handle::from_bytes([1; 32])));
        let mut events = v.subscribe();
        let alice = Address::derive(b"alice");
        let snap = v.refresh(alice).await.unwrap();
        assert_eq!(v.current(), Some(snap.clone()));
        assert_eq!(
            events.recv().await.unwrap(),
            VaultEvent::Refreshed { account: alice, sequence: snap.sequence }
        );
        v.invalidate();
        assert!(v.current().is_none());
    }

    #[tokio::test]
    async fn older_fetch_does_not_overwrite_newer() {
        let v = view(FixedVault::new(7, LockInfo::inactive(), Handle::from_bytes([1; 32])));
        let alice = Address::derive(b"alice");
        let older = v.snapshot(alice).await.unwrap();
        let newer = v.refresh(alice).await.unwrap();
        assert!(newer.sequence > older.sequence);

        // The older fetch completes late.
        assert!(!v.install(&older));
        assert_eq!(v.current().unwrap().sequence, newer.sequence);
    }

    #[test]
    fn phases() {
        let base = VaultSnapshot {
            account: Address::derive(b"a"),
            available: 0,
            lock: LockInfo::inactive(),
            can_release: false,
            encrypted_balance: Handle::ZERO,
            fetched_at: 0,
            sequence: 1,
        };
        assert_eq!(base.phase(0), VaultPhase::NoPosition);

        let staked = VaultSnapshot {
            available: 5,
            encrypted_balance: Handle::from_bytes([1; 32]),
            ..base.clone()
        };
        assert_eq!(staked.phase(0), VaultPhase::Staked);

        let locked = VaultSnapshot {
            lock: active_lock(100),
            ..staked.clone()
        };
        assert_eq!(locked.phase(50), VaultPhase::Locked);
        // Past unlock time but the contract has not said so yet.
        assert_eq!(locked.phase(150), VaultPhase::Locked);

        let releasable = VaultSnapshot {
            can_release: true,
            ..locked
        };
        assert_eq!(releasable.phase(150), VaultPhase::Maturing);
    }
}

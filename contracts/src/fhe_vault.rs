//! # FHE Vault Contract
//!
//! The vault's on-chain state machine. Per account it keeps:
//!
//! - `available`: plaintext units not under a lock;
//! - `encrypted_balance`: handle of the confidential total, available plus
//!   locked. Locking and releasing move value between `available` and the
//!   lock but never touch this total;
//! - one optional lock with both a plaintext and an encrypted amount.
//!
//! Every entry point validates before it mutates, so a revert leaves the
//! state exactly as it was.

use std::collections::BTreeMap;

use fhevault_protocol::types::{Address, Handle, LockInfo};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coprocessor::{CiphertextStore, CoprocessorRejection};

// ---------------------------------------------------------------------------
// Reverts
// ---------------------------------------------------------------------------

/// Revert reasons, with the contract's messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VaultRevert {
    #[error("Stake amount must be positive")]
    ZeroDeposit,

    #[error("Amount must be positive")]
    ZeroAmount,

    #[error("Insufficient available balance")]
    InsufficientAvailableBalance,

    #[error("Balance overflow")]
    BalanceOverflow,

    #[error("Lock already active")]
    LockAlreadyActive,

    #[error("Duration must be positive")]
    InvalidDuration,

    #[error("Unlock time overflow")]
    UnlockTimeOverflow,

    #[error("No active lock")]
    NoActiveLock,

    #[error("Lock not matured")]
    LockNotMatured,

    #[error("Invalid encrypted input: {0}")]
    InvalidInput(#[from] CoprocessorRejection),
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultAccount {
    pub available: u64,
    pub encrypted_balance: Handle,
    pub lock: LockInfo,
}

/// Vault contract storage.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FheVault {
    address: Address,
    accounts: BTreeMap<Address, VaultAccount>,
}

impl FheVault {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            accounts: BTreeMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn account(&self, owner: &Address) -> VaultAccount {
        self.accounts.get(owner).cloned().unwrap_or_default()
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    /// Grants the vault and the owner access to a handle.
    fn share(&self, store: &mut CiphertextStore, handle: Handle, owner: Address) {
        store.allow(handle, self.address);
        store.allow(handle, owner);
    }

    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    /// `stake() payable`.
    pub fn stake(
        &mut self,
        store: &mut CiphertextStore,
        from: Address,
        value: u64,
    ) -> Result<(), VaultRevert> {
        if value == 0 {
            return Err(VaultRevert::ZeroDeposit);
        }
        let mut account = self.account(&from);
        account.available = account
            .available
            .checked_add(value)
            .ok_or(VaultRevert::BalanceOverflow)?;

        account.encrypted_balance = if account.encrypted_balance.is_zero() {
            store.trivial(value)
        } else {
            store.add_plain(account.encrypted_balance, value)
        };
        self.share(store, account.encrypted_balance, from);
        self.accounts.insert(from, account);
        Ok(())
    }

    /// `redeem(amount)`: pays out from the available balance.
    pub fn redeem(
        &mut self,
        store: &mut CiphertextStore,
        from: Address,
        amount: u64,
    ) -> Result<(), VaultRevert> {
        if amount == 0 {
            return Err(VaultRevert::ZeroAmount);
        }
        let mut account = self.account(&from);
        if amount > account.available {
            return Err(VaultRevert::InsufficientAvailableBalance);
        }
        account.available -= amount;
        account.encrypted_balance = store.sub_plain(account.encrypted_balance, amount);
        self.share(store, account.encrypted_balance, from);
        self.accounts.insert(from, account);
        Ok(())
    }

    /// `lock(plainAmount, durationSeconds, handle, proof)`.
    #[allow(clippy::too_many_arguments)]
    pub fn lock(
        &mut self,
        store: &mut CiphertextStore,
        from: Address,
        plain_amount: u64,
        duration_secs: u64,
        handle: Handle,
        proof: &[u8],
        now: u64,
    ) -> Result<(), VaultRevert> {
        let mut account = self.account(&from);
        if account.lock.active {
            return Err(VaultRevert::LockAlreadyActive);
        }
        if plain_amount == 0 {
            return Err(VaultRevert::ZeroAmount);
        }
        if plain_amount > account.available {
            return Err(VaultRevert::InsufficientAvailableBalance);
        }
        if duration_secs == 0 {
            return Err(VaultRevert::InvalidDuration);
        }
        let unlock_time = now
            .checked_add(duration_secs)
            .ok_or(VaultRevert::UnlockTimeOverflow)?;

        // Last fallible step: consumes the input.
        let encrypted_amount = store.verify_input(handle, proof, self.address, from)?;

        account.available -= plain_amount;
        account.lock = LockInfo {
            active: true,
            unlock_time,
            encrypted_amount,
            plain_amount,
        };
        self.share(store, encrypted_amount, from);
        self.accounts.insert(from, account);
        Ok(())
    }

    /// `releaseLock()`.
    pub fn release_lock(&mut self, from: Address, now: u64) -> Result<(), VaultRevert> {
        let mut account = self.account(&from);
        if !account.lock.active {
            return Err(VaultRevert::NoActiveLock);
        }
        if now < account.lock.unlock_time {
            return Err(VaultRevert::LockNotMatured);
        }
        account.available = account
            .available
            .checked_add(account.lock.plain_amount)
            .ok_or(VaultRevert::BalanceOverflow)?;
        account.lock = LockInfo::inactive();
        self.accounts.insert(from, account);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    pub fn get_available_balance(&self, owner: &Address) -> u64 {
        self.account(owner).available
    }

    pub fn get_lock_info(&self, owner: &Address) -> LockInfo {
        self.account(owner).lock
    }

    pub fn can_release(&self, owner: &Address, now: u64) -> bool {
        self.account(owner).lock.is_matured(now)
    }

    pub fn get_encrypted_balance(&self, owner: &Address) -> Handle {
        self.account(owner).encrypted_balance
    }
}

//! # Vault Contract Seam
//!
//! The on-chain vault as the client sees it: four mutating calls that
//! return once the transaction is mined, and four pure reads.
//!
//! Implementations own transport concerns (RPC, confirmation waiting,
//! timeouts). The core never retries; whatever error the transport reports
//! is surfaced as-is through [`ContractError`].

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Address, Handle, LockInfo, LockRequest, TxReceipt};

/// Errors reported by a vault contract implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContractError {
    /// Execution reverted with the contract's reason string.
    #[error("execution reverted: {0}")]
    Reverted(String),

    /// The call never got a verdict: connection, timeout, encoding.
    #[error("transport error: {0}")]
    Transport(String),
}

/// The confidential vault contract.
///
/// Mutations take the sender explicitly; a real RPC implementation would
/// check it against the wallet it signs with.
#[async_trait]
pub trait VaultContract: Send + Sync {
    /// Deployed address, the contract scope of decryption requests.
    fn address(&self) -> Address;

    /// `stake() payable`: deposits `value` units.
    async fn stake(&self, from: Address, value: u64) -> Result<TxReceipt, ContractError>;

    async fn redeem(&self, from: Address, amount: u64) -> Result<TxReceipt, ContractError>;

    /// `lock(plainAmount, durationSeconds, handle, proof)`. Consumes the
    /// encrypted input inside `request`.
    async fn lock(&self, from: Address, request: LockRequest) -> Result<TxReceipt, ContractError>;

    async fn release_lock(&self, from: Address) -> Result<TxReceipt, ContractError>;

    async fn get_available_balance(&self, account: Address) -> Result<u64, ContractError>;

    async fn get_lock_info(&self, account: Address) -> Result<LockInfo, ContractError>;

    async fn can_release(&self, account: Address) -> Result<bool, ContractError>;

    /// [`Handle::ZERO`] until the account first stakes.
    async fn get_encrypted_balance(&self, account: Address) -> Result<Handle, ContractError>;
}

//! # Vault Data Model
//!
//! The value types that cross the client/collaborator boundary: addresses,
//! ciphertext handles, lock records, encrypted inputs and receipts.
//!
//! Two representations of money coexist here. Plaintext `u64` unit amounts
//! are what the contract compares against; [`Handle`]s are opaque references
//! to ciphertexts held by the co-processor. Nothing in this module ever
//! converts one into the other.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SECONDS_PER_DAY;
use crate::crypto::hash::blake3_hash;

/// Errors parsing hex-encoded identifiers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid length: expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], IdentifierError> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(stripped).map_err(|e| IdentifierError::InvalidHex(e.to_string()))?;
    if bytes.len() != N {
        return Err(IdentifierError::InvalidLength {
            expected: N,
            got: bytes.len(),
        });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 20-byte account or contract address, displayed as `0x`-prefixed hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Address([u8; 20]);

impl Address {
    /// The all-zero address.
    pub const ZERO: Address = Address([0u8; 20]);

    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Address of an Ed25519 verifying key: the last 20 bytes of its BLAKE3
    /// digest.
    pub fn from_public_key(public_key: &[u8; 32]) -> Self {
        Self::derive(public_key)
    }

    /// Deterministic address derived from arbitrary seed bytes.
    pub fn derive(seed: &[u8]) -> Self {
        let digest = blake3_hash(seed);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest[12..]);
        Self(bytes)
    }

    /// Left-padded 32-byte word, as the typed-data encoding wants it.
    pub fn to_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&self.0);
        word
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<20>(s).map(Self)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_hex()
    }
}

impl TryFrom<String> for Address {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Opaque identifier of a ciphertext held by the co-processor.
///
/// [`Handle::ZERO`] means "no ciphertext yet". It is not an encryption of
/// zero and must never be sent to the co-processor for decryption.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Handle([u8; 32]);

impl Handle {
    /// The "never assigned" sentinel.
    pub const ZERO: Handle = Handle([0u8; 32]);

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            f.write_str("Handle(ZERO)")
        } else {
            write!(f, "Handle({})", self.to_hex())
        }
    }
}

impl FromStr for Handle {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<32>(s).map(Self)
    }
}

impl From<Handle> for String {
    fn from(handle: Handle) -> Self {
        handle.to_hex()
    }
}

impl TryFrom<String> for Handle {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A handle paired with the contract that owns it, as the decryption
/// endpoint expects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleContractPair {
    pub handle: Handle,
    pub contract_address: Address,
}

// ---------------------------------------------------------------------------
// Encrypted input
// ---------------------------------------------------------------------------

/// A freshly encrypted amount plus its proof of correct encryption, bound to
/// one (contract, user) pair.
///
/// Deliberately neither `Clone` nor `Copy`: an input is moved into exactly
/// one submission and is worthless afterwards.
#[derive(Debug, PartialEq, Eq)]
pub struct EncryptedInput {
    pub handle: Handle,
    pub proof: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Lock
// ---------------------------------------------------------------------------

/// The single time-lock an account may hold.
///
/// Invariant: `active == false` implies `plain_amount == 0` and
/// `encrypted_amount == Handle::ZERO`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    pub active: bool,
    /// Unix timestamp (seconds) from which the lock may be released.
    pub unlock_time: u64,
    pub encrypted_amount: Handle,
    pub plain_amount: u64,
}

impl LockInfo {
    /// The record of an account with no lock.
    pub fn inactive() -> Self {
        Self::default()
    }

    /// Whether the record satisfies the inactive-implies-empty invariant.
    pub fn is_consistent(&self) -> bool {
        self.active || (self.plain_amount == 0 && self.encrypted_amount.is_zero())
    }

    /// Whether `now` is at or past the unlock time of an active lock.
    pub fn is_matured(&self, now: u64) -> bool {
        self.active && now >= self.unlock_time
    }

    /// Unlock time as a calendar timestamp, for display.
    pub fn unlock_at(&self) -> Option<DateTime<Utc>> {
        if !self.active {
            return None;
        }
        Utc.timestamp_opt(i64::try_from(self.unlock_time).ok()?, 0).single()
    }
}

/// How long a lock holds its funds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LockDuration {
    secs: u64,
}

impl LockDuration {
    pub const fn from_secs(secs: u64) -> Self {
        Self { secs }
    }

    /// Saturates rather than wrapping on absurd day counts.
    pub const fn from_days(days: u64) -> Self {
        Self {
            secs: days.saturating_mul(SECONDS_PER_DAY),
        }
    }

    pub const fn as_secs(&self) -> u64 {
        self.secs
    }

    pub const fn is_zero(&self) -> bool {
        self.secs == 0
    }
}

/// Arguments of the vault's `lock` call. Owns the encrypted input it carries.
#[derive(Debug)]
pub struct LockRequest {
    /// Cleartext amount, used by the contract for the available-balance check.
    pub plain_amount: u64,
    pub duration_secs: u64,
    /// Ciphertext of the same amount, placed under confidential accounting.
    pub input: EncryptedInput,
}

// ---------------------------------------------------------------------------
// Actions, reads, receipts
// ---------------------------------------------------------------------------

/// Every slot the controller single-flights.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Stake,
    Redeem,
    Lock,
    Release,
    DecryptBalance,
    DecryptLock,
}

impl ActionKind {
    /// Whether the action submits a transaction.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            ActionKind::Stake | ActionKind::Redeem | ActionKind::Lock | ActionKind::Release
        )
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Stake => "stake",
            ActionKind::Redeem => "redeem",
            ActionKind::Lock => "lock",
            ActionKind::Release => "release",
            ActionKind::DecryptBalance => "decrypt-balance",
            ActionKind::DecryptLock => "decrypt-lock",
        };
        f.write_str(name)
    }
}

/// The four reads a snapshot is assembled from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReadKind {
    AvailableBalance,
    LockInfo,
    CanRelease,
    EncryptedBalance,
}

impl fmt::Display for ReadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReadKind::AvailableBalance => "getAvailableBalance",
            ReadKind::LockInfo => "getLockInfo",
            ReadKind::CanRelease => "canRelease",
            ReadKind::EncryptedBalance => "getEncryptedBalance",
        };
        f.write_str(name)
    }
}

/// Final status of a mined transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    Success,
    Reverted,
}

/// What the collaborator returns once a submission has been mined.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub block_number: u64,
    pub status: TxStatus,
}

impl TxReceipt {
    pub fn succeeded(&self) -> bool {
        self.status == TxStatus::Success
    }
}

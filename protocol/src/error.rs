//! Error taxonomy of the vault client.
//!
//! Every fallible core operation returns a [`VaultError`]. Variants carry
//! enough context (which action, which read, which guard) for a caller to
//! decide whether to retry, and with what. Nothing in the core retries on
//! its own.

use std::fmt;

use thiserror::Error;

use crate::types::{ActionKind, Handle, ReadKind};

/// Why a user-entered amount was refused.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AmountRejection {
    Empty,
    Malformed,
    Negative,
    Zero,
    TooManyDecimals { max: u32 },
    OutOfRange,
}

impl fmt::Display for AmountRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmountRejection::Empty => write!(f, "enter an amount"),
            AmountRejection::Malformed => write!(f, "not a decimal number"),
            AmountRejection::Negative => write!(f, "amount must be positive"),
            AmountRejection::Zero => write!(f, "amount must be positive"),
            AmountRejection::TooManyDecimals { max } => {
                write!(f, "at most {} fractional digits are supported", max)
            }
            AmountRejection::OutOfRange => {
                write!(f, "amount exceeds the uint64 range supported by the contract")
            }
        }
    }
}

/// Errors surfaced by the vault client.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Malformed or out-of-range user input. Never reaches the network.
    #[error("invalid amount {input:?}: {reason}")]
    InvalidAmount {
        input: String,
        reason: AmountRejection,
    },

    #[error("invalid lock duration: must be greater than zero")]
    InvalidDuration,

    /// Local pre-check mirroring the contract's available-balance revert.
    #[error("{action}: amount {requested} exceeds available balance {available}")]
    InsufficientAvailableBalance {
        action: ActionKind,
        available: u64,
        requested: u64,
    },

    #[error("a lock is already active (unlocks at {unlock_time})")]
    LockAlreadyActive { unlock_time: u64 },

    #[error("no active lock")]
    NoActiveLock,

    #[error("lock has not matured yet (unlocks at {unlock_time})")]
    LockNotMatured { unlock_time: u64 },

    /// The co-processor session has not been initialized.
    #[error("encryption service not ready")]
    EncryptionUnavailable,

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// No wallet is attached to the client.
    #[error("no signer attached; connect a wallet to continue")]
    SignerUnavailable,

    #[error("signer rejected the request: {0}")]
    SignatureRejected(String),

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// The co-processor answered without a value for this handle.
    #[error("decryption response is missing handle {0}")]
    DecryptionIncomplete(Handle),

    /// The statement's validity window has passed; authorize again.
    #[error("decryption authorization expired at {expired_at}")]
    AuthorizationExpired { expired_at: u64 },

    #[error("{action} submission failed: {reason}")]
    SubmissionFailed { action: ActionKind, reason: String },

    #[error("state read {read} failed: {reason}")]
    ReadFailed { read: ReadKind, reason: String },

    /// A second invocation of an action whose slot is still occupied.
    #[error("{0} is already in progress")]
    ActionInFlight(ActionKind),
}

impl VaultError {
    pub(crate) fn invalid_amount(input: &str, reason: AmountRejection) -> Self {
        VaultError::InvalidAmount {
            input: input.to_string(),
            reason,
        }
    }

    /// Whether the error came from a local guard, before anything was sent.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            VaultError::InvalidAmount { .. }
                | VaultError::InvalidDuration
                | VaultError::InsufficientAvailableBalance { .. }
                | VaultError::LockAlreadyActive { .. }
                | VaultError::NoActiveLock
                | VaultError::LockNotMatured { .. }
                | VaultError::SignerUnavailable
                | VaultError::EncryptionUnavailable
                | VaultError::AuthorizationExpired { .. }
                | VaultError::ActionInFlight(_)
        )
    }
}

/// Result alias used across the core.
pub type Result<T> = std::result::Result<T, VaultError>;

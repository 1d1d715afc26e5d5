//! # FHE Vault Protocol Client
//!
//! Client-side core of a confidential staking vault. Users stake a native
//! asset, the vault tracks their balance as an FHE ciphertext, part of it
//! can be time-locked, and only the owner can decrypt their own numbers.
//!
//! ## Architecture
//!
//! - **amount**: decimal strings to `u64` units and back, exactly.
//! - **fhe**: the co-processor seam and encrypted input construction.
//! - **decryption**: the user-decrypt handshake: ephemeral keypair,
//!   signed typed authorization, cleartext reconciliation.
//! - **vault**: snapshot view of on-chain state and the action controller.
//! - **chain**: the vault contract seam.
//! - **crypto**: signatures, typed data, re-encryption primitives.
//! - **config**: constants and per-deployment parameters.
//!
//! ## Two kinds of money
//!
//! Plaintext `u64` amounts are what the contract compares against. Handles
//! are references to ciphertexts held by the co-processor. The client never
//! derives one from the other: plaintexts come from user input, cleartexts
//! only ever come back through an authorized decryption.

pub mod amount;
pub mod chain;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod decryption;
pub mod error;
pub mod fhe;
pub mod types;
pub mod vault;

pub use amount::AmountCodec;
pub use chain::{ContractError, VaultContract};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ClientConfig;
pub use error::{AmountRejection, Result, VaultError};
pub use fhe::{CoprocessorError, FheCoprocessor, FheSession};
pub use types::{Address, EncryptedInput, Handle, LockDuration, LockInfo, TxReceipt};
pub use vault::{VaultController, VaultPhase, VaultSnapshot};

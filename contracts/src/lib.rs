//! # FHE Vault Devnet
//!
//! On-chain side of the FHE vault, run in process:
//!
//! - **FHE Vault**: the staking contract: stake, redeem, time-locks, and
//!   a confidential total kept alongside plaintext accounting.
//! - **Co-processor**: ciphertext handles, ACL, single-use input proofs
//!   and authorized user decryption with re-encryption.
//! - **Devnet**: wires both together behind the client's contract and
//!   co-processor seams, with JSON persistence.
//!
//! ## Design Principles
//!
//! 1. All balance arithmetic is checked; reverts leave state untouched.
//! 2. Revert reasons are the contract's own messages.
//! 3. Only handles leave the co-processor. Values come back sealed to the
//!    requester's session key.

pub mod coprocessor;
pub mod devnet;
pub mod fhe_vault;

pub use coprocessor::{CiphertextStore, CoprocessorRejection};
pub use devnet::{Devnet, DevnetError, DevnetState};
pub use fhe_vault::{FheVault, VaultAccount, VaultRevert};

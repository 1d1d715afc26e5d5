//! # FHE Co-processor Seam
//!
//! The co-processor holds ciphertexts and performs the two operations the
//! client needs:
//!
//! - **encrypt**: turn a plaintext into a handle plus an input proof, bound
//!   to one (contract, user) pair.
//! - **user_decrypt**: given a signed, time-bounded authorization, hand
//!   back the cleartexts of handles the user may read.
//!
//! Input construction uses a small builder (`create_encrypted_input`, then
//! `add64`, then `encrypt`), mirroring the relayer SDK's chainable API.

pub mod input;
pub mod session;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::crypto::ephemeral::AuthorizationKeypair;
use crate::types::{Address, Handle, HandleContractPair};

pub use input::EncryptedInputBuilder;
pub use session::FheSession;

/// Errors reported by a co-processor implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoprocessorError {
    /// The co-processor refused the request (bad proof, ACL, expired, ...).
    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Plaintext values queued for encryption under one (contract, user) pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedInputBuffer {
    pub contract: Address,
    pub user: Address,
    pub values: Vec<u64>,
}

impl EncryptedInputBuffer {
    pub fn new(contract: Address, user: Address) -> Self {
        Self {
            contract,
            user,
            values: Vec::new(),
        }
    }

    /// Queues a 64-bit value.
    pub fn add64(mut self, value: u64) -> Self {
        self.values.push(value);
        self
    }
}

/// Result of encrypting a buffer: one handle per queued value and a single
/// proof covering all of them.
#[derive(Debug, PartialEq, Eq)]
pub struct EncryptedBatch {
    pub handles: Vec<Handle>,
    pub input_proof: Vec<u8>,
}

/// Everything the decryption endpoint needs for one request.
#[derive(Debug)]
pub struct UserDecryptRequest<'a> {
    pub pairs: &'a [HandleContractPair],
    /// Session keypair. The endpoint seals answers to its public half and
    /// the SDK opens them with the private half.
    pub keypair: &'a AuthorizationKeypair,
    /// Hex signature over the authorization message, no `0x` prefix.
    pub signature_hex: &'a str,
    pub contracts: &'a [Address],
    pub user: Address,
    pub start_timestamp: u64,
    pub duration_days: u64,
}

/// The FHE co-processor plus its client-side SDK.
#[async_trait]
pub trait FheCoprocessor: Send + Sync {
    fn create_encrypted_input(&self, contract: Address, user: Address) -> EncryptedInputBuffer {
        EncryptedInputBuffer::new(contract, user)
    }

    async fn encrypt(&self, buffer: EncryptedInputBuffer) -> Result<EncryptedBatch, CoprocessorError>;

    /// Returns handle → decimal-string cleartext for every handle the
    /// request was authorized for.
    async fn user_decrypt(
        &self,
        request: UserDecryptRequest<'_>,
    ) -> Result<HashMap<Handle, String>, CoprocessorError>;
}

//! # Devnet
//!
//! A single-process chain hosting one [`FheVault`] and its co-processor.
//! Implements both client seams, [`VaultContract`] and [`FheCoprocessor`],
//! so the protocol core runs against it unchanged.
//!
//! Each mutating call is one transaction: it executes against copies of the
//! vault and the ciphertext store, and the copies are committed only if the
//! call did not revert. A committed call mines one block.
//!
//! The whole chain state is plain serde data and can be saved to and loaded
//! from a JSON file between CLI invocations.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use fhevault_protocol::chain::{ContractError, VaultContract};
use fhevault_protocol::clock::Clock;
use fhevault_protocol::config::ClientConfig;
use fhevault_protocol::crypto::hash::blake3_hash;
use fhevault_protocol::crypto::typed_data::TypedDomain;
use fhevault_protocol::fhe::{
    CoprocessorError, EncryptedBatch, EncryptedInputBuffer, FheCoprocessor, UserDecryptRequest,
};
use fhevault_protocol::types::{Address, Handle, LockInfo, LockRequest, TxReceipt, TxStatus};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::coprocessor::CiphertextStore;
use crate::fhe_vault::{FheVault, VaultRevert};

/// Errors loading or saving devnet state.
#[derive(Debug, Error)]
pub enum DevnetError {
    #[error("devnet state I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("devnet state is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("devnet state belongs to vault {found}, config expects {expected}")]
    VaultMismatch { expected: Address, found: Address },
}

/// Everything the devnet persists.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DevnetState {
    pub chain_id: u64,
    pub block_number: u64,
    pub vault: FheVault,
    pub coprocessor: CiphertextStore,
}

impl DevnetState {
    pub fn genesis(config: &ClientConfig) -> Self {
        Self {
            chain_id: config.chain_id,
            block_number: 0,
            vault: FheVault::new(config.vault_address),
            coprocessor: CiphertextStore::new(),
        }
    }
}

/// In-process chain with the vault deployed.
pub struct Devnet {
    state: Mutex<DevnetState>,
    domain: TypedDomain,
    clock: Arc<dyn Clock>,
}

impl Devnet {
    pub fn new(config: &ClientConfig, clock: Arc<dyn Clock>) -> Self {
        Self::from_state(DevnetState::genesis(config), config, clock)
    }

    pub fn from_state(state: DevnetState, config: &ClientConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(state),
            domain: config.decryption_domain(),
            clock,
        }
    }

    /// Loads state from `path`, or starts from genesis if the file is absent.
    pub fn load_or_create(
        path: &Path,
        config: &ClientConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, DevnetError> {
        if !path.exists() {
            info!(path = %path.display(), "no devnet state found, starting from genesis");
            return Ok(Self::new(config, clock));
        }
        let state: DevnetState = serde_json::from_str(&fs::read_to_string(path)?)?;
        if state.vault.address() != config.vault_address {
            return Err(DevnetError::VaultMismatch {
                expected: config.vault_address,
                found: state.vault.address(),
            });
        }
        debug!(path = %path.display(), block = state.block_number, "devnet state loaded");
        Ok(Self::from_state(state, config, clock))
    }

    pub fn save(&self, path: &Path) -> Result<(), DevnetError> {
        let json = serde_json::to_string_pretty(&*self.state.lock())?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn block_number(&self) -> u64 {
        self.state.lock().block_number
    }

    pub fn chain_id(&self) -> u64 {
        self.state.lock().chain_id
    }

    /// Address that signs input proofs.
    pub fn kms_address(&self) -> Address {
        self.state.lock().coprocessor.kms_address()
    }

    /// Runs one transaction. Reverts leave the state untouched.
    fn transact<F>(&self, from: Address, method: &str, call: F) -> Result<TxReceipt, ContractError>
    where
        F: FnOnce(&mut FheVault, &mut CiphertextStore, u64) -> Result<(), VaultRevert>,
    {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let mut vault = state.vault.clone();
        let mut store = state.coprocessor.clone();

        if let Err(revert) = call(&mut vault, &mut store, now) {
            warn!(%from, method, reason = %revert, "transaction reverted");
            return Err(ContractError::Reverted(revert.to_string()));
        }

        state.vault = vault;
        state.coprocessor = store;
        state.block_number += 1;

        let mut preimage = Vec::new();
        preimage.extend_from_slice(&state.chain_id.to_be_bytes());
        preimage.extend_from_slice(&state.block_number.to_be_bytes());
        preimage.extend_from_slice(from.as_bytes());
        preimage.extend_from_slice(method.as_bytes());
        let receipt = TxReceipt {
            tx_hash: format!("0x{}", hex::encode(blake3_hash(&preimage))),
            block_number: state.block_number,
            status: TxStatus::Success,
        };
        info!(%from, method, block = receipt.block_number, tx = %receipt.tx_hash, "transaction mined");
        Ok(receipt)
    }
}

#[async_trait]
impl VaultContract for Devnet {
    fn address(&self) -> Address {
        self.state.lock().vault.address()
    }

    async fn stake(&self, from: Address, value: u64) -> Result<TxReceipt, ContractError> {
        self.transact(from, "stake", |vault, store, _| vault.stake(store, from, value))
    }

    async fn redeem(&self, from: Address, amount: u64) -> Result<TxReceipt, ContractError> {
        self.transact(from, "redeem", |vault, store, _| vault.redeem(store, from, amount))
    }

    async fn lock(&self, from: Address, request: LockRequest) -> Result<TxReceipt, ContractError> {
        let LockRequest {
            plain_amount,
            duration_secs,
            input,
        } = request;
        self.transact(from, "lock", |vault, store, now| {
            vault.lock(
                store,
                from,
                plain_amount,
                duration_secs,
                input.handle,
                &input.proof,
                now,
            )
        })
    }

    async fn release_lock(&self, from: Address) -> Result<TxReceipt, ContractError> {
        self.transact(from, "releaseLock", |vault, _, now| vault.release_lock(from, now))
    }

    async fn get_available_balance(&self, account: Address) -> Result<u64, ContractError> {
        Ok(self.state.lock().vault.get_available_balance(&account))
    }

    async fn get_lock_info(&self, account: Address) -> Result<LockInfo, ContractError> {
        Ok(self.state.lock().vault.get_lock_info(&account))
    }

    async fn can_release(&self, account: Address) -> Result<bool, ContractError> {
        let now = self.clock.now();
        Ok(self.state.lock().vault.can_release(&account, now))
    }

    async fn get_encrypted_balance(&self, account: Address) -> Result<Handle, ContractError> {
        Ok(self.state.lock().vault.get_encrypted_balance(&account))
    }
}

#[async_trait]
impl FheCoprocessor for Devnet {
    async fn encrypt(&self, buffer: EncryptedInputBuffer) -> Result<EncryptedBatch, CoprocessorError> {
        if buffer.values.is_empty() {
            return Err(CoprocessorError::Rejected("nothing to encrypt".into()));
        }
        let (handles, input_proof) =
            self.state
                .lock()
                .coprocessor
                .encrypt_input(buffer.contract, buffer.user, &buffer.values);
        debug!(contract = %buffer.contract, user = %buffer.user, count = handles.len(), "input encrypted");
        Ok(EncryptedBatch {
            handles,
            input_proof,
        })
    }

    async fn user_decrypt(
        &self,
        request: UserDecryptRequest<'_>,
    ) -> Result<HashMap<Handle, String>, CoprocessorError> {
        let now = self.clock.now();
        let sealed = self
            .state
            .lock()
            .coprocessor
            .user_decrypt(
                &self.domain,
                request.pairs,
                request.keypair.public_key_bytes(),
                request.signature_hex,
                request.contracts,
                request.user,
                request.start_timestamp,
                request.duration_days,
                now,
            )
            .map_err(|e| {
                warn!(user = %request.user, reason = %e, "user decryption refused");
                CoprocessorError::Rejected(e.to_string())
            })?;

        // SDK side: open every sealed answer with the session key.
        let mut cleartexts = HashMap::with_capacity(sealed.len());
        for (handle, value) in sealed {
            let bytes = request
                .keypair
                .open(&value, handle.as_bytes())
                .map_err(|e| CoprocessorError::Rejected(e.to_string()))?;
            let text = String::from_utf8(bytes)
                .map_err(|_| CoprocessorError::Rejected("cleartext is not UTF-8".into()))?;
            cleartexts.insert(handle, text);
        }
        Ok(cleartexts)
    }
}

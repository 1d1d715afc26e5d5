//! # Simulated FHE Co-processor
//!
//! Holds "ciphertexts" as plaintext `u64`s behind opaque handles. The
//! scheme's mathematics are out of scope; what this simulates is everything
//! around it that the client depends on:
//!
//! - **Handles** are fresh per operation. Adding to a balance yields a new
//!   handle, just as on a real FHE chain.
//! - **ACL**: a handle can be decrypted only by addresses that were allowed
//!   on it, and only through a contract also allowed on it.
//! - **Input proofs** are signed by the co-processor key and bound to
//!   (contract, user, handles). Each input handle verifies exactly once.
//! - **User decryption** checks the validity window, the typed-data
//!   signature, the contract scope and the ACL, then seals each value to
//!   the requester's ephemeral key.
//!
//! Arithmetic wraps modulo 2^64 like `euint64`.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use fhevault_protocol::config::{MAX_AUTHORIZATION_VALIDITY_DAYS, SECONDS_PER_DAY};
use fhevault_protocol::crypto::ephemeral::{seal_to, SealedValue};
use fhevault_protocol::crypto::hash::{blake3_hash, sha256_concat};
use fhevault_protocol::crypto::keys::WalletKeypair;
use fhevault_protocol::crypto::signatures::{RecoverableSignature, RECOVERABLE_SIGNATURE_LENGTH};
use fhevault_protocol::crypto::typed_data::{TypedDomain, TypedMessage};
use fhevault_protocol::types::{Address, Handle, HandleContractPair};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Domain tag of input-proof digests.
const INPUT_PROOF_TAG: &[u8] = b"fhevault/input-proof/v1";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why the co-processor refused a request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoprocessorRejection {
    #[error("malformed input proof")]
    MalformedProof,

    #[error("input proof was not issued for this contract and sender")]
    InvalidProof,

    #[error("handle {0} is not covered by the input proof")]
    HandleNotInProof(Handle),

    #[error("encrypted input {0} was already used")]
    InputAlreadyUsed(Handle),

    #[error("validity window of {0} days is not accepted")]
    InvalidValidity(u64),

    #[error("authorization not valid before {0}")]
    NotYetValid(u64),

    #[error("authorization expired at {0}")]
    Expired(u64),

    #[error("signature does not belong to {0}")]
    SignatureMismatch(Address),

    #[error("contract {0} is outside the signed scope")]
    ContractNotInScope(Address),

    #[error("{user} is not allowed to decrypt {handle}")]
    NotAllowed { user: Address, handle: Handle },

    #[error("unknown handle {0}")]
    UnknownHandle(Handle),

    #[error("re-encryption failed")]
    SealFailed,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Ciphertext store, ACL and input registry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CiphertextStore {
    kms_seed: [u8; 32],
    counter: u64,
    ciphertexts: BTreeMap<Handle, u64>,
    acl: BTreeMap<Handle, BTreeSet<Address>>,
    unused_inputs: BTreeSet<Handle>,
}

impl CiphertextStore {
    pub fn new() -> Self {
        let mut kms_seed = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut kms_seed);
        Self::with_kms_seed(kms_seed)
    }

    pub fn with_kms_seed(kms_seed: [u8; 32]) -> Self {
        Self {
            kms_seed,
            counter: 0,
            ciphertexts: BTreeMap::new(),
            acl: BTreeMap::new(),
            unused_inputs: BTreeSet::new(),
        }
    }

    fn kms_key(&self) -> WalletKeypair {
        WalletKeypair::from_seed(&self.kms_seed)
    }

    /// Address input proofs are signed by.
    pub fn kms_address(&self) -> Address {
        self.kms_key().address()
    }

    pub fn len(&self) -> usize {
        self.ciphertexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ciphertexts.is_empty()
    }

    fn mint(&mut self, value: u64, tag: &[u8]) -> Handle {
        self.counter += 1;
        let mut material = Vec::with_capacity(tag.len() + 8);
        material.extend_from_slice(tag);
        material.extend_from_slice(&self.counter.to_be_bytes());
        let handle = Handle::from_bytes(blake3_hash(&material));
        self.ciphertexts.insert(handle, value);
        handle
    }

    // -- arithmetic ---------------------------------------------------------

    /// Encrypts a public constant.
    pub fn trivial(&mut self, value: u64) -> Handle {
        self.mint(value, b"trivial")
    }

    pub fn add_plain(&mut self, handle: Handle, value: u64) -> Handle {
        let current = self.ciphertexts.get(&handle).copied().unwrap_or(0);
        self.mint(current.wrapping_add(value), b"add")
    }

    pub fn sub_plain(&mut self, handle: Handle, value: u64) -> Handle {
        let current = self.ciphertexts.get(&handle).copied().unwrap_or(0);
        self.mint(current.wrapping_sub(value), b"sub")
    }

    // -- ACL ----------------------------------------------------------------

    pub fn allow(&mut self, handle: Handle, account: Address) {
        self.acl.entry(handle).or_default().insert(account);
    }

    pub fn is_allowed(&self, handle: &Handle, account: &Address) -> bool {
        self.acl
            .get(handle)
            .map(|allowed| allowed.contains(account))
            .unwrap_or(false)
    }

    // -- inputs -------------------------------------------------------------

    fn input_digest(contract: &Address, user: &Address, handles: &[u8]) -> [u8; 32] {
        sha256_concat(&[INPUT_PROOF_TAG, contract.as_bytes(), user.as_bytes(), handles])
    }

    /// Encrypts `values` for `user` calling `contract`. Returns the handles
    /// and a proof `signature || handle_0 || handle_1 || ...`.
    pub fn encrypt_input(
        &mut self,
        contract: Address,
        user: Address,
        values: &[u64],
    ) -> (Vec<Handle>, Vec<u8>) {
        let handles: Vec<Handle> = values.iter().map(|v| self.mint(*v, b"input")).collect();
        let encoded: Vec<u8> = handles.iter().flat_map(|h| *h.as_bytes()).collect();
        let signature = self
            .kms_key()
            .sign_digest(&Self::input_digest(&contract, &user, &encoded));

        let mut proof = signature.to_bytes();
        proof.extend_from_slice(&encoded);
        self.unused_inputs.extend(handles.iter().copied());
        (handles, proof)
    }

    /// Verifies and consumes an encrypted input, granting `contract` access.
    pub fn verify_input(
        &mut self,
        handle: Handle,
        proof: &[u8],
        contract: Address,
        user: Address,
    ) -> Result<Handle, CoprocessorRejection> {
        if proof.len() <= RECOVERABLE_SIGNATURE_LENGTH
            || (proof.len() - RECOVERABLE_SIGNATURE_LENGTH) % 32 != 0
        {
            return Err(CoprocessorRejection::MalformedProof);
        }
        let (sig_bytes, encoded) = proof.split_at(RECOVERABLE_SIGNATURE_LENGTH);
        let signature = RecoverableSignature::from_bytes(sig_bytes)
            .map_err(|_| CoprocessorRejection::MalformedProof)?;
        let signer = signature
            .recover(&Self::input_digest(&contract, &user, encoded))
            .map_err(|_| CoprocessorRejection::InvalidProof)?;
        if signer != self.kms_address() {
            return Err(CoprocessorRejection::InvalidProof);
        }
        if !encoded.chunks(32).any(|chunk| chunk == handle.as_bytes()) {
            return Err(CoprocessorRejection::HandleNotInProof(handle));
        }
        if !self.unused_inputs.remove(&handle) {
            return Err(CoprocessorRejection::InputAlreadyUsed(handle));
        }
        self.allow(handle, contract);
        Ok(handle)
    }

    // -- user decryption ----------------------------------------------------

    /// Validates a user-decrypt request and seals each requested value to
    /// `public_key`.
    #[allow(clippy::too_many_arguments)]
    pub fn user_decrypt(
        &self,
        domain: &TypedDomain,
        pairs: &[HandleContractPair],
        public_key: [u8; 32],
        signature_hex: &str,
        contracts: &[Address],
        user: Address,
        start_timestamp: u64,
        duration_days: u64,
        now: u64,
    ) -> Result<HashMap<Handle, SealedValue>, CoprocessorRejection> {
        if duration_days == 0 || duration_days > MAX_AUTHORIZATION_VALIDITY_DAYS {
            return Err(CoprocessorRejection::InvalidValidity(duration_days));
        }
        if now < start_timestamp {
            return Err(CoprocessorRejection::NotYetValid(start_timestamp));
        }
        let expires_at = start_timestamp.saturating_add(duration_days * SECONDS_PER_DAY);
        if now > expires_at {
            return Err(CoprocessorRejection::Expired(expires_at));
        }

        let message = TypedMessage::user_decrypt(
            domain.clone(),
            public_key,
            contracts.to_vec(),
            start_timestamp,
            duration_days,
        );
        let recovered = RecoverableSignature::from_hex(signature_hex)
            .and_then(|sig| sig.recover(&message.signing_hash()))
            .map_err(|_| CoprocessorRejection::SignatureMismatch(user))?;
        if recovered != user {
            return Err(CoprocessorRejection::SignatureMismatch(user));
        }

        let mut sealed = HashMap::with_capacity(pairs.len());
        for pair in pairs {
            if !contracts.contains(&pair.contract_address) {
                return Err(CoprocessorRejection::ContractNotInScope(pair.contract_address));
            }
            if !self.is_allowed(&pair.handle, &user)
                || !self.is_allowed(&pair.handle, &pair.contract_address)
            {
                return Err(CoprocessorRejection::NotAllowed {
                    user,
                    handle: pair.handle,
                });
            }
            let value = self
                .ciphertexts
                .get(&pair.handle)
                .ok_or(CoprocessorRejection::UnknownHandle(pair.handle))?;
            let value = seal_to(&public_key, value.to_string().as_bytes(), pair.handle.as_bytes())
                .map_err(|_| CoprocessorRejection::SealFailed)?;
            sealed.insert(pair.handle, value);
        }
        Ok(sealed)
    }
}

impl Default for CiphertextStore {
    fn default() -> Self {
        Self::new()
    }
}

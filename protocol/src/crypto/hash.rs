//! # Hashing Utilities
//!
//! Two hash functions, no more:
//!
//! - **SHA-256** for everything that gets signed: the typed-data digest of
//!   decryption authorizations and the co-processor's input proofs.
//! - **BLAKE3** for identifiers (addresses, handles, transaction hashes)
//!   and, in `derive_key` mode, as the KDF for re-encryption keys.

use sha2::{Digest, Sha256};

/// SHA-256 of `data` as a fixed-size array.
pub fn sha256_array(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// SHA-256 over the concatenation of several byte slices, without
/// allocating the concatenation.
pub fn sha256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// BLAKE3 of `data`.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// BLAKE3 in key-derivation mode with a domain-separating context string.
pub fn derive_key(context: &str, material: &[u8]) -> [u8; 32] {
    blake3::derive_key(context, material)
}

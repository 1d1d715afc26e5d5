//! # Ephemeral Authorization Keys & Re-encryption
//!
//! A user-decrypt session never receives plaintext in the clear. The client
//! generates a throwaway X25519 [`AuthorizationKeypair`], signs its public
//! half into the authorization statement, and the co-processor seals every
//! decrypted value to that public key. Only the session holding the private
//! half can open the answers.
//!
//! ## Sealing
//!
//! 1. The sealer generates its own one-shot X25519 secret.
//! 2. DH against the recipient's public key gives a shared secret.
//! 3. BLAKE3 `derive_key` with [`REENCRYPTION_CONTEXT`] turns it into an
//!    AES-256 key. Raw DH output never touches the cipher.
//! 4. AES-256-GCM encrypts the value with the ciphertext handle as AAD.
//!
//! ## Lifetime
//!
//! [`AuthorizationKeypair`] is neither `Clone` nor serializable. It lives
//! inside one decryption session and is dropped with it, success or not.

use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

use super::encryption::{decrypt_with_aad, encrypt_with_aad, AES_NONCE_LENGTH};
use super::hash::derive_key;

/// KDF context for re-encryption keys.
pub const REENCRYPTION_CONTEXT: &str = "fhevault 2026 user-decrypt reencryption v1";

/// Errors while sealing or opening re-encrypted values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReencryptionError {
    #[error("sealing failed")]
    SealFailed,

    #[error("sealed value could not be opened with this session key")]
    OpenFailed,
}

/// A value sealed to an authorization public key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedValue {
    pub ephemeral_public: [u8; 32],
    pub nonce: [u8; AES_NONCE_LENGTH],
    pub ciphertext: Vec<u8>,
}

/// The per-session keypair a decryption authorization is bound to.
pub struct AuthorizationKeypair {
    secret: StaticSecret,
    public: PublicKey,
}

impl AuthorizationKeypair {
    /// Fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.public.to_bytes()
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public.as_bytes())
    }

    /// Opens a value sealed to this keypair. `aad` must match the sealer's.
    pub fn open(&self, sealed: &SealedValue, aad: &[u8]) -> Result<Vec<u8>, ReencryptionError> {
        let peer = PublicKey::from(sealed.ephemeral_public);
        let shared = self.secret.diffie_hellman(&peer);
        if !shared.was_contributory() {
            return Err(ReencryptionError::OpenFailed);
        }
        let key = derive_key(REENCRYPTION_CONTEXT, shared.as_bytes());
        decrypt_with_aad(&key, &sealed.nonce, &sealed.ciphertext, aad)
            .map_err(|_| ReencryptionError::OpenFailed)
    }
}

impl fmt::Debug for AuthorizationKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthorizationKeypair(public={})", self.public_key_hex())
    }
}

/// Seals `plaintext` to `recipient` (an [`AuthorizationKeypair`] public key).
pub fn seal_to(
    recipient: &[u8; 32],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<SealedValue, ReencryptionError> {
    let secret = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&secret).to_bytes();
    let shared = secret.diffie_hellman(&PublicKey::from(*recipient));
    if !shared.was_contributory() {
        return Err(ReencryptionError::SealFailed);
    }
    let key = derive_key(REENCRYPTION_CONTEXT, shared.as_bytes());
    let (nonce, ciphertext) =
        encrypt_with_aad(&key, plaintext, aad).map_err(|_| ReencryptionError::SealFailed)?;
    Ok(SealedValue {
        ephemeral_public,
        nonce,
        ciphertext,
    })
}

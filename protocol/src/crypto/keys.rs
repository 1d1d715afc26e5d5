//! # Wallet Keys
//!
//! Ed25519 keypairs standing in for the user's wallet key and for the
//! devnet co-processor's proof-signing key.
//!
//! An account address is derived from the verifying key (see
//! [`Address::from_public_key`]), and every signature produced here embeds
//! the verifying key so that a verifier can recover the signing address,
//! the way `ecrecover` does on EVM chains.
//!
//! Key bytes are never logged. `Debug` prints the address only.

use ed25519_dalek::{Signer as _, SigningKey, SECRET_KEY_LENGTH};
use rand::rngs::OsRng;
use std::fmt;
use thiserror::Error;

use super::signatures::RecoverableSignature;
use crate::types::Address;

/// Errors that can occur during key operations.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key bytes: wrong length or not hex")]
    InvalidSecretKey,
}

/// An Ed25519 signing keypair with an associated account address.
///
/// Intentionally not `Serialize`: exporting secret material goes through
/// [`WalletKeypair::secret_key_hex`] and nowhere else.
pub struct WalletKeypair {
    signing_key: SigningKey,
}

impl WalletKeypair {
    /// Generates a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Builds a keypair deterministically from a 32-byte seed.
    pub fn from_seed(seed: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Parses a hex-encoded secret key, with or without `0x`.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let trimmed = hex_str.trim();
        let stripped = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(stripped).map_err(|_| KeyError::InvalidSecretKey)?;
        let seed: [u8; SECRET_KEY_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self::from_seed(&seed))
    }

    /// The raw secret key as hex. Handle with care.
    pub fn secret_key_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Account address controlled by this key.
    pub fn address(&self) -> Address {
        Address::from_public_key(&self.public_key_bytes())
    }

    /// Signs a 32-byte digest, embedding the verifying key in the result.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> RecoverableSignature {
        let signature = self.signing_key.sign(digest);
        RecoverableSignature::from_parts(self.public_key_bytes(), signature.to_bytes())
    }
}

impl Clone for WalletKeypair {
    fn clone(&self) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&self.signing_key.to_bytes()),
        }
    }
}

impl fmt::Debug for WalletKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WalletKeypair(address={})", self.address())
    }
}

//! # Recoverable Signatures
//!
//! An Ed25519 signature packed together with the verifying key that made
//! it: `public_key (32) || signature (64)`. Verifying a digest against it
//! yields the signer's [`Address`], which the caller then compares with the
//! address it expected. This is how the co-processor checks that an
//! authorization was signed by the account whose data it releases.

use ed25519_dalek::{Signature as DalekSignature, Verifier, VerifyingKey};
use thiserror::Error;

use crate::types::Address;

/// Encoded length: 32-byte key plus 64-byte signature.
pub const RECOVERABLE_SIGNATURE_LENGTH: usize = 96;

/// Errors during signature decoding and recovery.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature verification failed")]
    VerificationFailed,

    #[error("invalid signature bytes: expected {RECOVERABLE_SIGNATURE_LENGTH} bytes")]
    InvalidSignatureBytes,

    #[error("invalid public key")]
    InvalidPublicKey,
}

/// A signature from which the signing address can be recovered.
#[derive(Clone, PartialEq, Eq)]
pub struct RecoverableSignature {
    public_key: [u8; 32],
    signature: [u8; 64],
}

impl RecoverableSignature {
    pub fn from_parts(public_key: [u8; 32], signature: [u8; 64]) -> Self {
        Self {
            public_key,
            signature,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignatureError> {
        if bytes.len() != RECOVERABLE_SIGNATURE_LENGTH {
            return Err(SignatureError::InvalidSignatureBytes);
        }
        let mut public_key = [0u8; 32];
        let mut signature = [0u8; 64];
        public_key.copy_from_slice(&bytes[..32]);
        signature.copy_from_slice(&bytes[32..]);
        Ok(Self::from_parts(public_key, signature))
    }

    /// Parses hex, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, SignatureError> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped).map_err(|_| SignatureError::InvalidSignatureBytes)?;
        Self::from_bytes(&bytes)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(RECOVERABLE_SIGNATURE_LENGTH);
        out.extend_from_slice(&self.public_key);
        out.extend_from_slice(&self.signature);
        out
    }

    /// Hex without the `0x` prefix, the shape the decryption endpoint takes.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Verifies the signature over `digest` and returns the signer's address.
    pub fn recover(&self, digest: &[u8; 32]) -> Result<Address, SignatureError> {
        let verifying_key = VerifyingKey::from_bytes(&self.public_key)
            .map_err(|_| SignatureError::InvalidPublicKey)?;
        let signature = DalekSignature::from_bytes(&self.signature);
        verifying_key
            .verify(digest, &signature)
            .map_err(|_| SignatureError::VerificationFailed)?;
        Ok(Address::from_public_key(&self.public_key))
    }
}

impl std::fmt::Debug for RecoverableSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "RecoverableSignature(signer={})",
            Address::from_public_key(&self.public_key)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::sha256_array;
    use crate::crypto::keys::WalletKeypair;

    #[test]
    fn recover_returns_signer_address() {
        let kp = WalletKeypair::generate();
        let digest = sha256_array(b"authorize decryption");
        let sig = kp.sign_digest(&digest);
        assert_eq!(sig.recover(&digest).unwrap(), kp.address());
    }

    #[test]
    fn recover_fails_on_other_digest() {
        let kp = WalletKeypair::generate();
        let sig = kp.sign_digest(&sha256_array(b"one"));
        assert_eq!(
            sig.recover(&sha256_array(b"two")),
            Err(SignatureError::VerificationFailed)
        );
    }

    #[test]
    fn swapped_public_key_does_not_verify() {
        let alice = WalletKeypair::generate();
        let mallory = WalletKeypair::generate();
        let digest = sha256_array(b"payload");
        let sig = alice.sign_digest(&digest);
        let mut bytes = sig.to_bytes();
        bytes[..32].copy_from_slice(&mallory.public_key_bytes());
        let forged = RecoverableSignature::from_bytes(&bytes).unwrap();
        assert!(forged.recover(&digest).is_err());
    }

    #[test]
    fn hex_roundtrip_and_length_check() {
        let kp = WalletKeypair::generate();
        let sig = kp.sign_digest(&[9u8; 32]);
        let parsed = RecoverableSignature::from_hex(&sig.to_hex()).unwrap();
        assert_eq!(parsed, sig);
        assert_eq!(
            RecoverableSignature::from_hex("abcd"),
            Err(SignatureError::InvalidSignatureBytes)
        );
    }
}

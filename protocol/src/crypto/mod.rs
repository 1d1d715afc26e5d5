//! # Cryptographic Primitives
//!
//! Everything the decryption handshake needs and nothing more:
//!
//! - **Ed25519** wallet keys with address-recoverable signatures.
//! - **EIP-712-style** typed messages, hashed with SHA-256.
//! - **X25519** ephemeral authorization keys for re-encrypted answers.
//! - **AES-256-GCM** for the sealed values themselves.
//! - **BLAKE3** for identifiers and key derivation.
//!
//! All of it is thin wrappers over audited crates. The FHE scheme itself
//! lives behind the co-processor seam and never appears here.

pub mod encryption;
pub mod ephemeral;
pub mod hash;
pub mod keys;
pub mod signatures;
pub mod signer;
pub mod typed_data;

pub use ephemeral::{seal_to, AuthorizationKeypair, SealedValue};
pub use hash::{blake3_hash, sha256_array};
pub use keys::WalletKeypair;
pub use signatures::{RecoverableSignature, SignatureError};
pub use signer::{LocalSigner, Signer, SignerError};
pub use typed_data::{TypedDomain, TypedMessage};

//! The wallet seam: whoever can sign typed messages for an address.

use async_trait::async_trait;
use thiserror::Error;

use super::keys::WalletKeypair;
use super::signatures::RecoverableSignature;
use super::typed_data::TypedMessage;
use crate::types::Address;

/// Errors a wallet can report.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignerError {
    /// The user (or policy) declined to sign.
    #[error("signature request rejected: {0}")]
    Rejected(String),

    #[error("signer failure: {0}")]
    Failed(String),
}

/// A wallet able to produce structured signatures.
#[async_trait]
pub trait Signer: Send + Sync {
    fn address(&self) -> Address;

    async fn sign_typed_data(
        &self,
        message: &TypedMessage,
    ) -> Result<RecoverableSignature, SignerError>;
}

/// A signer holding its key in process memory.
#[derive(Clone, Debug)]
pub struct LocalSigner {
    keypair: WalletKeypair,
}

impl LocalSigner {
    pub fn new(keypair: WalletKeypair) -> Self {
        Self { keypair }
    }

    pub fn random() -> Self {
        Self::new(WalletKeypair::generate())
    }

    pub fn keypair(&self) -> &WalletKeypair {
        &self.keypair
    }
}

#[async_trait]
impl Signer for LocalSigner {
    fn address(&self) -> Address {
        self.keypair.address()
    }

    async fn sign_typed_data(
        &self,
        message: &TypedMessage,
    ) -> Result<RecoverableSignature, SignerError> {
        Ok(self.keypair.sign_digest(&message.signing_hash()))
    }
}

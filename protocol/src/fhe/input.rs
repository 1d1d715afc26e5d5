//! # Encrypted Input Construction
//!
//! Wraps one plaintext `u64` into an [`EncryptedInput`] (handle + proof)
//! for a specific (contract, user) pair.
//!
//! No local state is touched and nothing is retried: if encryption fails,
//! the caller decides whether to try again, and a retry always mints a
//! brand-new input.

use tracing::{debug, warn};

use super::FheSession;
use crate::error::{Result, VaultError};
use crate::types::{Address, EncryptedInput};

/// Builds encrypted inputs through the shared co-processor session.
#[derive(Clone, Debug)]
pub struct EncryptedInputBuilder {
    session: FheSession,
}

impl EncryptedInputBuilder {
    pub fn new(session: FheSession) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &FheSession {
        &self.session
    }

    /// Encrypts `amount` for use by `user` in a call to `contract`.
    pub async fn build(
        &self,
        contract: Address,
        user: Address,
        amount: u64,
    ) -> Result<EncryptedInput> {
        let coprocessor = self
            .session
            .instance()
            .ok_or(VaultError::EncryptionUnavailable)?;

        let buffer = coprocessor.create_encrypted_input(contract, user).add64(amount);
        let batch = coprocessor.encrypt(buffer).await.map_err(|e| {
            warn!(%contract, %user, error = %e, "input encryption failed");
            VaultError::EncryptionFailed(e.to_string())
        })?;

        if batch.handles.len() != 1 {
            return Err(VaultError::EncryptionFailed(format!(
                "expected 1 handle, co-processor returned {}",
                batch.handles.len()
            )));
        }
        let handle = batch.handles[0];
        if handle.is_zero() {
            return Err(VaultError::EncryptionFailed(
                "co-processor returned the zero handle".into(),
            ));
        }
        if batch.input_proof.is_empty() {
            return Err(VaultError::EncryptionFailed("empty input proof".into()));
        }

        debug!(%contract, %user, %handle, "encrypted input built");
        Ok(EncryptedInput {
            handle,
            proof: batch.input_proof,
        })
    }
}

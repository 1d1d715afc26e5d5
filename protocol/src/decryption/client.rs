//! # Decryption Client
//!
//! Exchanges a [`DecryptionSession`] for cleartexts.
//!
//! Guards applied before anything is sent:
//!
//! - the Zero sentinel handle is refused; callers short-circuit it to a
//!   known zero themselves;
//! - every handle's contract must be inside the statement's scope;
//! - an expired statement fails with `AuthorizationExpired` so the caller
//!   re-authorizes instead of submitting stale data.
//!
//! A handle missing from the response is `DecryptionIncomplete`, never a
//! silent zero. The session is consumed either way: its keypair is dropped
//! when this call returns.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use super::authorizer::DecryptionSession;
use crate::clock::Clock;
use crate::error::{Result, VaultError};
use crate::fhe::{FheSession, UserDecryptRequest};
use crate::types::{Handle, HandleContractPair};

/// Cleartext per handle.
pub type DecryptedValues = HashMap<Handle, u64>;

/// Submits authorized decryption requests to the co-processor.
#[derive(Clone)]
pub struct DecryptionClient {
    session: FheSession,
    clock: Arc<dyn Clock>,
}

impl DecryptionClient {
    pub fn new(session: FheSession, clock: Arc<dyn Clock>) -> Self {
        Self { session, clock }
    }

    /// Decrypts `pairs` under `session`, returning one value per handle.
    pub async fn decrypt(
        &self,
        pairs: &[HandleContractPair],
        session: DecryptionSession,
    ) -> Result<DecryptedValues> {
        let DecryptionSession {
            id,
            keypair,
            statement,
        } = session;

        if pairs.is_empty() {
            return Ok(DecryptedValues::new());
        }
        if let Some(pair) = pairs.iter().find(|p| p.handle.is_zero()) {
            return Err(VaultError::DecryptionFailed(format!(
                "zero handle for contract {} cannot be decrypted",
                pair.contract_address
            )));
        }
        if let Some(pair) = pairs.iter().find(|p| !statement.covers(&p.contract_address)) {
            return Err(VaultError::DecryptionFailed(format!(
                "contract {} is outside the authorization scope",
                pair.contract_address
            )));
        }
        let now = self.clock.now();
        if statement.is_expired(now) {
            return Err(VaultError::AuthorizationExpired {
                expired_at: statement.expires_at(),
            });
        }

        let coprocessor = self.session.instance().ok_or_else(|| {
            VaultError::DecryptionFailed("co-processor session not initialized".into())
        })?;

        let signature_hex = statement.signature.to_hex();
        let response = coprocessor
            .user_decrypt(UserDecryptRequest {
                pairs,
                keypair: &keypair,
                signature_hex: &signature_hex,
                contracts: &statement.contract_scope,
                user: statement.user,
                start_timestamp: statement.valid_from,
                duration_days: statement.validity_duration_days,
            })
            .await
            .map_err(|e| {
                warn!(session = %id, user = %statement.user, error = %e, "user decryption failed");
                VaultError::DecryptionFailed(e.to_string())
            })?;

        let mut values = DecryptedValues::with_capacity(pairs.len());
        for pair in pairs {
            let raw = response
                .get(&pair.handle)
                .ok_or(VaultError::DecryptionIncomplete(pair.handle))?;
            let value = raw.trim().parse::<u64>().map_err(|_| {
                VaultError::DecryptionFailed(format!(
                    "cleartext for {} is not a uint64",
                    pair.handle
                ))
            })?;
            values.insert(pair.handle, value);
        }

        info!(session = %id, user = %statement.user, handles = values.len(), "decryption complete");
        Ok(values)
    }
}

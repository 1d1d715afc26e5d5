//! # Decryption Authorizer
//!
//! Opens a user-decrypt session:
//!
//! 1. generate a fresh [`AuthorizationKeypair`];
//! 2. take `valid_from` from the clock;
//! 3. build the typed authorization message binding the public key, the
//!    contract scope, `valid_from` and the validity window;
//! 4. ask the wallet to sign it.
//!
//! Every call yields a new keypair, even when an earlier statement is still
//! within its window. Sessions are never reused.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::{AUTHORIZATION_VALIDITY_DAYS, SECONDS_PER_DAY};
use crate::crypto::ephemeral::AuthorizationKeypair;
use crate::crypto::signatures::RecoverableSignature;
use crate::crypto::signer::Signer;
use crate::crypto::typed_data::{TypedDomain, TypedMessage};
use crate::error::{Result, VaultError};
use crate::types::Address;

/// A signed, time-bounded, contract-scoped decryption permission.
#[derive(Clone, Debug)]
pub struct AuthorizationStatement {
    pub public_key: [u8; 32],
    pub contract_scope: Vec<Address>,
    pub valid_from: u64,
    pub validity_duration_days: u64,
    /// Address that signed; the only account whose data this unlocks.
    pub user: Address,
    pub signature: RecoverableSignature,
}

impl AuthorizationStatement {
    pub fn expires_at(&self) -> u64 {
        self.valid_from
            .saturating_add(self.validity_duration_days.saturating_mul(SECONDS_PER_DAY))
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now > self.expires_at()
    }

    pub fn covers(&self, contract: &Address) -> bool {
        self.contract_scope.contains(contract)
    }
}

/// One decryption session: the keypair and the statement that authorizes
/// it. Consumed by [`DecryptionClient::decrypt`](super::DecryptionClient::decrypt).
#[derive(Debug)]
pub struct DecryptionSession {
    pub id: Uuid,
    pub keypair: AuthorizationKeypair,
    pub statement: AuthorizationStatement,
}

/// Produces decryption sessions under one typed-data domain.
pub struct DecryptionAuthorizer {
    domain: TypedDomain,
    validity_days: u64,
    clock: Arc<dyn Clock>,
}

impl DecryptionAuthorizer {
    pub fn new(domain: TypedDomain, clock: Arc<dyn Clock>) -> Self {
        Self {
            domain,
            validity_days: AUTHORIZATION_VALIDITY_DAYS,
            clock,
        }
    }

    pub fn with_validity_days(mut self, days: u64) -> Self {
        self.validity_days = days;
        self
    }

    pub fn domain(&self) -> &TypedDomain {
        &self.domain
    }

    pub fn validity_days(&self) -> u64 {
        self.validity_days
    }

    /// Authorizes decryption of handles owned by `contracts` for the
    /// signer's address.
    pub async fn authorize(
        &self,
        contracts: &[Address],
        signer: Option<&dyn Signer>,
    ) -> Result<DecryptionSession> {
        let signer = signer.ok_or(VaultError::SignerUnavailable)?;
        let user = signer.address();

        let mut scope: Vec<Address> = Vec::with_capacity(contracts.len());
        for contract in contracts {
            if !scope.contains(contract) {
                scope.push(*contract);
            }
        }

        let keypair = AuthorizationKeypair::generate();
        let valid_from = self.clock.now();
        let message = TypedMessage::user_decrypt(
            self.domain.clone(),
            keypair.public_key_bytes(),
            scope.clone(),
            valid_from,
            self.validity_days,
        );
        let digest = message.signing_hash();

        let id = Uuid::new_v4();
        debug!(session = %id, %user, contracts = scope.len(), "requesting authorization signature");

        let signature = signer.sign_typed_data(&message).await.map_err(|e| {
            warn!(session = %id, %user, error = %e, "authorization signature refused");
            VaultError::SignatureRejected(e.to_string())
        })?;

        match signature.recover(&digest) {
            Ok(recovered) if recovered == user => {}
            Ok(recovered) => {
                return Err(VaultError::SignatureRejected(format!(
                    "signature recovers to {}, expected {}",
                    recovered, user
                )))
            }
            Err(e) => return Err(VaultError::SignatureRejected(e.to_string())),
        }

        info!(session = %id, %user, valid_from, days = self.validity_days, "decryption authorized");
        Ok(DecryptionSession {
            id,
            keypair,
            statement: AuthorizationStatement {
                public_key: message.message.public_key,
                contract_scope: scope,
                valid_from,
                validity_duration_days: self.validity_days,
                user,
                signature,
            },
        })
    }
}

//! # Typed, Domain-Separated Messages
//!
//! The structured message a wallet signs to authorize user decryption,
//! modelled on EIP-712: a domain (name, version, chain id, verifying
//! contract) plus a typed payload, hashed as
//!
//! ```text
//! digest = H(0x19 0x01 || domainSeparator || structHash)
//! ```
//!
//! with `H` = SHA-256. Encoding follows the EIP-712 rules: static fields as
//! 32-byte big-endian words, dynamic `bytes`/`string` fields by their hash,
//! arrays by the hash of their concatenated encoded elements.
//!
//! A signature over one domain is worthless in any other, so an
//! authorization issued for one chain or verifier cannot be replayed
//! against another.

use serde::{Deserialize, Serialize};

use super::hash::{sha256_array, sha256_concat};
use crate::types::Address;

/// Type string of the domain struct.
pub const DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

/// Type string of the user-decrypt authorization payload.
pub const USER_DECRYPT_TYPE: &str = "UserDecryptRequestVerification(bytes publicKey,address[] contractAddresses,uint256 startTimestamp,uint256 durationDays,bytes extraData)";

/// Primary type name of the authorization payload.
pub const USER_DECRYPT_PRIMARY_TYPE: &str = "UserDecryptRequestVerification";

fn uint_word(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Domain of a typed message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedDomain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl TypedDomain {
    pub fn separator(&self) -> [u8; 32] {
        sha256_concat(&[
            &sha256_array(DOMAIN_TYPE.as_bytes()),
            &sha256_array(self.name.as_bytes()),
            &sha256_array(self.version.as_bytes()),
            &uint_word(self.chain_id),
            &self.verifying_contract.to_word(),
        ])
    }
}

/// Payload of a user-decrypt authorization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserDecryptRequestVerification {
    pub public_key: [u8; 32],
    pub contract_addresses: Vec<Address>,
    pub start_timestamp: u64,
    pub duration_days: u64,
    pub extra_data: Vec<u8>,
}

impl UserDecryptRequestVerification {
    pub fn struct_hash(&self) -> [u8; 32] {
        let addresses: Vec<u8> = self
            .contract_addresses
            .iter()
            .flat_map(|a| a.to_word())
            .collect();
        sha256_concat(&[
            &sha256_array(USER_DECRYPT_TYPE.as_bytes()),
            &sha256_array(&self.public_key),
            &sha256_array(&addresses),
            &uint_word(self.start_timestamp),
            &uint_word(self.duration_days),
            &sha256_array(&self.extra_data),
        ])
    }
}

/// A complete message ready for signing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypedMessage {
    pub domain: TypedDomain,
    pub message: UserDecryptRequestVerification,
}

impl TypedMessage {
    /// Builds the authorization message for a user-decrypt request.
    pub fn user_decrypt(
        domain: TypedDomain,
        public_key: [u8; 32],
        contract_addresses: Vec<Address>,
        start_timestamp: u64,
        duration_days: u64,
    ) -> Self {
        Self {
            domain,
            message: UserDecryptRequestVerification {
                public_key,
                contract_addresses,
                start_timestamp,
                duration_days,
                extra_data: Vec::new(),
            },
        }
    }

    pub fn primary_type(&self) -> &'static str {
        USER_DECRYPT_PRIMARY_TYPE
    }

    /// The 32-byte digest a wallet signs.
    pub fn signing_hash(&self) -> [u8; 32] {
        sha256_concat(&[
            &[0x19, 0x01],
            &self.domain.separator(),
            &self.message.struct_hash(),
        ])
    }
}

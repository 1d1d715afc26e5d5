//! # Client Configuration & Constants
//!
//! Every magic number of the vault client lives here: unit precision,
//! display precision, the authorization validity window, and the typed-data
//! domain the decryption handshake signs under.
//!
//! [`ClientConfig`] carries the per-deployment parameters (which vault, which
//! chain, which decryption verifier). It is plain serde data so the CLI can
//! keep it next to the wallet key as `config.json`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::amount::AmountCodec;
use crate::crypto::typed_data::TypedDomain;
use crate::types::Address;

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

/// Fractional digits of the native asset. 18, same as wei per ether.
pub const UNIT_DECIMALS: u32 = 18;

/// Fractional digits shown when formatting amounts for humans.
pub const DISPLAY_FRACTION_DIGITS: u32 = 6;

/// Largest amount the vault accounts in, `2^64 - 1` units.
pub const MAX_UNITS: u64 = u64::MAX;

/// Seconds in a day. Lock durations picked in days are converted with this.
pub const SECONDS_PER_DAY: u64 = 86_400;

// ---------------------------------------------------------------------------
// Decryption authorization
// ---------------------------------------------------------------------------

/// How long a signed user-decrypt authorization stays valid, in days.
pub const AUTHORIZATION_VALIDITY_DAYS: u64 = 7;

/// Upper bound on the validity window a co-processor will honour.
pub const MAX_AUTHORIZATION_VALIDITY_DAYS: u64 = 365;

/// Typed-data domain name of the decryption verifier.
pub const DECRYPTION_DOMAIN_NAME: &str = "Decryption";

/// Typed-data domain version of the decryption verifier.
pub const DECRYPTION_DOMAIN_VERSION: &str = "1";

// ---------------------------------------------------------------------------
// Networks
// ---------------------------------------------------------------------------

/// Chain id of the local development network.
pub const DEVNET_CHAIN_ID: u64 = 31_337;

/// Chain id of the Sepolia test network.
pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;

/// Seed the devnet vault address is derived from.
pub const DEVNET_VAULT_SEED: &[u8] = b"fhevault/devnet/vault";

/// Seed the devnet decryption verifier address is derived from.
pub const DEVNET_DECRYPTION_SEED: &[u8] = b"fhevault/devnet/decryption";

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

/// Capacity of the vault event broadcast channel. Slow subscribers lag
/// rather than block the controller.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Returns a friendly name for a chain id, mainly for logging.
pub fn network_name(chain_id: u64) -> String {
    match chain_id {
        DEVNET_CHAIN_ID => "devnet".to_string(),
        SEPOLIA_CHAIN_ID => "sepolia".to_string(),
        other => format!("chain-{}", other),
    }
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Errors raised while loading or saving a [`ClientConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Deployment parameters of one vault client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Address of the vault contract.
    pub vault_address: Address,
    /// Chain the vault lives on. Part of the authorization domain.
    pub chain_id: u64,
    /// Verifying contract of the user-decrypt typed-data domain.
    pub decryption_contract: Address,
    /// Fractional digits of the staked asset.
    #[serde(default = "default_unit_decimals")]
    pub unit_decimals: u32,
    /// Fractional digits kept when formatting amounts.
    #[serde(default = "default_display_digits")]
    pub display_fraction_digits: u32,
    /// Validity window of decryption authorizations, in days.
    #[serde(default = "default_validity_days")]
    pub authorization_validity_days: u64,
}

fn default_unit_decimals() -> u32 {
    UNIT_DECIMALS
}

fn default_display_digits() -> u32 {
    DISPLAY_FRACTION_DIGITS
}

fn default_validity_days() -> u64 {
    AUTHORIZATION_VALIDITY_DAYS
}

impl ClientConfig {
    /// Configuration of the local devnet.
    pub fn devnet() -> Self {
        Self {
            vault_address: Address::derive(DEVNET_VAULT_SEED),
            chain_id: DEVNET_CHAIN_ID,
            decryption_contract: Address::derive(DEVNET_DECRYPTION_SEED),
            unit_decimals: UNIT_DECIMALS,
            display_fraction_digits: DISPLAY_FRACTION_DIGITS,
            authorization_validity_days: AUTHORIZATION_VALIDITY_DAYS,
        }
    }

    /// Reads a JSON config file and validates it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read(path)?;
        let config: ClientConfig = serde_json::from_slice(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the config as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    /// Rejects parameter combinations the client cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 10^19 is the first power of ten above u64::MAX.
        if self.unit_decimals > 19 {
            return Err(ConfigError::Invalid(format!(
                "unit_decimals {} exceeds 19",
                self.unit_decimals
            )));
        }
        if self.display_fraction_digits > self.unit_decimals {
            return Err(ConfigError::Invalid(format!(
                "display_fraction_digits {} exceeds unit_decimals {}",
                self.display_fraction_digits, self.unit_decimals
            )));
        }
        if self.authorization_validity_days == 0
            || self.authorization_validity_days > MAX_AUTHORIZATION_VALIDITY_DAYS
        {
            return Err(ConfigError::Invalid(format!(
                "authorization_validity_days must be within 1..={}",
                MAX_AUTHORIZATION_VALIDITY_DAYS
            )));
        }
        if self.vault_address.is_zero() {
            return Err(ConfigError::Invalid("vault_address is zero".into()));
        }
        Ok(())
    }

    /// The typed-data domain decryption authorizations are signed under.
    pub fn decryption_domain(&self) -> TypedDomain {
        TypedDomain {
            name: DECRYPTION_DOMAIN_NAME.to_string(),
            version: DECRYPTION_DOMAIN_VERSION.to_string(),
            chain_id: self.chain_id,
            verifying_contract: self.decryption_contract,
        }
    }

    /// Amount codec matching this deployment's precision.
    pub fn codec(&self) -> AmountCodec {
        AmountCodec::new(self.unit_decimals, self.display_fraction_digits)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::devnet()
    }
}

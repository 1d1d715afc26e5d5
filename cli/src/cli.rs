//! # CLI Interface
//!
//! Argument structure of the `fhevault` binary, built with `clap` derive.
//! One subcommand per vault task; global flags pick the data directory and
//! logging setup.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use fhevault_protocol::Address;

use crate::logging::LogFormat;

/// FHE vault client.
///
/// Stakes into the vault, manages the time-lock and decrypts the confidential
/// balances of the local wallet against a devnet persisted in the data
/// directory.
#[derive(Parser, Debug)]
#[command(
    name = "fhevault",
    about = "FHE vault client",
    version,
    propagate_version = true
)]
pub struct FhevaultCli {
    /// Directory holding the config, the wallet key and the devnet state.
    #[arg(long, short = 'd', env = "FHEVAULT_DATA_DIR", default_value = ".fhevault", global = true)]
    pub data_dir: PathBuf,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,

    /// Default log filter when `RUST_LOG` is unset.
    #[arg(long, env = "FHEVAULT_LOG", default_value = "warn", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the data directory, a devnet config and a fresh wallet key.
    Init(InitArgs),
    /// Print the wallet address.
    Address,
    /// Stake native units into the vault.
    Stake(AmountArgs),
    /// Withdraw from the available balance.
    Redeem(AmountArgs),
    /// Print the plaintext available balance.
    GetAvailable(TargetArgs),
    /// Lock part of the available balance for a duration.
    Lock(LockArgs),
    /// Release a matured lock.
    ReleaseLock,
    /// Print the lock record.
    GetLock(TargetArgs),
    /// Print a summary of the wallet's position.
    Status,
    /// Decrypt the total confidential balance.
    DecryptBalance,
    /// Decrypt the locked amount.
    DecryptLock,
    /// Print version information and exit.
    Version,
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Replace an existing wallet key.
    #[arg(long)]
    pub force: bool,

    /// Hex-encoded wallet secret key to import instead of generating one.
    #[arg(long, env = "FHEVAULT_WALLET_KEY")]
    pub secret_key: Option<String>,
}

#[derive(Args, Debug)]
pub struct AmountArgs {
    /// Decimal amount, e.g. `1.5`.
    #[arg(long, short = 'a')]
    pub amount: String,
}

#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Account to query. Defaults to the wallet address.
    #[arg(long)]
    pub target: Option<Address>,
}

#[derive(Args, Debug)]
pub struct LockArgs {
    /// Decimal amount to lock.
    #[arg(long, short = 'a')]
    pub amount: String,

    /// Lock duration in seconds.
    #[arg(long, conflicts_with = "days", required_unless_present = "days")]
    pub duration: Option<u64>,

    /// Lock duration in days.
    #[arg(long)]
    pub days: Option<u64>,
}

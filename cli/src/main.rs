//! # fhevault
//!
//! Entry point of the `fhevault` binary. Parses arguments, sets up logging,
//! opens the data directory and runs one vault task against the devnet
//! stored there. Devnet state is written back after every task, including
//! failed ones, so nothing committed before a failure is lost.

mod cli;
mod logging;
mod workspace;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use fhevault_contracts::Devnet;
use fhevault_protocol::chain::VaultContract;
use fhevault_protocol::config::network_name;
use fhevault_protocol::crypto::keys::WalletKeypair;
use fhevault_protocol::crypto::signer::LocalSigner;
use fhevault_protocol::types::{LockDuration, LockInfo, TxReceipt};
use fhevault_protocol::{Address, Clock, FheSession, SystemClock, VaultController};

use cli::{Commands, FhevaultCli};
use workspace::Workspace;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = FhevaultCli::parse();
    logging::init_logging(&cli.log_level, cli.log_format);

    match cli.command {
        Commands::Init(args) => {
            let wallet = match args.secret_key {
                Some(hex) => WalletKeypair::from_hex(&hex).context("invalid --secret-key")?,
                None => WalletKeypair::generate(),
            };
            let ws = Workspace::init(&cli.data_dir, wallet, args.force)?;
            tracing::info!(account = %ws.wallet.address(), data_dir = %cli.data_dir.display(), "data directory initialized");

            println!("Vault client initialized.");
            println!("  Data directory : {}", cli.data_dir.display());
            println!("  Network        : {}", network_name(ws.config.chain_id));
            println!("  Vault          : {}", ws.config.vault_address);
            println!("  Wallet key     : {}", ws.key_path().display());
            println!("  Address        : {}", ws.wallet.address());
            Ok(())
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
        command => {
            let ws = Workspace::open(&cli.data_dir)?;
            run_task(ws, command).await
        }
    }
}

/// Loads the devnet, runs `command` and saves the devnet again.
async fn run_task(ws: Workspace, command: Commands) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let devnet_path = ws.devnet_path();
    let devnet = Arc::new(
        Devnet::load_or_create(&devnet_path, &ws.config, clock.clone())
            .with_context(|| format!("failed to load devnet state {}", devnet_path.display()))?,
    );

    let controller = VaultController::new(
        &ws.config,
        devnet.clone(),
        FheSession::ready(devnet.clone()),
        clock.clone(),
    );
    let account = ws.wallet.address();
    controller.connect(Arc::new(LocalSigner::new(ws.wallet)));

    let outcome = execute(&controller, &devnet, account, clock.as_ref(), command).await;

    devnet
        .save(&devnet_path)
        .with_context(|| format!("failed to save devnet state {}", devnet_path.display()))?;
    outcome
}

async fn execute(
    controller: &VaultController,
    devnet: &Devnet,
    account: Address,
    clock: &dyn Clock,
    command: Commands,
) -> Result<()> {
    match command {
        Commands::Address => {
            println!("{}", account);
        }
        Commands::Stake(args) => {
            let receipt = controller.stake(&args.amount).await?;
            print_receipt("Staked", &args.amount, &receipt);
        }
        Commands::Redeem(args) => {
            let receipt = controller.redeem(&args.amount).await?;
            print_receipt("Redeemed", &args.amount, &receipt);
        }
        Commands::GetAvailable(args) => {
            let target = args.target.unwrap_or(account);
            let units = devnet
                .get_available_balance(target)
                .await
                .context("getAvailableBalance failed")?;
            println!("Available balance of {}: {}", target, controller.format_amount(units));
        }
        Commands::Lock(args) => {
            let duration = match (args.duration, args.days) {
                (Some(secs), _) => LockDuration::from_secs(secs),
                (None, Some(days)) => LockDuration::from_days(days),
                (None, None) => LockDuration::from_secs(0),
            };
            let receipt = controller.lock(&args.amount, duration).await?;
            print_receipt("Locked", &args.amount, &receipt);
            if let Some(snapshot) = controller.snapshot() {
                if let Some(at) = snapshot.lock.unlock_at() {
                    println!("  Unlocks at : {}", at.to_rfc3339());
                }
            }
        }
        Commands::ReleaseLock => {
            let receipt = controller.release_lock().await?;
            println!("Lock released (tx {}, block {})", receipt.tx_hash, receipt.block_number);
        }
        Commands::GetLock(args) => {
            let target = args.target.unwrap_or(account);
            let lock = devnet
                .get_lock_info(target)
                .await
                .context("getLockInfo failed")?;
            let releasable = devnet
                .can_release(target)
                .await
                .context("canRelease failed")?;
            println!("Lock of {}:", target);
            print_lock(controller, &lock, releasable);
        }
        Commands::Status => {
            let snapshot = controller.refresh().await?;
            println!("Account        : {}", snapshot.account);
            println!("Block          : {}", devnet.block_number());
            println!("Phase          : {}", snapshot.phase(clock.now()));
            println!("Available      : {}", controller.format_amount(snapshot.available));
            println!("Encrypted total: {}", snapshot.encrypted_balance);
            print_lock(controller, &snapshot.lock, snapshot.can_release);
        }
        Commands::DecryptBalance => {
            let units = controller.decrypt_balance().await?;
            println!("Decrypted balance: {}", controller.format_amount(units));
        }
        Commands::DecryptLock => {
            let units = controller.decrypt_lock().await?;
            println!("Decrypted locked amount: {}", controller.format_amount(units));
        }
        Commands::Init(_) | Commands::Version => {
            anyhow::bail!("init and version do not run against the devnet")
        }
    }
    Ok(())
}

fn print_receipt(verb: &str, amount: &str, receipt: &TxReceipt) {
    println!("{} {}", verb, amount);
    println!("  Tx         : {}", receipt.tx_hash);
    println!("  Block      : {}", receipt.block_number);
}

fn print_lock(controller: &VaultController, lock: &LockInfo, releasable: bool) {
    if !lock.active {
        println!("  No active lock");
        return;
    }
    println!("  Amount     : {}", controller.format_amount(lock.plain_amount));
    match lock.unlock_at() {
        Some(at) => println!("  Unlocks at : {}", at.to_rfc3339()),
        None => println!("  Unlocks at : {}", lock.unlock_time),
    }
    println!("  Encrypted  : {}", lock.encrypted_amount);
    println!("  Releasable : {}", releasable);
}

fn print_version() {
    println!("fhevault {}", env!("CARGO_PKG_VERSION"));
    println!("rustc    {}", option_env!("RUSTC_VERSION").unwrap_or("unknown"));
}

//! Files kept in the data directory: `config.json`, `wallet.key` and
//! `devnet.json`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use fhevault_protocol::crypto::keys::WalletKeypair;
use fhevault_protocol::ClientConfig;

pub const CONFIG_FILE: &str = "config.json";
pub const WALLET_FILE: &str = "wallet.key";
pub const DEVNET_FILE: &str = "devnet.json";

/// An initialized data directory.
pub struct Workspace {
    root: PathBuf,
    pub config: ClientConfig,
    pub wallet: WalletKeypair,
}

impl Workspace {
    /// Creates the directory, writes a devnet config and stores the wallet
    /// key. Refuses to overwrite an existing key unless `force` is set.
    pub fn init(root: &Path, wallet: WalletKeypair, force: bool) -> Result<Self> {
        fs::create_dir_all(root)
            .with_context(|| format!("failed to create data directory {}", root.display()))?;

        let key_path = root.join(WALLET_FILE);
        if key_path.exists() && !force {
            bail!(
                "{} already exists; pass --force to replace it",
                key_path.display()
            );
        }

        let config_path = root.join(CONFIG_FILE);
        let config = if config_path.exists() {
            ClientConfig::load(&config_path)
                .with_context(|| format!("failed to read {}", config_path.display()))?
        } else {
            let config = ClientConfig::devnet();
            config
                .save(&config_path)
                .with_context(|| format!("failed to write {}", config_path.display()))?;
            config
        };

        fs::write(&key_path, wallet.secret_key_hex())
            .with_context(|| format!("failed to write wallet key to {}", key_path.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&key_path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(Self {
            root: root.to_path_buf(),
            config,
            wallet,
        })
    }

    /// Opens a directory previously set up with [`Workspace::init`].
    pub fn open(root: &Path) -> Result<Self> {
        let config_path = root.join(CONFIG_FILE);
        if !config_path.exists() {
            bail!(
                "{} is not initialized; run `fhevault init` first",
                root.display()
            );
        }
        let config = ClientConfig::load(&config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;

        let key_path = root.join(WALLET_FILE);
        let secret = fs::read_to_string(&key_path)
            .with_context(|| format!("failed to read wallet key {}", key_path.display()))?;
        let wallet = WalletKeypair::from_hex(&secret)
            .with_context(|| format!("wallet key {} is malformed", key_path.display()))?;

        Ok(Self {
            root: root.to_path_buf(),
            config,
            wallet,
        })
    }

    pub fn devnet_path(&self) -> PathBuf {
        self.root.join(DEVNET_FILE)
    }

    pub fn key_path(&self) -> PathBuf {
        self.root.join(WALLET_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_then_open_restores_the_wallet() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("vault");
        let created = Workspace::init(&root, WalletKeypair::generate(), false).unwrap();

        let opened = Workspace::open(&root).unwrap();
        assert_eq!(opened.wallet.address(), created.wallet.address());
        assert_eq!(opened.config, ClientConfig::devnet());
        assert_eq!(opened.devnet_path(), root.join(DEVNET_FILE));
    }

    #[test]
    fn init_keeps_an_existing_key_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let first = Workspace::init(dir.path(), WalletKeypair::generate(), false).unwrap();
        assert!(Workspace::init(dir.path(), WalletKeypair::generate(), false).is_err());
        assert_eq!(
            Workspace::open(dir.path()).unwrap().wallet.address(),
            first.wallet.address()
        );

        let replaced = Workspace::init(dir.path(), WalletKeypair::generate(), true).unwrap();
        assert_ne!(replaced.wallet.address(), first.wallet.address());
    }

    #[test]
    fn open_requires_init() {
        let dir = tempfile::tempdir().unwrap();
        let err = Workspace::open(dir.path()).err().unwrap();
        assert!(err.to_string().contains("not initialized"));
    }

    #[cfg(unix)]
    #[test]
    fn wallet_key_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::init(dir.path(), WalletKeypair::generate(), false).unwrap();
        let mode = fs::metadata(ws.key_path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

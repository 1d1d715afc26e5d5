//! Shared co-processor session.
//!
//! The SDK instance is initialised once per process (WASM/keys loading on
//! the web, a connection here) and shared by every component that encrypts
//! or decrypts. Until then, encryption reports `EncryptionUnavailable`.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use super::FheCoprocessor;

/// Cloneable handle to the (possibly not yet initialised) co-processor.
#[derive(Clone, Default)]
pub struct FheSession {
    inner: Arc<RwLock<Option<Arc<dyn FheCoprocessor>>>>,
}

impl FheSession {
    /// A session with no co-processor attached yet.
    pub fn uninitialized() -> Self {
        Self::default()
    }

    /// A session that is ready immediately.
    pub fn ready(coprocessor: Arc<dyn FheCoprocessor>) -> Self {
        let session = Self::default();
        session.initialize(coprocessor);
        session
    }

    /// Attaches the co-processor. Re-initialising replaces the instance.
    pub fn initialize(&self, coprocessor: Arc<dyn FheCoprocessor>) {
        *self.inner.write() = Some(coprocessor);
        info!("FHE co-processor session initialized");
    }

    pub fn instance(&self) -> Option<Arc<dyn FheCoprocessor>> {
        self.inner.read().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.read().is_some()
    }
}

impl fmt::Debug for FheSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FheSession")
            .field("ready", &self.is_ready())
            .finish()
    }
}

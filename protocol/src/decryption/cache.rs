//! In-memory cache of decrypted values, keyed by handle.
//!
//! Lives as long as the controller that owns it. Never serialized: decrypted
//! amounts are sensitive and must not reach durable storage.

use dashmap::DashMap;

use crate::types::Handle;

#[derive(Debug, Default)]
pub struct DecryptionCache {
    entries: DashMap<Handle, u64>,
}

impl DecryptionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, handle: &Handle) -> Option<u64> {
        self.entries.get(handle).map(|v| *v)
    }

    pub fn insert(&self, handle: Handle, value: u64) {
        self.entries.insert(handle, value);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

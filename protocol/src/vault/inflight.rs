//! Single-flight slots, one per [`ActionKind`].
//!
//! A slot is taken with [`InFlight::try_acquire`] and released when the
//! returned [`ActionPermit`] drops, on every exit path including `?` and
//! cancelled futures.

use std::collections::HashSet;

use parking_lot::Mutex;

use crate::error::{Result, VaultError};
use crate::types::ActionKind;

#[derive(Debug, Default)]
pub struct InFlight {
    active: Mutex<HashSet<ActionKind>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the slot for `kind`, or fails with `ActionInFlight`.
    pub fn try_acquire(&self, kind: ActionKind) -> Result<ActionPermit<'_>> {
        if !self.active.lock().insert(kind) {
            return Err(VaultError::ActionInFlight(kind));
        }
        Ok(ActionPermit { slots: self, kind })
    }

    pub fn is_active(&self, kind: ActionKind) -> bool {
        self.active.lock().contains(&kind)
    }
}

/// Holds one slot until dropped.
#[derive(Debug)]
pub struct ActionPermit<'a> {
    slots: &'a InFlight,
    kind: ActionKind,
}

impl ActionPermit<'_> {
    pub fn kind(&self) -> ActionKind {
        self.kind
    }
}

impl Drop for ActionPermit<'_> {
    fn drop(&mut self) {
        self.slots.active.lock().remove(&self.kind);
    }
}

//! # Vault Module
//!
//! The account-facing half of the client: a refreshable view of on-chain
//! vault state and the controller that drives stake, redeem, lock and
//! release through it.
//!
//! ```text
//! state.rs      : VaultStateView: four parallel reads, one snapshot
//! inflight.rs   : per-action single-flight slots
//! controller.rs : VaultController: guards, submission, refresh, decryption
//! ```

pub mod controller;
pub mod inflight;
pub mod state;

pub use controller::{DecryptedPosition, VaultController};
pub use inflight::{ActionPermit, InFlight};
pub use state::{VaultEvent, VaultPhase, VaultSnapshot, VaultStateView};

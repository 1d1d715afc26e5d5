//! User-decryption handshake: authorize, then exchange for cleartext.

pub mod authorizer;
pub mod cache;
pub mod client;

pub use authorizer::{AuthorizationStatement, DecryptionAuthorizer, DecryptionSession};
pub use cache::DecryptionCache;
pub use client::{DecryptedValues, DecryptionClient};

//! Encrypted credential vault.
//!
//! Every secret this tool persists (wallet sessions, delegate keys,
//! pending approval requests) is individually encrypted at rest with
//! AES-256-GCM under a single machine key. The key is supplied by an
//! injected [`KeyProvider`] so tests can run against an in-memory key.
//!
//! The vault supports exactly one active key and performs no rotation;
//! that is an explicit limitation, not an oversight.

pub mod keys;
pub mod store;

pub use keys::{FileKeyProvider, KeyProvider};
pub use store::{Vault, VaultSecret};

#[cfg(any(test, feature = "testkit"))]
pub use keys::StaticKeyProvider;

/// Subdirectory holding per-wallet session records.
pub const SESSIONS_DIR: &str = "sessions";

/// Subdirectory holding per-request pending-approval records.
pub const REQUESTS_DIR: &str = "requests";

/// File name of the machine vault key.
pub const KEY_FILE: &str = "vault.key";

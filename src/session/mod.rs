//! Approval-session handshake: pending requests, the sealed-session
//! codec, the loopback callback listener, and the outbound tunnel.

pub mod broker;
pub mod codec;
pub mod listener;
pub mod request;
pub mod tunnel;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chain::ChainName;
use crate::error::{Result, VaultError};
use crate::vault::{store, Vault};

pub use broker::{ApprovalTicket, RequestBroker, SessionConstraints};
pub use codec::SealedSessionCodec;
pub use listener::CallbackListener;
pub use request::{HandshakeKey, PendingRequest};
pub use tunnel::Tunnel;

/// A bound wallet session: the durable output of the handshake.
///
/// One record per wallet name, overwritten wholesale on re-import, owned
/// by the vault once saved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSession {
    /// Operator-chosen wallet name.
    pub wallet: String,
    /// Wallet address controlled by the custodial service.
    pub address: String,
    /// Chain id the session is valid on.
    pub chain_id: u64,
    /// Chain name recorded at request-creation time.
    pub chain: ChainName,
    /// Primary signing material: the custodial session token.
    pub session_token: String,
    /// Secondary signing material: delegate private key (hex), able to
    /// produce the raw signature formats the primary identity cannot.
    pub delegate_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WalletSession {
    /// Persist this session, fully overwriting any prior session under
    /// the same wallet name.
    pub fn save(&self, vault: &Vault) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        vault.store(&store::session_path(&self.wallet), &json)
    }

    /// Load the session for a wallet name.
    ///
    /// # Errors
    ///
    /// Returns `MissingSession` if no session is stored for the wallet.
    pub fn load(vault: &Vault, wallet: &str) -> Result<Self> {
        let bytes = vault
            .load(&store::session_path(wallet))?
            .ok_or_else(|| VaultError::MissingSession {
                wallet: wallet.to_string(),
            })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Delegate key, or `MissingSession` phrased for operators when the
    /// session was imported without one.
    pub fn require_delegate_key(&self) -> Result<&str> {
        self.delegate_key.as_deref().ok_or_else(|| {
            VaultError::MissingSession {
                wallet: format!("{} (no delegate key in session)", self.wallet),
            }
            .into()
        })
    }

    /// Canned session for tests.
    #[cfg(any(test, feature = "testkit"))]
    #[must_use]
    pub fn fixture(wallet: &str, chain_id: u64) -> Self {
        Self {
            wallet: wallet.to_string(),
            address: "0x52908400098527886E0F7030069857D2E4169EE7".to_string(),
            chain_id,
            chain: ChainName::Polygon,
            session_token: "fixture-session-token".to_string(),
            delegate_key: Some(
                "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef".to_string(),
            ),
            created_at: Utc::now(),
        }
    }
}

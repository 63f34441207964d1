//! Sealed-session decryption and binding.
//!
//! The approver seals a JSON payload to the request's ephemeral public
//! key. Binding decrypts it, validates every required field, cross-checks
//! the chain against the one recorded at request-creation time, and
//! persists the resulting [`WalletSession`].

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use crate::error::{Result, SessionError};
use crate::session::request::PendingRequest;
use crate::session::WalletSession;
use crate::vault::Vault;

/// Wire shape of the decrypted approval payload. Every required field is
/// optional here so validation can name what is missing.
#[derive(Debug, Deserialize)]
struct SessionPayload {
    address: Option<String>,
    #[serde(rename = "chainId")]
    chain_id: Option<u64>,
    session: Option<PrimaryMaterial>,
    delegate: Option<DelegateMaterial>,
}

#[derive(Debug, Deserialize)]
struct PrimaryMaterial {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DelegateMaterial {
    #[serde(rename = "privateKey")]
    private_key: Option<String>,
    attestation: Option<String>,
    signature: Option<String>,
}

/// Decrypts an approved session payload and binds it to a wallet name.
pub struct SealedSessionCodec<'a> {
    vault: &'a Vault,
}

impl<'a> SealedSessionCodec<'a> {
    #[must_use]
    pub fn new(vault: &'a Vault) -> Self {
        Self { vault }
    }

    /// Bind a ciphertext to the wallet named by the pending request.
    ///
    /// # Errors
    ///
    /// - `ExpiredRequest` if the request TTL has passed (checked before
    ///   any decryption work).
    /// - `InvalidPayload` if the ciphertext does not open or a required
    ///   field is missing.
    /// - `ChainMismatch` if the payload targets a different chain than
    ///   the one recorded at request creation.
    pub fn bind(&self, request_id: &str, ciphertext_b64: &str) -> Result<WalletSession> {
        let request = PendingRequest::load(self.vault, request_id)?;
        let key = request.handshake_key()?;

        let ciphertext = B64.decode(ciphertext_b64.trim()).map_err(|e| {
            SessionError::InvalidPayload {
                reason: format!("ciphertext is not valid base64: {e}"),
            }
        })?;

        let plaintext = key.open(&ciphertext, Utc::now())?;
        let payload: SessionPayload =
            serde_json::from_slice(&plaintext).map_err(|e| SessionError::InvalidPayload {
                reason: format!("payload is not valid JSON: {e}"),
            })?;

        let session = Self::validate(&request, payload)?;
        session.save(self.vault)?;
        request.discard(self.vault)?;

        info!(
            wallet = %session.wallet,
            address = %session.address,
            chain_id = session.chain_id,
            "Wallet session bound"
        );
        Ok(session)
    }

    fn validate(request: &PendingRequest, payload: SessionPayload) -> Result<WalletSession> {
        let missing = |field: &str| SessionError::InvalidPayload {
            reason: format!("missing field: {field}"),
        };

        let address = payload.address.ok_or_else(|| missing("address"))?;
        let chain_id = payload.chain_id.ok_or_else(|| missing("chainId"))?;
        let primary = payload.session.ok_or_else(|| missing("session"))?;
        let session_token = primary.token.ok_or_else(|| missing("session.token"))?;

        let delegate = payload.delegate.ok_or_else(|| missing("delegate"))?;
        let delegate_key = delegate
            .private_key
            .ok_or_else(|| missing("delegate.privateKey"))?;
        if delegate.attestation.as_deref().unwrap_or("").is_empty() {
            return Err(missing("delegate.attestation").into());
        }
        if delegate.signature.as_deref().unwrap_or("").is_empty() {
            return Err(missing("delegate.signature").into());
        }

        let expected = request.chain.chain_id();
        if chain_id != expected {
            return Err(SessionError::ChainMismatch {
                requested: format!("{} (id {expected})", request.chain),
                received: chain_id,
            }
            .into());
        }

        Ok(WalletSession {
            wallet: request.wallet.clone(),
            address,
            chain_id,
            chain: request.chain,
            session_token,
            delegate_key: Some(delegate_key),
            created_at: Utc::now(),
        })
    }
}

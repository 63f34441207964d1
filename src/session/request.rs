//! Pending approval requests and the ephemeral handshake key.
//!
//! The approver encrypts the session payload to an ephemeral X25519 key
//! that exists only for the lifetime of one request. The key pair is held
//! by [`HandshakeKey`], which exposes decryption only before the request
//! expires and never hands out the private half.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use crypto_box::aead::OsRng;
use crypto_box::SecretKey;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chain::ChainName;
use crate::error::{Result, SessionError, VaultError};
use crate::vault::{store, Vault};

/// Fixed time-to-live of an approval request. Enforced at consumption
/// time, not by background eviction.
pub const REQUEST_TTL_HOURS: i64 = 2;

/// One outstanding approval request, persisted vault-encrypted until it
/// is consumed or abandoned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRequest {
    pub request_id: Uuid,
    pub wallet: String,
    pub chain: ChainName,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// URL-safe base64 of the ephemeral X25519 public key.
    pub ephemeral_public: String,
    /// URL-safe base64 of the ephemeral X25519 secret key. Only ever
    /// stored inside a vault-encrypted record.
    ephemeral_secret: String,
    pub access_token: Option<String>,
}

impl PendingRequest {
    /// Create a request with a fresh ephemeral key pair and the fixed TTL.
    #[must_use]
    pub fn create(wallet: &str, chain: ChainName, access_token: Option<String>) -> Self {
        let secret = SecretKey::generate(&mut OsRng);
        let public = secret.public_key();
        let created_at = Utc::now();

        Self {
            request_id: Uuid::new_v4(),
            wallet: wallet.to_string(),
            chain,
            created_at,
            expires_at: created_at + Duration::hours(REQUEST_TTL_HOURS),
            ephemeral_public: URL_SAFE_NO_PAD.encode(public.as_bytes()),
            ephemeral_secret: URL_SAFE_NO_PAD.encode(secret.to_bytes()),
            access_token,
        }
    }

    /// Persist this request vault-encrypted.
    pub fn save(&self, vault: &Vault) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        vault.store(&store::request_path(&self.request_id.to_string()), &json)
    }

    /// Load a pending request by id.
    ///
    /// # Errors
    ///
    /// Returns `MissingRequest` when no record exists for the id.
    pub fn load(vault: &Vault, request_id: &str) -> Result<Self> {
        let bytes = vault
            .load(&store::request_path(request_id))?
            .ok_or_else(|| VaultError::MissingRequest {
                request_id: request_id.to_string(),
            })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Delete the consumed request record.
    pub fn discard(&self, vault: &Vault) -> Result<()> {
        vault.remove(&store::request_path(&self.request_id.to_string()))
    }

    /// Take the handshake capability for this request.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored key material is malformed.
    pub fn handshake_key(&self) -> Result<HandshakeKey> {
        let bytes = URL_SAFE_NO_PAD
            .decode(&self.ephemeral_secret)
            .map_err(|e| SessionError::InvalidPayload {
                reason: format!("stored ephemeral key is malformed: {e}"),
            })?;
        let key: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            SessionError::InvalidPayload {
                reason: "stored ephemeral key has wrong length".to_string(),
            }
        })?;
        Ok(HandshakeKey {
            request_id: self.request_id,
            secret: SecretKey::from(key),
            expires_at: self.expires_at,
        })
    }
}

/// Capability owning one ephemeral key pair and its expiry.
///
/// Decryption is only possible before expiry; the secret half never
/// leaves this object.
pub struct HandshakeKey {
    request_id: Uuid,
    secret: SecretKey,
    expires_at: DateTime<Utc>,
}

impl HandshakeKey {
    /// URL-safe base64 of the public half, for the approval link.
    #[must_use]
    pub fn public_b64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.secret.public_key().as_bytes())
    }

    /// Open a sealed-box ciphertext produced against this key's public
    /// half. The sender needs no key pair of its own.
    ///
    /// # Errors
    ///
    /// Returns `ExpiredRequest` when `now` is past the request expiry,
    /// regardless of ciphertext validity, and `InvalidPayload` when the
    /// ciphertext does not open.
    pub fn open(&self, ciphertext: &[u8], now: DateTime<Utc>) -> Result<Vec<u8>> {
        if now > self.expires_at {
            return Err(SessionError::ExpiredRequest {
                request_id: self.request_id.to_string(),
                expired_at: self.expires_at.to_rfc3339(),
            }
            .into());
        }
        self.secret.unseal(ciphertext).map_err(|_| {
            SessionError::InvalidPayload {
                reason: "sealed payload did not decrypt against the request key".to_string(),
            }
            .into()
        })
    }
}

/// Seal a plaintext to a URL-safe-base64 public key, as the approver does.
///
/// Production code never calls this; it exists so tests can play the
/// approver side of the handshake.
#[cfg(any(test, feature = "testkit"))]
pub fn seal_to_public(public_b64: &str, plaintext: &[u8]) -> Vec<u8> {
    let bytes = URL_SAFE_NO_PAD.decode(public_b64).expect("valid base64");
    let key: [u8; 32] = bytes.as_slice().try_into().expect("32-byte key");
    let public = crypto_box::PublicKey::from(key);
    public
        .seal(&mut OsRng, plaintext)
        .expect("sealing cannot fail")
}

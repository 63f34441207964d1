//! Venue authentication: typed-data credential derivation and keyed
//! request signing.
//!
//! Two layers, mirroring the venue's contract: an EIP-712 signature over
//! a fixed attestation proves key control and yields an API credential;
//! every subsequent request carries an HMAC over
//! `timestamp ∥ method ∥ path ∥ body` keyed with the credential secret.

use std::str::FromStr;

use alloy_primitives::{hex, keccak256, Address, B256, U256};
use alloy_signer::Signer as _;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{eip712_domain, Eip712Domain, SolStruct};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, info};

use crate::error::{ChainError, Result, VenueError};

type HmacSha256 = Hmac<Sha256>;

/// Fixed attestation string signed during credential derivation.
pub const AUTH_ATTESTATION: &str = "This message attests that I control the given wallet";

const AUTH_DOMAIN_NAME: &str = "ClobAuthDomain";
const AUTH_DOMAIN_VERSION: &str = "1";

/// Nonce bound into the auth message. The venue derives the same
/// credential for a given (key, nonce), which is what makes stateless
/// re-derivation per invocation viable.
const AUTH_NONCE: u64 = 0;

// The venue's auth struct names a field `address`, which `sol!` cannot
// express, so its EIP-712 struct hash is computed by hand.
const AUTH_TYPE: &str = "ClobAuth(address address,string timestamp,uint256 nonce,string message)";

fn auth_struct_hash(address: Address, timestamp: &str, nonce: u64) -> B256 {
    let mut encoded = Vec::with_capacity(5 * 32);
    encoded.extend_from_slice(keccak256(AUTH_TYPE.as_bytes()).as_slice());
    encoded.extend_from_slice(B256::left_padding_from(address.as_slice()).as_slice());
    encoded.extend_from_slice(keccak256(timestamp.as_bytes()).as_slice());
    encoded.extend_from_slice(&U256::from(nonce).to_be_bytes::<32>());
    encoded.extend_from_slice(keccak256(AUTH_ATTESTATION.as_bytes()).as_slice());
    keccak256(&encoded)
}

fn auth_signing_hash(domain: &Eip712Domain, struct_hash: B256) -> B256 {
    let mut message = Vec::with_capacity(2 + 32 + 32);
    message.extend_from_slice(&[0x19, 0x01]);
    message.extend_from_slice(domain.hash_struct().as_slice());
    message.extend_from_slice(struct_hash.as_slice());
    keccak256(&message)
}

/// A raw signing key able to produce the message, typed-data, and
/// transaction signatures the primary custodial identity cannot.
pub struct SigningIdentity {
    signer: PrivateKeySigner,
    chain_id: u64,
}

impl SigningIdentity {
    /// Wrap a hex private key for the given chain.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not valid hex.
    pub fn from_hex(key: &str, chain_id: u64) -> Result<Self> {
        let signer = PrivateKeySigner::from_str(key.trim())
            .map_err(|e| ChainError::InvalidKey(e.to_string()))?
            .with_chain_id(Some(chain_id));
        Ok(Self { signer, chain_id })
    }

    #[must_use]
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    #[must_use]
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Sign the credential-derivation attestation for `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns `SigningFailed` if the signer rejects the digest.
    pub async fn sign_auth(&self, timestamp: &str) -> Result<String> {
        let domain = auth_domain(self.chain_id);
        let struct_hash = auth_struct_hash(self.signer.address(), timestamp, AUTH_NONCE);
        let digest = auth_signing_hash(&domain, struct_hash);
        let signature = self
            .signer
            .sign_hash(&digest)
            .await
            .map_err(|e| VenueError::SigningFailed(e.to_string()))?;
        Ok(hex::encode_prefixed(signature.as_bytes()))
    }

    /// Sign an arbitrary EIP-712 struct under `domain`.
    pub async fn sign_typed<T: SolStruct + Send + Sync>(
        &self,
        payload: &T,
        domain: &Eip712Domain,
    ) -> Result<String> {
        let signature = self
            .signer
            .sign_typed_data(payload, domain)
            .await
            .map_err(|e| VenueError::SigningFailed(e.to_string()))?;
        Ok(hex::encode_prefixed(signature.as_bytes()))
    }
}

fn auth_domain(chain_id: u64) -> Eip712Domain {
    eip712_domain! {
        name: AUTH_DOMAIN_NAME,
        version: AUTH_DOMAIN_VERSION,
        chain_id: chain_id,
    }
}

/// Venue API credential. Derived on demand per invocation, never cached,
/// never persisted.
#[derive(Debug, Clone)]
pub struct VenueCredential {
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: String,
    pub signer: Address,
}

/// How a credential was obtained: freshly issued, or re-derived because
/// one already existed for this key and nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialOrigin {
    Issued,
    Derived,
}

#[derive(Debug, Deserialize)]
struct CredentialResponse {
    #[serde(alias = "apiKey")]
    api_key: String,
    #[serde(alias = "secret")]
    api_secret: String,
    passphrase: String,
}

/// Derives and signs authenticated requests to the trading venue.
pub struct VenueAuthSigner {
    http: reqwest::Client,
    api_url: String,
}

impl VenueAuthSigner {
    #[must_use]
    pub fn new(http: reqwest::Client, api_url: &str) -> Self {
        Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    /// Derive a venue credential for the identity.
    ///
    /// Issuance is attempted first; if the venue rejects it because a
    /// credential already exists for this address and nonce, fall back to
    /// the derive endpoint with identical headers.
    ///
    /// # Errors
    ///
    /// Returns `AuthFailed` when both branches are rejected. That
    /// usually means the account needs a one-time manual acceptance on
    /// the venue's site before API access works.
    pub async fn derive_credential(
        &self,
        identity: &SigningIdentity,
    ) -> Result<(VenueCredential, CredentialOrigin)> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = identity.sign_auth(&timestamp).await?;
        let headers = [
            ("POLY_ADDRESS", format!("{}", identity.address())),
            ("POLY_SIGNATURE", signature),
            ("POLY_TIMESTAMP", timestamp),
            ("POLY_NONCE", AUTH_NONCE.to_string()),
        ];

        let mut request = self.http.post(format!("{}/auth/api-key", self.api_url));
        for (name, value) in &headers {
            request = request.header(*name, value);
        }
        let response = request.send().await?;

        if response.status().is_success() {
            let body: CredentialResponse = response.json().await?;
            info!(address = %identity.address(), "Venue credential issued");
            return Ok((self.credential(body, identity.address()), CredentialOrigin::Issued));
        }

        let issue_status = response.status();
        if issue_status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(VenueError::AuthFailed {
                detail: response.text().await.unwrap_or_else(|_| issue_status.to_string()),
            }
            .into());
        }

        // Credential already exists for this address and nonce
        debug!(status = %issue_status, "Issuance rejected, deriving existing credential");
        let mut request = self.http.get(format!("{}/auth/derive-api-key", self.api_url));
        for (name, value) in &headers {
            request = request.header(*name, value);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_else(|_| status.to_string());
            return Err(VenueError::AuthFailed {
                detail: format!(
                    "issuance returned {issue_status}, derivation returned {status}: {detail}"
                ),
            }
            .into());
        }

        let body: CredentialResponse = response.json().await?;
        info!(address = %identity.address(), "Existing venue credential derived");
        Ok((self.credential(body, identity.address()), CredentialOrigin::Derived))
    }

    fn credential(&self, body: CredentialResponse, signer: Address) -> VenueCredential {
        VenueCredential {
            api_key: body.api_key,
            api_secret: body.api_secret,
            passphrase: body.passphrase,
            signer,
        }
    }
}

/// Compute the authenticated request headers for one venue call.
///
/// The canonical message is `timestamp ∥ method ∥ path ∥ body`, keyed
/// with the URL-safe-base64-decoded credential secret and re-encoded
/// URL-safe. Deterministic for fixed inputs; the timestamp changes per
/// request, so headers are recomputed every call.
pub fn sign_request(
    credential: &VenueCredential,
    method: &str,
    path: &str,
    body: &str,
    timestamp: i64,
) -> Result<Vec<(&'static str, String)>> {
    let key = URL_SAFE
        .decode(&credential.api_secret)
        .map_err(|e| VenueError::SigningFailed(format!("credential secret is not base64: {e}")))?;

    let message = format!("{timestamp}{method}{path}{body}");
    let mut mac = HmacSha256::new_from_slice(&key)
        .map_err(|e| VenueError::SigningFailed(e.to_string()))?;
    mac.update(message.as_bytes());
    let signature = URL_SAFE.encode(mac.finalize().into_bytes());

    Ok(vec![
        ("POLY_ADDRESS", format!("{}", credential.signer)),
        ("POLY_SIGNATURE", signature),
        ("POLY_TIMESTAMP", timestamp.to_string()),
        ("POLY_API_KEY", credential.api_key.clone()),
        ("POLY_PASSPHRASE", credential.passphrase.clone()),
    ])
}

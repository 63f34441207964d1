//! Custodial signing service client.
//!
//! The primary wallet cannot produce raw signatures, so its funds move
//! through the remote custodial service: we submit a session-authenticated
//! transfer request and the service signs and broadcasts on our behalf.
//! Only the request/response contract lives here; the service itself is an
//! external collaborator.

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ChainError, Result};
use crate::session::WalletSession;

/// Funding operations the trade orchestrator needs from the primary
/// (session-controlled) identity.
#[async_trait]
pub trait FundingSource: Send + Sync {
    /// Move `amount` base units of `token` from the session wallet to `to`.
    /// Returns the transaction hash reported by the service.
    async fn fund(&self, token: Address, to: Address, amount: U256) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    to: String,
    token: String,
    amount: String,
    chain_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    memo: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    tx_hash: String,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(default)]
    error: String,
}

/// HTTP client for the custodial wallet service.
pub struct CustodialClient {
    http: reqwest::Client,
    service_url: String,
    session: WalletSession,
}

impl CustodialClient {
    #[must_use]
    pub fn new(service_url: &str, session: WalletSession) -> Self {
        Self {
            http: reqwest::Client::new(),
            service_url: service_url.trim_end_matches('/').to_string(),
            session,
        }
    }
}

#[async_trait]
impl FundingSource for CustodialClient {
    async fn fund(&self, token: Address, to: Address, amount: U256) -> Result<String> {
        let url = format!(
            "{}/v1/wallets/{}/send",
            self.service_url, self.session.wallet
        );
        let request = SendRequest {
            to: format!("{to}"),
            token: format!("{token}"),
            amount: amount.to_string(),
            chain_id: self.session.chain_id,
            memo: Some("sidekey delegate funding"),
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.session.session_token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<ServiceError>()
                .await
                .map(|e| e.error)
                .unwrap_or_else(|_| status.to_string());
            return Err(ChainError::CustodialRejected { detail }.into());
        }

        let body: SendResponse = response.json().await?;
        info!(
            wallet = %self.session.wallet,
            to = %to,
            amount = %amount,
            tx_hash = %body.tx_hash,
            "Custodial funding transfer confirmed"
        );
        Ok(body.tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_request_serializes_base_units_as_string() {
        let request = SendRequest {
            to: "0x0000000000000000000000000000000000000001".into(),
            token: "0x0000000000000000000000000000000000000002".into(),
            amount: U256::from(10_000_000u64).to_string(),
            chain_id: 137,
            memo: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["amount"], "10000000");
        assert_eq!(json["chain_id"], 137);
        assert!(json.get("memo").is_none());
    }

    #[test]
    fn service_url_trailing_slash_is_trimmed() {
        let session = WalletSession::fixture("ops", 137);
        let client = CustodialClient::new("https://api.example.org/", session);
        assert_eq!(client.service_url, "https://api.example.org");
    }
}

//! Approval request creation and link building.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use url::Url;
use uuid::Uuid;

use crate::chain::ChainName;
use crate::error::Result;
use crate::session::request::PendingRequest;
use crate::vault::Vault;

/// Spending constraints encoded into the approval link.
///
/// The approver enforces these on the custodial side; this tool only
/// transports them.
#[derive(Debug, Clone, Default)]
pub struct SessionConstraints {
    /// Per-asset spending ceilings, e.g. `("USDC", 100)`.
    pub ceilings: Vec<(String, Decimal)>,
    /// Caller-supplied contract addresses to whitelist, merged with the
    /// fixed always-whitelisted set for the chain.
    pub allow_contracts: Vec<String>,
}

/// The result of creating an approval request.
#[derive(Debug, Clone)]
pub struct ApprovalTicket {
    pub request_id: Uuid,
    pub approval_url: Url,
    pub expires_at: DateTime<Utc>,
}

/// Creates ephemeral approval requests and builds approval links.
pub struct RequestBroker<'a> {
    vault: &'a Vault,
    approve_url: &'a str,
}

impl<'a> RequestBroker<'a> {
    #[must_use]
    pub fn new(vault: &'a Vault, approve_url: &'a str) -> Self {
        Self { vault, approve_url }
    }

    /// Generate a single-use key pair, persist the pending request, and
    /// build the approval link.
    ///
    /// `callback_url` is the public tunnel endpoint in wait mode; manual
    /// mode passes `None` and the ciphertext arrives through `import`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be persisted or the approver
    /// base URL is malformed.
    pub fn create_request(
        &self,
        wallet: &str,
        chain: ChainName,
        constraints: &SessionConstraints,
        access_token: Option<String>,
        callback_url: Option<&str>,
    ) -> Result<ApprovalTicket> {
        let request = PendingRequest::create(wallet, chain, access_token.clone());
        let key = request.handshake_key()?;
        request.save(self.vault)?;

        let mut url = Url::parse(self.approve_url)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("request", &request.request_id.to_string());
            query.append_pair("wallet", wallet);
            query.append_pair("key", &key.public_b64());
            query.append_pair("chain", &chain.to_string());
            if let Some(token) = &access_token {
                query.append_pair("token", token);
            }
            if let Some(callback) = callback_url {
                query.append_pair("callback", callback);
            }
            for (asset, amount) in &constraints.ceilings {
                query.append_pair("budget", &format!("{asset}:{amount}"));
            }
            for contract in
                always_whitelisted(chain).chain(constraints.allow_contracts.iter().cloned())
            {
                query.append_pair("allow", &contract);
            }
        }

        Ok(ApprovalTicket {
            request_id: request.request_id,
            approval_url: url,
            expires_at: request.expires_at,
        })
    }
}

/// The fixed set of always-whitelisted contracts for a chain: the venue
/// settlement contracts, the outcome-token contract, and the collateral
/// token.
fn always_whitelisted(chain: ChainName) -> impl Iterator<Item = String> {
    let profile = chain.profile();
    [
        profile.exchange,
        profile.neg_risk_exchange,
        profile.neg_risk_adapter,
        profile.conditional_tokens,
        profile.collateral,
    ]
    .into_iter()
    .map(|address| format!("{address}"))
}

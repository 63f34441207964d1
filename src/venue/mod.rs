//! Trading venue integration: authentication, typed orders, and the
//! CLOB HTTP client.

pub mod auth;
pub mod client;
pub mod order;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::Result;

pub use auth::{CredentialOrigin, SigningIdentity, VenueAuthSigner, VenueCredential};
pub use client::{OpenOrder, VenueClient};
pub use order::{OrderKind, SubmittableOrder};

/// A market as returned by the venue's market-lookup endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Market {
    pub condition_id: String,
    #[serde(default)]
    pub question: String,
    /// True for combinatorial (neg-risk) markets, which settle through
    /// the adapter and need extra custody approvals.
    #[serde(default)]
    pub neg_risk: bool,
    pub tokens: Vec<MarketToken>,
}

/// One outcome token of a market.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketToken {
    pub token_id: String,
    pub outcome: String,
    #[serde(default)]
    pub price: Option<Decimal>,
}

impl Market {
    /// Find the token for an outcome, matched case-insensitively.
    #[must_use]
    pub fn token_for(&self, outcome: &str) -> Option<&MarketToken> {
        self.tokens
            .iter()
            .find(|token| token.outcome.eq_ignore_ascii_case(outcome))
    }

    /// The one token that is not `outcome` (binary markets only).
    #[must_use]
    pub fn token_against(&self, outcome: &str) -> Option<&MarketToken> {
        self.tokens
            .iter()
            .find(|token| !token.outcome.eq_ignore_ascii_case(outcome))
    }
}

/// Venue operations the trade orchestrator depends on.
#[async_trait]
pub trait VenueApi: Send + Sync {
    async fn market(&self, condition_id: &str) -> Result<Market>;

    /// Best bid currently resting against `token_id`.
    async fn best_bid(&self, token_id: &str) -> Result<Decimal>;

    async fn derive_credential(
        &self,
        identity: &SigningIdentity,
    ) -> Result<(VenueCredential, CredentialOrigin)>;

    /// Submit a signed order; returns the venue order id.
    async fn submit_order(
        &self,
        credential: &VenueCredential,
        order: &SubmittableOrder,
    ) -> Result<String>;
}

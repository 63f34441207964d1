//! On-chain layer: chain profiles, the delegate-signed transaction
//! submitter, and the custodial funding client.

pub mod custodial;
pub mod submitter;

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};

pub use custodial::{CustodialClient, FundingSource};
pub use submitter::{ChainOps, ChainSubmitter};

/// Supported chains for approval requests and trading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainName {
    /// Polygon mainnet.
    #[default]
    Polygon,
    /// Polygon Amoy testnet.
    Amoy,
}

impl fmt::Display for ChainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Polygon => write!(f, "polygon"),
            Self::Amoy => write!(f, "amoy"),
        }
    }
}

impl FromStr for ChainName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "polygon" | "matic" => Ok(Self::Polygon),
            "amoy" => Ok(Self::Amoy),
            other => Err(format!("unknown chain '{other}' (expected polygon or amoy)")),
        }
    }
}

/// Static per-chain deployment profile: chain id, default RPC endpoint,
/// and the venue contract addresses the orchestrator touches.
#[derive(Debug, Clone, Copy)]
pub struct ChainProfile {
    pub chain_id: u64,
    pub rpc_url: &'static str,
    /// Collateral token (bridged USDC on Polygon).
    pub collateral: Address,
    /// ConditionalTokens contract holding outcome-token balances.
    pub conditional_tokens: Address,
    /// CTF Exchange settlement contract.
    pub exchange: Address,
    /// Settlement contract for combinatorial (neg-risk) markets.
    pub neg_risk_exchange: Address,
    /// Adapter contract providing the neg-risk split entry point.
    pub neg_risk_adapter: Address,
}

impl ChainName {
    /// Deployment profile for this chain.
    #[must_use]
    pub fn profile(self) -> ChainProfile {
        match self {
            Self::Polygon => ChainProfile {
                chain_id: 137,
                rpc_url: "https://polygon-rpc.com",
                collateral: address!("2791Bca1f2de4661ED88A30C99A7a9449Aa84174"),
                conditional_tokens: address!("4D97DCd97eC945f40cF65F87097ACe5EA0476045"),
                exchange: address!("4bFb41d5B3570DeFd03C39a9A4D8dE6Bd8B8982E"),
                neg_risk_exchange: address!("C5d563A36AE78145C45a50134d48A1215220f80a"),
                neg_risk_adapter: address!("d91E80cF2E7be2e162c6513ceD06f1dD0dA35296"),
            },
            Self::Amoy => ChainProfile {
                chain_id: 80002,
                rpc_url: "https://rpc-amoy.polygon.technology",
                collateral: address!("2E8D98fd126a32362F2Bd8aA427E59a1ec63F780"),
                conditional_tokens: address!("69308FB512518e39F9b16112fA8d994F4e2Bf8bB"),
                exchange: address!("dFE02Eb6733538f8Ea35D585af8DE5958AD99E40"),
                neg_risk_exchange: address!("C5d563A36AE78145C45a50134d48A1215220f80a"),
                neg_risk_adapter: address!("d91E80cF2E7be2e162c6513ceD06f1dD0dA35296"),
            },
        }
    }

    /// Chain id without building the full profile.
    #[must_use]
    pub fn chain_id(self) -> u64 {
        self.profile().chain_id
    }
}

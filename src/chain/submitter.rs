//! Delegate-signed on-chain submission.
//!
//! Every call here spends from the delegate (secondary) identity and is
//! treated as non-idempotent: nothing is retried, and a failure surfaces
//! immediately with the chain's own rejection detail.

use std::str::FromStr;

use alloy_primitives::{Address, B256, U256};
use alloy_provider::ProviderBuilder;
use alloy_signer::Signer as _;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::sol;
use async_trait::async_trait;
use tracing::info;

use crate::chain::ChainProfile;
use crate::error::{classify_chain_failure, ChainError, ConfigError, Result};

// Minimal surfaces of the three contracts the trade sequence touches.
sol! {
    #[sol(rpc)]
    contract IERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
        function balanceOf(address account) external view returns (uint256);
    }

    #[sol(rpc)]
    contract IConditionalTokens {
        function setApprovalForAll(address operator, bool approved) external;
        function splitPosition(
            address collateralToken,
            bytes32 parentCollectionId,
            bytes32 conditionId,
            uint256[] calldata partition,
            uint256 amount
        ) external;
    }

    #[sol(rpc)]
    contract INegRiskAdapter {
        function splitPosition(bytes32 conditionId, uint256 amount) external;
    }
}

/// On-chain operations the trade orchestrator needs from the delegate.
#[async_trait]
pub trait ChainOps: Send + Sync {
    /// Grant an unlimited collateral allowance to `spender`. Returns the
    /// transaction hash.
    async fn approve_collateral(&self, spender: Address) -> Result<String>;

    /// Grant blanket outcome-token transfer approval to `operator`.
    async fn approve_outcome_transfers(&self, operator: Address) -> Result<String>;

    /// Split `amount` of collateral into a complete outcome-token set for
    /// `condition_id`. Neg-risk markets go through the adapter entry point.
    async fn split_collateral(
        &self,
        condition_id: B256,
        amount: U256,
        neg_risk: bool,
    ) -> Result<String>;

    /// Collateral balance of `account` in base units.
    async fn collateral_balance(&self, account: Address) -> Result<U256>;
}

/// [`ChainOps`] implementation over an alloy HTTP provider with the
/// delegate key as the transaction signer.
pub struct ChainSubmitter {
    signer: PrivateKeySigner,
    profile: ChainProfile,
    rpc_url: String,
}

impl ChainSubmitter {
    /// Build a submitter for the delegate key on the given chain.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not valid hex or the RPC URL is
    /// malformed.
    pub fn new(delegate_key: &str, profile: ChainProfile, rpc_override: Option<&str>) -> Result<Self> {
        let signer = PrivateKeySigner::from_str(delegate_key.trim())
            .map_err(|e| ChainError::InvalidKey(e.to_string()))?
            .with_chain_id(Some(profile.chain_id));

        Ok(Self {
            signer,
            profile,
            rpc_url: rpc_override.unwrap_or(profile.rpc_url).to_string(),
        })
    }

    /// Address of the delegate identity.
    #[must_use]
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    fn parsed_rpc_url(&self) -> Result<url::Url> {
        self.rpc_url
            .parse()
            .map_err(|e: url::ParseError| {
                ConfigError::InvalidValue {
                    field: "rpc_url",
                    reason: e.to_string(),
                }
                .into()
            })
    }

    fn signing_provider(&self) -> Result<impl alloy_provider::Provider> {
        let wallet = alloy_provider::network::EthereumWallet::from(self.signer.clone());
        Ok(ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(self.parsed_rpc_url()?))
    }
}

#[async_trait]
impl ChainOps for ChainSubmitter {
    async fn approve_collateral(&self, spender: Address) -> Result<String> {
        let provider = self.signing_provider()?;
        let collateral = IERC20::new(self.profile.collateral, &provider);

        let pending_tx = collateral
            .approve(spender, U256::MAX)
            .send()
            .await
            .map_err(|e| classify_chain_failure(e.to_string()))?;
        let receipt = pending_tx
            .get_receipt()
            .await
            .map_err(|e| classify_chain_failure(e.to_string()))?;

        let tx_hash = format!("{:?}", receipt.transaction_hash);
        info!(spender = %spender, tx_hash = %tx_hash, "Collateral allowance granted");
        Ok(tx_hash)
    }

    async fn approve_outcome_transfers(&self, operator: Address) -> Result<String> {
        let provider = self.signing_provider()?;
        let ctf = IConditionalTokens::new(self.profile.conditional_tokens, &provider);

        let pending_tx = ctf
            .setApprovalForAll(operator, true)
            .send()
            .await
            .map_err(|e| classify_chain_failure(e.to_string()))?;
        let receipt = pending_tx
            .get_receipt()
            .await
            .map_err(|e| classify_chain_failure(e.to_string()))?;

        let tx_hash = format!("{:?}", receipt.transaction_hash);
        info!(operator = %operator, tx_hash = %tx_hash, "Outcome transfer approval granted");
        Ok(tx_hash)
    }

    async fn split_collateral(
        &self,
        condition_id: B256,
        amount: U256,
        neg_risk: bool,
    ) -> Result<String> {
        let provider = self.signing_provider()?;

        let pending_tx = if neg_risk {
            let adapter = INegRiskAdapter::new(self.profile.neg_risk_adapter, &provider);
            adapter
                .splitPosition(condition_id, amount)
                .send()
                .await
                .map_err(|e| classify_chain_failure(e.to_string()))?
        } else {
            let ctf = IConditionalTokens::new(self.profile.conditional_tokens, &provider);
            ctf.splitPosition(
                self.profile.collateral,
                B256::ZERO,
                condition_id,
                vec![U256::from(1), U256::from(2)],
                amount,
            )
            .send()
            .await
            .map_err(|e| classify_chain_failure(e.to_string()))?
        };

        let receipt = pending_tx
            .get_receipt()
            .await
            .map_err(|e| classify_chain_failure(e.to_string()))?;

        let tx_hash = format!("{:?}", receipt.transaction_hash);
        info!(
            condition_id = %condition_id,
            amount = %amount,
            neg_risk,
            tx_hash = %tx_hash,
            "Collateral split into outcome tokens"
        );
        Ok(tx_hash)
    }

    async fn collateral_balance(&self, account: Address) -> Result<U256> {
        let provider = ProviderBuilder::new().connect_http(self.parsed_rpc_url()?);
        let collateral = IERC20::new(self.profile.collateral, &provider);
        let balance = collateral
            .balanceOf(account)
            .call()
            .await
            .map_err(|e| classify_chain_failure(e.to_string()))?;
        Ok(balance)
    }
}

//! The seven-step trade sequence.
//!
//! Strictly ordered and forward-only: each step appends to the ledger and
//! a failure stops the sequence where it stands. Nothing is rolled back;
//! completed on-chain state stays completed and the ledger reports it.

use alloy_primitives::Address;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::chain::custodial::FundingSource;
use crate::chain::{ChainOps, ChainProfile};
use crate::error::Result;
use crate::trade::ledger::{StepLedger, StepName};
use crate::trade::plan::TradePlan;
use crate::venue::auth::SigningIdentity;
use crate::venue::{CredentialOrigin, SubmittableOrder, VenueApi, VenueCredential};

/// Operator input to one trade invocation.
#[derive(Debug, Clone)]
pub struct TradeRequest {
    pub market_id: String,
    pub outcome: String,
    pub usd_amount: Decimal,
    pub limit_price: Option<Decimal>,
    pub dry_run: bool,
}

/// Result of one trade invocation: the plan (when planning succeeded),
/// the full ledger, and the venue order id when step 7 completed.
#[derive(Debug)]
pub struct TradeOutcome {
    pub plan: Option<TradePlan>,
    pub ledger: StepLedger,
    pub order_id: Option<String>,
    /// True when the split completed but the sell did not: both outcome
    /// tokens sit with the delegate and need manual disposition.
    pub tokens_stranded: bool,
}

/// Drives the trade sequence against injected venue, chain, and funding
/// collaborators.
pub struct TradeOrchestrator<'a, V, C, F> {
    venue: &'a V,
    chain: &'a C,
    funding: &'a F,
    profile: ChainProfile,
    delegate: Address,
}

impl<'a, V, C, F> TradeOrchestrator<'a, V, C, F>
where
    V: VenueApi,
    C: ChainOps,
    F: FundingSource,
{
    #[must_use]
    pub fn new(
        venue: &'a V,
        chain: &'a C,
        funding: &'a F,
        profile: ChainProfile,
        delegate: Address,
    ) -> Self {
        Self {
            venue,
            chain,
            funding,
            profile,
            delegate,
        }
    }

    /// Run the sequence. Errors are folded into the ledger rather than
    /// returned, so callers always get the full audit trail.
    pub async fn execute(
        &self,
        identity: &SigningIdentity,
        request: &TradeRequest,
    ) -> TradeOutcome {
        let mut ledger = StepLedger::new();

        // Step 1: plan (pure; the whole of dry-run)
        let plan = match self.plan(request).await {
            Ok(plan) => {
                ledger.complete(StepName::Plan, None);
                plan
            }
            Err(e) => {
                ledger.fail(StepName::Plan, e.to_string());
                return TradeOutcome {
                    plan: None,
                    ledger,
                    order_id: None,
                    tokens_stranded: false,
                };
            }
        };

        if request.dry_run {
            return TradeOutcome {
                plan: Some(plan),
                ledger,
                order_id: None,
                tokens_stranded: false,
            };
        }

        info!(
            market = %plan.market_id,
            outcome = %plan.outcome,
            amount = %plan.usd_amount,
            neg_risk = plan.neg_risk,
            "Executing trade sequence"
        );

        // Step 2: fund the delegate with the exact split amount
        let funded = self
            .funding
            .fund(self.profile.collateral, self.delegate, plan.split_amount_units)
            .await;
        if !advance(&mut ledger, StepName::Fund, funded) {
            return self.stopped(plan, ledger, false);
        }

        // Step 3: collateral allowance to the split entry point
        let spender = if plan.neg_risk {
            self.profile.neg_risk_adapter
        } else {
            self.profile.conditional_tokens
        };
        let approved = self.chain.approve_collateral(spender).await;
        if !advance(&mut ledger, StepName::ApproveSpend, approved) {
            return self.stopped(plan, ledger, false);
        }

        // Step 4: outcome-token custody approval for settlement
        let custody = self.approve_custody(&plan).await;
        if !advance(&mut ledger, StepName::ApproveCustody, custody) {
            return self.stopped(plan, ledger, false);
        }

        // Step 5: split collateral into the complete outcome set
        let split = match plan.condition_id_b256() {
            Ok(condition_id) => {
                self.chain
                    .split_collateral(condition_id, plan.split_amount_units, plan.neg_risk)
                    .await
            }
            Err(e) => Err(e),
        };
        if !advance(&mut ledger, StepName::Split, split) {
            return self.stopped(plan, ledger, false);
        }

        // Step 6: venue credential for the delegate
        let credential = match self.venue.derive_credential(identity).await {
            Ok((credential, origin)) => {
                let label = match origin {
                    CredentialOrigin::Issued => "issued",
                    CredentialOrigin::Derived => "derived",
                };
                ledger.complete(
                    StepName::DeriveCredential,
                    Some(format!("{} ({label})", credential.api_key)),
                );
                credential
            }
            Err(e) => {
                ledger.fail(StepName::DeriveCredential, e.to_string());
                return self.stopped(plan, ledger, true);
            }
        };

        // Step 7: sign and submit the sell of the unwanted token
        let submitted = self.submit_sell(identity, &credential, &plan).await;
        match submitted {
            Ok(order_id) => {
                ledger.complete(StepName::SubmitOrder, Some(order_id.clone()));
                info!(order_id = %order_id, "Trade sequence complete");
                TradeOutcome {
                    plan: Some(plan),
                    ledger,
                    order_id: Some(order_id),
                    tokens_stranded: false,
                }
            }
            Err(e) => {
                warn!(
                    delegate = %self.delegate,
                    "Sell failed after the split; both outcome tokens remain with the delegate"
                );
                ledger.fail(StepName::SubmitOrder, e.to_string());
                self.stopped(plan, ledger, true)
            }
        }
    }

    async fn plan(&self, request: &TradeRequest) -> Result<TradePlan> {
        let market = self.venue.market(&request.market_id).await?;
        let best_bid = match request.limit_price {
            Some(_) => None,
            None => {
                let unwanted = market
                    .token_against(&request.outcome)
                    .map(|token| token.token_id.clone());
                match unwanted {
                    Some(token_id) => Some(self.venue.best_bid(&token_id).await?),
                    None => None,
                }
            }
        };
        TradePlan::build(
            &market,
            &request.outcome,
            request.usd_amount,
            request.limit_price,
            best_bid,
        )
    }

    /// Custody approvals: the settlement exchange always, plus the
    /// neg-risk exchange and adapter for neg-risk markets.
    async fn approve_custody(&self, plan: &TradePlan) -> Result<String> {
        let mut operators = vec![self.profile.exchange];
        if plan.neg_risk {
            operators.push(self.profile.neg_risk_exchange);
            operators.push(self.profile.neg_risk_adapter);
        }

        let mut references = Vec::with_capacity(operators.len());
        for operator in operators {
            references.push(self.chain.approve_outcome_transfers(operator).await?);
        }
        Ok(references.join(", "))
    }

    async fn submit_sell(
        &self,
        identity: &SigningIdentity,
        credential: &VenueCredential,
        plan: &TradePlan,
    ) -> Result<String> {
        let order = SubmittableOrder::sell(
            identity,
            &self.profile,
            &plan.unwanted_token_id,
            plan.split_amount_units,
            plan.sell_price,
            plan.neg_risk,
            plan.order_kind,
        )
        .await?;
        self.venue.submit_order(credential, &order).await
    }

    fn stopped(&self, plan: TradePlan, ledger: StepLedger, stranded: bool) -> TradeOutcome {
        TradeOutcome {
            plan: Some(plan),
            ledger,
            order_id: None,
            tokens_stranded: stranded,
        }
    }
}

/// Fold a step result into the ledger; false stops the sequence.
fn advance(ledger: &mut StepLedger, step: StepName, result: Result<String>) -> bool {
    match result {
        Ok(reference) => {
            ledger.complete(step, Some(reference));
            true
        }
        Err(e) => {
            ledger.fail(step, e.to_string());
            false
        }
    }
}

//! Handler for the `trade` command.

use crate::chain::{ChainSubmitter, CustodialClient};
use crate::cli::{output, TradeArgs};
use crate::config::Config;
use crate::error::Result;
use crate::session::WalletSession;
use crate::trade::{StepOutcome, TradeOrchestrator, TradeOutcome, TradeRequest};
use crate::vault::Vault;
use crate::venue::{SigningIdentity, VenueClient};

/// Execute the trade command.
pub async fn execute(config: &Config, args: &TradeArgs) -> Result<()> {
    let vault = Vault::open(config.data_dir());
    let session = WalletSession::load(&vault, &args.wallet)?;
    let delegate_key = session.require_delegate_key()?.to_string();

    let profile = session.chain.profile();
    let identity = SigningIdentity::from_hex(&delegate_key, session.chain_id)?;
    let submitter = ChainSubmitter::new(&delegate_key, profile, config.rpc_url.as_deref())?;
    let delegate = submitter.address();
    let custodial = CustodialClient::new(&config.approver.service_url, session.clone());
    let venue = VenueClient::new(&config.venue.api_url);

    let orchestrator = TradeOrchestrator::new(&venue, &submitter, &custodial, profile, delegate);
    let request = TradeRequest {
        market_id: args.market.clone(),
        outcome: args.outcome.clone(),
        usd_amount: args.amount,
        limit_price: args.price,
        dry_run: args.dry_run,
    };

    let outcome = orchestrator.execute(&identity, &request).await;
    render(&outcome, args.dry_run);

    if outcome.ledger.failure().is_some() {
        std::process::exit(1);
    }
    Ok(())
}

fn render(outcome: &TradeOutcome, dry_run: bool) {
    if let Some(plan) = &outcome.plan {
        output::section(if dry_run { "Trade plan (dry run)" } else { "Trade plan" });
        output::key_value("Market", &plan.market_id);
        if !plan.question.is_empty() {
            output::key_value("Question", &plan.question);
        }
        output::key_value("Holding", &plan.outcome);
        output::key_value("Amount", format!("${}", plan.usd_amount));
        output::key_value("Split units", plan.split_amount_units);
        output::key_value(
            "Sell",
            format!(
                "{} @ {} ({})",
                plan.unwanted_outcome,
                plan.sell_price,
                plan.order_kind.wire()
            ),
        );
        if plan.neg_risk {
            output::note("Neg-risk market: settlement goes through the adapter");
        }
    }

    output::section("Steps");
    for record in outcome.ledger.records() {
        match &record.outcome {
            StepOutcome::Completed { reference } => {
                let line = match reference {
                    Some(reference) => format!("{}: {reference}", record.step),
                    None => record.step.to_string(),
                };
                output::ok(&line);
            }
            StepOutcome::Failed { error } => {
                output::error(&format!("{}: {error}", record.step));
            }
        }
    }

    if outcome.tokens_stranded {
        output::warn(
            "The split completed but the sell did not: both outcome tokens \
             remain with the delegate and need manual disposition",
        );
    }
    if let Some(order_id) = &outcome.order_id {
        println!();
        output::ok(&format!("Order placed: {order_id}"));
    }
}

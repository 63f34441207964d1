//! Handler for the `balance` command.

use std::str::FromStr;

use alloy_primitives::{Address, U256};
use rust_decimal::Decimal;

use crate::chain::{ChainOps as _, ChainSubmitter};
use crate::cli::{output, BalanceArgs};
use crate::config::Config;
use crate::error::{ConfigError, Result};
use crate::session::WalletSession;
use crate::vault::Vault;

/// Execute the balance command: collateral held by the session wallet
/// and by the delegate.
pub async fn execute(config: &Config, args: &BalanceArgs) -> Result<()> {
    let vault = Vault::open(config.data_dir());
    let session = WalletSession::load(&vault, &args.wallet)?;
    let delegate_key = session.require_delegate_key()?;

    let profile = session.chain.profile();
    let submitter = ChainSubmitter::new(delegate_key, profile, config.rpc_url.as_deref())?;

    let wallet_address =
        Address::from_str(&session.address).map_err(|e| ConfigError::InvalidValue {
            field: "address",
            reason: format!("session address is malformed: {e}"),
        })?;

    let wallet_balance = submitter.collateral_balance(wallet_address).await?;
    let delegate_balance = submitter.collateral_balance(submitter.address()).await?;

    output::section(&format!("Collateral on {}", session.chain));
    output::key_value(
        "Wallet",
        format!("{wallet_address}  {}", dollars(wallet_balance)),
    );
    output::key_value(
        "Delegate",
        format!("{}  {}", submitter.address(), dollars(delegate_balance)),
    );
    Ok(())
}

/// Render 6-decimal base units as a dollar figure.
fn dollars(units: U256) -> String {
    match u64::try_from(units) {
        Ok(units) => {
            // Division can carry trailing zeros in the scale
            let amount = (Decimal::from(units) / Decimal::from(1_000_000u64)).normalize();
            format!("${amount}")
        }
        Err(_) => format!("{units} units"),
    }
}

//! Command-line interface definitions.

pub mod balance;
pub mod connect;
pub mod import;
pub mod orders;
pub mod output;
pub mod trade;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::chain::ChainName;
use crate::error::{ConfigError, Result};
use crate::session::SessionConstraints;

/// Sidekey - custodial-wallet-backed prediction-market trading.
#[derive(Parser, Debug)]
#[command(name = "sidekey")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "sidekey.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

/// Wallet names become vault file names, so they are restricted to a
/// safe character set; anything resembling a path is refused.
fn wallet_name(value: &str) -> std::result::Result<String, String> {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'));
    if safe {
        Ok(value.to_string())
    } else {
        Err("wallet names may only contain letters, digits, '-' and '_'".to_string())
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Request wallet approval and bind a trading session
    Connect(ConnectArgs),

    /// Complete a manual handshake with a pasted ciphertext
    Import(ImportArgs),

    /// Buy one outcome of a market through the split-and-sell sequence
    Trade(TradeArgs),

    /// List or cancel resting venue orders
    Orders(OrdersArgs),

    /// Show collateral balances of the session and delegate addresses
    Balance(BalanceArgs),
}

/// Arguments for the `connect` subcommand.
#[derive(Parser, Debug)]
pub struct ConnectArgs {
    /// Wallet name the session binds to
    #[arg(value_parser = wallet_name)]
    pub wallet: String,

    /// Target chain (polygon, amoy); defaults to the configured chain
    #[arg(long)]
    pub chain: Option<ChainName>,

    /// Skip the callback listener; complete later with `import`
    #[arg(long)]
    pub manual: bool,

    /// Per-asset spending ceiling, e.g. USDC:100 (repeatable)
    #[arg(long = "budget", value_name = "ASSET:AMOUNT")]
    pub budgets: Vec<String>,

    /// Extra contract address to whitelist (repeatable)
    #[arg(long = "allow", value_name = "0x..")]
    pub allow: Vec<String>,

    /// Access token forwarded to the approver page
    #[arg(long)]
    pub token: Option<String>,

    /// Seconds to wait for the approval callback
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Arguments for the `import` subcommand.
#[derive(Parser, Debug)]
pub struct ImportArgs {
    /// Wallet name the session binds to
    #[arg(value_parser = wallet_name)]
    pub wallet: String,

    /// Pending request id from `connect --manual`
    #[arg(long)]
    pub request: Uuid,

    /// Base64 ciphertext from the approver; prompted when absent
    #[arg(long)]
    pub ciphertext: Option<String>,
}

/// Arguments for the `trade` subcommand.
#[derive(Parser, Debug)]
pub struct TradeArgs {
    /// Wallet name with a bound session
    #[arg(value_parser = wallet_name)]
    pub wallet: String,

    /// Market condition id (0x-prefixed 32-byte hex)
    #[arg(long)]
    pub market: String,

    /// Outcome to hold (e.g. yes or no)
    #[arg(long)]
    pub outcome: String,

    /// Dollar amount of collateral to commit
    #[arg(long)]
    pub amount: Decimal,

    /// Explicit limit price for the sell of the opposite outcome;
    /// omitted, the sell undercuts the best bid to fill immediately
    #[arg(long)]
    pub price: Option<Decimal>,

    /// Plan only; touch nothing on chain or at the venue
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `orders` subcommand.
#[derive(Parser, Debug)]
pub struct OrdersArgs {
    /// Wallet name with a bound session
    #[arg(value_parser = wallet_name)]
    pub wallet: String,

    /// Cancel this order id instead of listing
    #[arg(long, value_name = "ORDER_ID")]
    pub cancel: Option<String>,
}

/// Arguments for the `balance` subcommand.
#[derive(Parser, Debug)]
pub struct BalanceArgs {
    /// Wallet name with a bound session
    #[arg(value_parser = wallet_name)]
    pub wallet: String,
}

impl ConnectArgs {
    /// Parse `--budget ASSET:AMOUNT` flags into session constraints.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed budget flag.
    pub fn constraints(&self) -> Result<SessionConstraints> {
        let mut ceilings = Vec::with_capacity(self.budgets.len());
        for budget in &self.budgets {
            let (asset, amount) = budget.split_once(':').ok_or(ConfigError::InvalidValue {
                field: "budget",
                reason: format!("'{budget}' is not ASSET:AMOUNT"),
            })?;
            let amount: Decimal = amount.parse().map_err(|e| ConfigError::InvalidValue {
                field: "budget",
                reason: format!("'{budget}': {e}"),
            })?;
            ceilings.push((asset.to_uppercase(), amount));
        }
        Ok(SessionConstraints {
            ceilings,
            allow_contracts: self.allow.clone(),
        })
    }
}

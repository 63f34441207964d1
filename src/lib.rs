//! Sidekey: custodial-wallet-backed prediction-market trading.
//!
//! The tool binds a trading session to a remote custodial wallet through
//! a sealed-box approval handshake, keeps every secret in an encrypted
//! vault, and executes trades as a strictly ordered split-and-sell
//! sequence: fund a local delegate, split collateral into a complete
//! outcome-token set, and sell the unwanted side on the CLOB venue.

pub mod chain;
pub mod cli;
pub mod config;
pub mod error;
pub mod session;
pub mod trade;
pub mod vault;
pub mod venue;

pub use config::Config;
pub use error::{Error, Result};

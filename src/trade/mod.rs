//! Trade planning and the multi-step execution sequence.

pub mod ledger;
pub mod orchestrator;
pub mod plan;

pub use ledger::{StepLedger, StepName, StepOutcome, StepRecord};
pub use orchestrator::{TradeOrchestrator, TradeOutcome, TradeRequest};
pub use plan::TradePlan;

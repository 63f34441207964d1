//! Pure trade planning: token selection, pricing, and unit conversion.
//!
//! A plan is computed once from market data and never mutated afterwards;
//! every later step reads from it. Dry-run is exactly this computation.

use std::str::FromStr;

use alloy_primitives::{B256, U256};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::error::{Result, VenueError};
use crate::venue::{Market, OrderKind};

/// Floor under the computed sell price. The venue rejects prices below
/// one cent, and a deeply discounted exit is still better than none.
const MIN_SELL_PRICE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Discount applied to the best opposing bid when no explicit limit is
/// given, so the immediate-or-cancel sell crosses the book.
const BID_DISCOUNT: Decimal = Decimal::from_parts(9, 0, 0, false, 1);

/// Collateral base units per dollar (6 decimals).
const UNITS_PER_DOLLAR: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Immutable result of trade planning.
#[derive(Debug, Clone, Serialize)]
pub struct TradePlan {
    pub market_id: String,
    pub question: String,
    /// Outcome the operator wants to hold.
    pub outcome: String,
    pub usd_amount: Decimal,
    pub wanted_token_id: String,
    /// Token sold off immediately after the split.
    pub unwanted_token_id: String,
    pub unwanted_outcome: String,
    pub neg_risk: bool,
    pub condition_id: String,
    /// Collateral to split, in 6-decimal base units.
    pub split_amount_units: U256,
    pub sell_price: Decimal,
    pub order_kind: OrderKind,
}

impl TradePlan {
    /// Compute a plan from resolved market data.
    ///
    /// `best_bid` is the best resting bid against the unwanted token; it
    /// is only consulted when no explicit limit price is given.
    ///
    /// # Errors
    ///
    /// Returns `UnknownOutcome` when the market has no token for the
    /// requested outcome or no opposing token, and an error when the
    /// dollar amount does not convert to a positive unit count.
    pub fn build(
        market: &Market,
        outcome: &str,
        usd_amount: Decimal,
        limit_price: Option<Decimal>,
        best_bid: Option<Decimal>,
    ) -> Result<Self> {
        let unknown = || VenueError::UnknownOutcome {
            market_id: market.condition_id.clone(),
            outcome: outcome.to_string(),
        };
        let wanted = market.token_for(outcome).ok_or_else(unknown)?;
        let unwanted = market.token_against(outcome).ok_or_else(unknown)?;

        let (sell_price, order_kind) = sell_terms(limit_price, best_bid.unwrap_or(Decimal::ZERO));
        let split_amount_units = split_units(usd_amount)?;

        Ok(Self {
            market_id: market.condition_id.clone(),
            question: market.question.clone(),
            outcome: wanted.outcome.clone(),
            usd_amount,
            wanted_token_id: wanted.token_id.clone(),
            unwanted_token_id: unwanted.token_id.clone(),
            unwanted_outcome: unwanted.outcome.clone(),
            neg_risk: market.neg_risk,
            condition_id: market.condition_id.clone(),
            split_amount_units,
            sell_price,
            order_kind,
        })
    }

    /// Condition id as the 32-byte value the split contracts take.
    ///
    /// # Errors
    ///
    /// Returns an error when the id is not 0x-prefixed 32-byte hex.
    pub fn condition_id_b256(&self) -> Result<B256> {
        B256::from_str(&self.condition_id).map_err(|e| {
            VenueError::MalformedResponse {
                endpoint: format!("/markets/{}", self.market_id),
                reason: format!("condition id is not 32-byte hex: {e}"),
            }
            .into()
        })
    }
}

/// Sell price and order kind: an explicit limit rests on the book; an
/// automatic price undercuts the best bid to fill immediately, floored
/// at one cent.
#[must_use]
pub fn sell_terms(limit_price: Option<Decimal>, best_bid: Decimal) -> (Decimal, OrderKind) {
    match limit_price {
        Some(limit) => (limit, OrderKind::Resting),
        None => {
            let discounted = best_bid * BID_DISCOUNT;
            (discounted.max(MIN_SELL_PRICE), OrderKind::ImmediateOrCancel)
        }
    }
}

/// Convert a dollar amount to collateral base units, rounding halves
/// away from zero.
///
/// # Errors
///
/// Rejects amounts that round to zero units or overflow.
pub fn split_units(usd_amount: Decimal) -> Result<U256> {
    let invalid = |reason: String| VenueError::OrderRejected {
        detail: format!("invalid trade amount {usd_amount}: {reason}"),
    };

    let units = usd_amount
        .checked_mul(UNITS_PER_DOLLAR)
        .ok_or_else(|| invalid("does not fit in collateral base units".to_string()))?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let units = units
        .to_u64()
        .ok_or_else(|| invalid("does not fit in collateral base units".to_string()))?;
    if units == 0 {
        return Err(invalid("rounds to zero base units".to_string()).into());
    }
    Ok(U256::from(units))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn market(neg_risk: bool) -> Market {
        serde_json::from_value(serde_json::json!({
            "condition_id": "0x0000000000000000000000000000000000000000000000000000000000c0ffee",
            "question": "Will it rain tomorrow?",
            "neg_risk": neg_risk,
            "tokens": [
                { "token_id": "111", "outcome": "Yes", "price": "0.10" },
                { "token_id": "222", "outcome": "No", "price": "0.90" }
            ]
        }))
        .unwrap()
    }

    // -------------------------------------------------------------------------
    // Pricing
    // -------------------------------------------------------------------------

    #[test]
    fn automatic_price_undercuts_the_best_bid() {
        let (price, kind) = sell_terms(None, dec!(0.90));
        assert_eq!(price, dec!(0.81));
        assert_eq!(kind, OrderKind::ImmediateOrCancel);
    }

    #[test]
    fn automatic_price_is_exactly_ninety_percent_of_the_bid() {
        // No tick rounding: the discounted price carries full precision
        let (price, _) = sell_terms(None, dec!(0.35));
        assert_eq!(price, dec!(0.315));
    }

    #[test]
    fn automatic_price_is_floored_at_one_cent() {
        let (price, _) = sell_terms(None, dec!(0.01));
        assert_eq!(price, dec!(0.01));

        let (price, _) = sell_terms(None, Decimal::ZERO);
        assert_eq!(price, dec!(0.01));
    }

    #[test]
    fn explicit_limit_is_used_verbatim_and_rests() {
        let (price, kind) = sell_terms(Some(dec!(0.35)), dec!(0.90));
        assert_eq!(price, dec!(0.35));
        assert_eq!(kind, OrderKind::Resting);
    }

    // -------------------------------------------------------------------------
    // Unit conversion
    // -------------------------------------------------------------------------

    #[test]
    fn dollars_convert_to_six_decimal_units() {
        assert_eq!(split_units(dec!(10)).unwrap(), U256::from(10_000_000u64));
        assert_eq!(split_units(dec!(0.5)).unwrap(), U256::from(500_000u64));
    }

    #[test]
    fn half_unit_rounds_away_from_zero() {
        // 0.0000015 dollars is 1.5 base units
        assert_eq!(split_units(dec!(0.0000015)).unwrap(), U256::from(2u64));
    }

    #[test]
    fn zero_and_negative_amounts_are_rejected() {
        assert!(split_units(Decimal::ZERO).is_err());
        assert!(split_units(dec!(-5)).is_err());
        assert!(split_units(dec!(0.0000001)).is_err());
    }

    #[test]
    fn oversized_amounts_error_instead_of_overflowing() {
        // 1e27 dollars is representable as a Decimal but 1e33 base units
        // is not; the conversion must reject it, not panic
        let huge = Decimal::from_scientific("1e27").unwrap();
        let err = split_units(huge).unwrap_err();
        assert!(err.to_string().contains("does not fit"));
    }

    // -------------------------------------------------------------------------
    // Plan assembly
    // -------------------------------------------------------------------------

    #[test]
    fn plan_selects_wanted_and_unwanted_tokens() {
        let plan =
            TradePlan::build(&market(false), "yes", dec!(10), None, Some(dec!(0.90))).unwrap();
        assert_eq!(plan.wanted_token_id, "111");
        assert_eq!(plan.unwanted_token_id, "222");
        assert_eq!(plan.unwanted_outcome, "No");
        assert_eq!(plan.split_amount_units, U256::from(10_000_000u64));
        assert_eq!(plan.order_kind, OrderKind::ImmediateOrCancel);
    }

    #[test]
    fn unknown_outcome_is_a_structured_error() {
        let err = TradePlan::build(&market(false), "maybe", dec!(10), None, None).unwrap_err();
        assert!(err.to_string().contains("maybe"));
    }

    #[test]
    fn condition_id_parses_to_b256() {
        let plan =
            TradePlan::build(&market(true), "no", dec!(1), Some(dec!(0.5)), None).unwrap();
        assert!(plan.neg_risk);
        let id = plan.condition_id_b256().unwrap();
        assert_eq!(&id.as_slice()[29..], &[0xc0, 0xff, 0xee]);
    }
}

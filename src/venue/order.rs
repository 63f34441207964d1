//! Typed order construction and signing for the CTF exchange.
//!
//! Orders are EIP-712 structs signed by the delegate key under the
//! exchange's domain. Neg-risk markets verify against a separate exchange
//! contract, so the domain's verifying contract switches with the market.

use alloy_primitives::{Address, U256};
use alloy_sol_types::{eip712_domain, sol, Eip712Domain};
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::json;

use crate::chain::ChainProfile;
use crate::error::{Result, VenueError};
use crate::venue::auth::SigningIdentity;

const EXCHANGE_DOMAIN_NAME: &str = "Polymarket CTF Exchange";
const EXCHANGE_DOMAIN_VERSION: &str = "1";

/// EIP-712 side discriminant for a sell.
const SIDE_SELL: u8 = 1;

/// EOA signature, recovered with plain ecrecover.
const SIGNATURE_TYPE_EOA: u8 = 0;

sol! {
    struct Order {
        uint256 salt;
        address maker;
        address signer;
        address taker;
        uint256 tokenId;
        uint256 makerAmount;
        uint256 takerAmount;
        uint256 expiration;
        uint256 nonce;
        uint256 feeRateBps;
        uint8 side;
        uint8 signatureType;
    }
}

/// How long an order should rest on the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    /// Fill whatever crosses immediately, cancel the remainder.
    ImmediateOrCancel,
    /// Rest on the book until filled or cancelled.
    Resting,
}

impl OrderKind {
    /// Wire value for the venue's `orderType` field.
    #[must_use]
    pub fn wire(self) -> &'static str {
        match self {
            Self::ImmediateOrCancel => "FAK",
            Self::Resting => "GTC",
        }
    }
}

impl serde::Serialize for OrderKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.wire())
    }
}

/// A signed order ready for submission, minus the credential-scoped
/// `owner` field which the client attaches at send time.
#[derive(Debug, Clone)]
pub struct SubmittableOrder {
    order: serde_json::Value,
    kind: OrderKind,
}

impl SubmittableOrder {
    /// Build and sign a sell of `maker_units` outcome tokens at `price`.
    ///
    /// The maker amount is the token quantity in 6-decimal units; the
    /// taker amount is the collateral asked in return, truncated toward
    /// zero so the order never asks for more than `price` per token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token id is not a decimal integer, the
    /// amounts overflow, or signing fails.
    pub async fn sell(
        identity: &SigningIdentity,
        profile: &ChainProfile,
        token_id: &str,
        maker_units: U256,
        price: Decimal,
        neg_risk: bool,
        kind: OrderKind,
    ) -> Result<Self> {
        let token = U256::from_str_radix(token_id, 10).map_err(|e| {
            VenueError::MalformedResponse {
                endpoint: "order".to_string(),
                reason: format!("token id '{token_id}' is not a decimal integer: {e}"),
            }
        })?;
        let taker_units = collateral_return(maker_units, price)?;

        let maker = identity.address();
        let order = Order {
            salt: U256::from(rand::thread_rng().gen::<u64>()),
            maker,
            signer: maker,
            taker: Address::ZERO,
            tokenId: token,
            makerAmount: maker_units,
            takerAmount: taker_units,
            expiration: U256::ZERO,
            nonce: U256::ZERO,
            feeRateBps: U256::ZERO,
            side: SIDE_SELL,
            signatureType: SIGNATURE_TYPE_EOA,
        };

        let domain = exchange_domain(identity.chain_id(), profile, neg_risk);
        let signature = identity.sign_typed(&order, &domain).await?;

        Ok(Self {
            order: json!({
                "salt": order.salt.to::<u64>(),
                "maker": format!("{maker}"),
                "signer": format!("{maker}"),
                "taker": format!("{}", Address::ZERO),
                "tokenId": token_id,
                "makerAmount": order.makerAmount.to_string(),
                "takerAmount": order.takerAmount.to_string(),
                "expiration": "0",
                "nonce": "0",
                "feeRateBps": "0",
                "side": "SELL",
                "signatureType": SIGNATURE_TYPE_EOA,
                "signature": signature,
            }),
            kind,
        })
    }

    #[must_use]
    pub fn kind(&self) -> OrderKind {
        self.kind
    }

    /// Full request body for `POST /order`, with the credential's API key
    /// as owner.
    #[must_use]
    pub fn payload(&self, api_key: &str) -> serde_json::Value {
        json!({
            "order": self.order,
            "owner": api_key,
            "orderType": self.kind.wire(),
        })
    }
}

fn exchange_domain(chain_id: u64, profile: &ChainProfile, neg_risk: bool) -> Eip712Domain {
    let verifying_contract = if neg_risk {
        profile.neg_risk_exchange
    } else {
        profile.exchange
    };
    eip712_domain! {
        name: EXCHANGE_DOMAIN_NAME,
        version: EXCHANGE_DOMAIN_VERSION,
        chain_id: chain_id,
        verifying_contract: verifying_contract,
    }
}

/// Collateral units asked for `maker_units` tokens at `price`, truncated
/// toward zero.
fn collateral_return(maker_units: U256, price: Decimal) -> Result<U256> {
    let overflow = |what: &str| VenueError::SigningFailed(format!("order amount overflow: {what}"));

    let units = i64::try_from(maker_units).map_err(|_| overflow("maker amount"))?;
    let asked = (Decimal::from(units) * price).trunc();
    let asked = asked.to_u64().ok_or_else(|| overflow("taker amount"))?;
    Ok(U256::from(asked))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainName;
    use rust_decimal_macros::dec;

    const TEST_KEY: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    async fn sell_fixture(price: Decimal, kind: OrderKind) -> SubmittableOrder {
        let identity = SigningIdentity::from_hex(TEST_KEY, 137).unwrap();
        let profile = ChainName::Polygon.profile();
        SubmittableOrder::sell(
            &identity,
            &profile,
            "123456789",
            U256::from(10_000_000u64),
            price,
            false,
            kind,
        )
        .await
        .unwrap()
    }

    #[test]
    fn collateral_return_truncates_toward_zero() {
        // 10 tokens at 0.09 -> exactly 0.9 collateral units in 6 decimals
        let asked = collateral_return(U256::from(10_000_000u64), dec!(0.09)).unwrap();
        assert_eq!(asked, U256::from(900_000u64));

        // Sub-unit remainders are dropped, never rounded up
        let asked = collateral_return(U256::from(3u64), dec!(0.5)).unwrap();
        assert_eq!(asked, U256::from(1u64));
    }

    #[tokio::test]
    async fn sell_payload_carries_the_wire_shape() {
        let order = sell_fixture(dec!(0.09), OrderKind::ImmediateOrCancel).await;
        let payload = order.payload("api-key-1");

        assert_eq!(payload["owner"], "api-key-1");
        assert_eq!(payload["orderType"], "FAK");

        let inner = &payload["order"];
        assert_eq!(inner["side"], "SELL");
        assert_eq!(inner["signatureType"], 0);
        assert_eq!(inner["tokenId"], "123456789");
        assert_eq!(inner["makerAmount"], "10000000");
        assert_eq!(inner["takerAmount"], "900000");
        assert_eq!(inner["expiration"], "0");
        assert_eq!(inner["feeRateBps"], "0");
        assert!(inner["signature"]
            .as_str()
            .unwrap()
            .starts_with("0x"));
        assert_eq!(inner["maker"], inner["signer"]);
    }

    #[tokio::test]
    async fn resting_orders_are_gtc() {
        let order = sell_fixture(dec!(0.35), OrderKind::Resting).await;
        assert_eq!(order.payload("k")["orderType"], "GTC");
        assert_eq!(order.kind(), OrderKind::Resting);
    }

    #[tokio::test]
    async fn non_numeric_token_id_is_rejected() {
        let identity = SigningIdentity::from_hex(TEST_KEY, 137).unwrap();
        let profile = ChainName::Polygon.profile();
        let result = SubmittableOrder::sell(
            &identity,
            &profile,
            "0xdeadbeef",
            U256::from(1u64),
            dec!(0.5),
            false,
            OrderKind::Resting,
        )
        .await;
        assert!(result.is_err());
    }
}

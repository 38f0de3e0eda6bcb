//! Immutable, declarative order intents and the deterministic client-order-id
//! hash that makes them idempotent across reconnects and grid rebalances.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::{CancelReason, Direction, Side};

/// Length of the client order id: a lowercase hex prefix of a SHA-256 digest.
pub const CLIENT_ORDER_ID_LEN: usize = 16;

/// The identity parameters hashed into a client order id, declared as a
/// single ordered list so that adding or removing a parameter is a one-line
/// change and is self-documenting. `qty`, `grid_level`, and `reduce_only` are
/// deliberately not members of this list: they are metadata, not identity.
///
/// Any future parameter added to `PlaceLimit` must be consciously classified
/// as identity-affecting (belongs here) or metadata (does not).
pub const IDENTITY_PARAMS: [&str; 4] = ["symbol", "side", "price", "direction"];

/// Compute the deterministic client order id for a prospective Place at
/// `(symbol, side, price, direction)`.
///
/// Stable across grid rebalancing: the same price, side, and direction
/// always hash to the same id regardless of which grid level currently
/// carries that price, which is what lets the executor deduplicate orders
/// safely across reconnects and rebuilds.
pub fn client_order_id(symbol: &str, side: Side, price: Decimal, direction: Direction) -> String {
    let joined = format!("{}_{}_{}_{}", symbol, side, price, direction);
    let digest = Sha256::digest(joined.as_bytes());
    hex::encode(digest)[..CLIENT_ORDER_ID_LEN].to_string()
}

/// A declarative request to place a resting limit order. The engine never
/// computes `qty` in USD; it is filled in by the executor's quantity
/// calculator (or the backtest simulator's) before submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceLimit {
    pub symbol: String,
    pub side: Side,
    pub price: Decimal,
    /// Placeholder quantity set by the engine; must be replaced by the
    /// executor's quantity calculator before the order reaches the exchange.
    pub qty: Decimal,
    pub direction: Direction,
    pub grid_level: usize,
    pub reduce_only: bool,
    pub client_order_id: String,
}

impl PlaceLimit {
    /// Construct a Place intent, deriving `client_order_id` from the
    /// identity parameters rather than accepting it as an argument — this is
    /// the only constructor, so the hash can never drift from its inputs.
    pub fn new(
        symbol: impl Into<String>,
        side: Side,
        price: Decimal,
        qty: Decimal,
        direction: Direction,
        grid_level: usize,
        reduce_only: bool,
    ) -> Self {
        let symbol = symbol.into();
        let client_order_id = client_order_id(&symbol, side, price, direction);
        Self {
            symbol,
            side,
            price,
            qty,
            direction,
            grid_level,
            reduce_only,
            client_order_id,
        }
    }
}

/// A declarative request to cancel a resting order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cancel {
    pub order_id: String,
    pub client_order_id: String,
    pub reason: CancelReason,
}

/// Declarative output of `StrategyEngine::on_event`. The executor decides
/// whether and how to realize each intent; the engine never places or
/// cancels anything itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Intent {
    PlaceLimit(PlaceLimit),
    Cancel(Cancel),
}

impl Intent {
    pub fn place(intent: PlaceLimit) -> Self {
        Intent::PlaceLimit(intent)
    }

    pub fn cancel(order_id: impl Into<String>, client_order_id: impl Into<String>, reason: CancelReason) -> Self {
        Intent::Cancel(Cancel {
            order_id: order_id.into(),
            client_order_id: client_order_id.into(),
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn client_order_id_is_16_lowercase_hex_chars() {
        let id = client_order_id("BTCUSDT", Side::Buy, dec!(99000), Direction::Long);
        assert_eq!(id.len(), CLIENT_ORDER_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn client_order_id_is_stable_across_grid_level_and_qty() {
        // Scenario 2: same (symbol, side, price, direction) must hash the
        // same regardless of grid_level or qty, since neither is in
        // IDENTITY_PARAMS.
        let a = PlaceLimit::new("BTCUSDT", Side::Buy, dec!(99000), dec!(0.01), Direction::Long, 10, false);
        let b = PlaceLimit::new("BTCUSDT", Side::Buy, dec!(99000), dec!(0.05), Direction::Long, 9, false);
        assert_eq!(a.client_order_id, b.client_order_id);
    }

    #[test]
    fn client_order_id_differs_when_identity_params_differ() {
        let buy = client_order_id("BTCUSDT", Side::Buy, dec!(99000), Direction::Long);
        let sell = client_order_id("BTCUSDT", Side::Sell, dec!(99000), Direction::Long);
        let other_price = client_order_id("BTCUSDT", Side::Buy, dec!(99001), Direction::Long);
        let other_dir = client_order_id("BTCUSDT", Side::Buy, dec!(99000), Direction::Short);
        assert_ne!(buy, sell);
        assert_ne!(buy, other_price);
        assert_ne!(buy, other_dir);
    }

    #[test]
    fn client_order_id_matches_known_hash_prefix() {
        use sha2::{Digest, Sha256};
        let joined = "BTCUSDT_Buy_99000_long";
        let expected = hex::encode(Sha256::digest(joined.as_bytes()))[..16].to_string();
        let actual = client_order_id("BTCUSDT", Side::Buy, dec!(99000), Direction::Long);
        assert_eq!(actual, expected);
    }
}

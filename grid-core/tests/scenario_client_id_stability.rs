//! Scenario 2: the same (symbol, side, price, direction) always hashes to
//! the same client order id, regardless of which grid level currently
//! carries that price — this is what lets an executor deduplicate a
//! re-emitted Place across a rebalance.

use grid_core::core::{Direction, Side};
use grid_core::intent::{client_order_id, PlaceLimit};
use rust_decimal_macros::dec;

#[test]
fn client_id_is_stable_across_grid_level_shift() {
    let before = PlaceLimit::new("BTCUSDT", Side::Buy, dec!(99000), dec!(0.01), Direction::Long, 10, false);
    let after_rebalance = PlaceLimit::new("BTCUSDT", Side::Buy, dec!(99000), dec!(0.01), Direction::Long, 9, false);

    assert_eq!(before.client_order_id, after_rebalance.client_order_id);
}

#[test]
fn client_id_matches_hash_of_the_documented_identity_string() {
    let expected_prefix = client_order_id("BTCUSDT", Side::Buy, dec!(99000), Direction::Long);
    let place = PlaceLimit::new("BTCUSDT", Side::Buy, dec!(99000), dec!(1), Direction::Long, 0, false);
    assert_eq!(place.client_order_id, expected_prefix);
}

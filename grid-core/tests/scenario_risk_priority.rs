//! Scenario 4: a short under moderate liquidation risk with a severely
//! skewed position ratio is decided by the position-ratio rule, not the
//! opposite-side moderate-liquidation override — the priority order in
//! `apply_short_rules` checks position-ratio before moderate-liq.

use grid_core::risk::{PositionState, RiskConfig, RiskManagerArena};
use rust_decimal_macros::dec;

fn config() -> RiskConfig {
    RiskConfig {
        min_liq_ratio: dec!(0.8),
        max_liq_ratio: dec!(1.2),
        max_margin: dec!(0.5),
        min_total_margin: dec!(0.15),
    }
}

#[test]
fn position_ratio_rule_outranks_moderate_liquidation_for_shorts() {
    let (mut arena, long_id, short_id) = RiskManagerArena::new_pair(config(), config());
    let last_close = dec!(100);

    let short_state = PositionState {
        size: dec!(3.0),
        entry_price: dec!(100),
        liquidation_price: config().max_liq_ratio * dec!(0.9) * last_close,
        position_value: dec!(300),
        leverage: dec!(1),
        unrealized_pnl: dec!(-10),
    };
    let long_state = PositionState {
        size: dec!(1.0),
        ..PositionState::flat()
    };

    arena.calculate(long_id, long_state, last_close, dec!(100_000)).unwrap();
    let mult = arena.calculate(short_id, short_state, last_close, dec!(100_000)).unwrap();

    assert_eq!(mult.sell, dec!(2.0));
    assert_ne!(mult.buy, dec!(1.5), "the emergency rule must not have fired instead");
}

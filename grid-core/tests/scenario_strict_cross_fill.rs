//! Scenario 3: a backtest tick sequence at prices [100.0, 99.9, 99.8] with a
//! standing Buy at 99.9 fills only once price strictly crosses below the
//! limit, never on the touch itself.

use grid_core::backtest::{BacktestRunner, MarketTick, SymbolConfig};
use grid_core::core::{Direction, InstrumentInfo, WindDownMode};
use grid_core::grid::GridConfig;
use grid_core::quantity::{QuantityFormula, UniformQuantityCalculator};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn symbol_config() -> SymbolConfig {
    SymbolConfig {
        symbol: "BTCUSDT".into(),
        grid_config: GridConfig {
            grid_count: 10,
            grid_step: dec!(1.0),
            rebalance_threshold: dec!(0.30),
            tick_size: dec!(0.1),
        },
        commission_rate: dec!(0.0006),
        anchor_hint: None,
    }
}

fn tick(exchange_ts: i64, last: Decimal) -> MarketTick {
    MarketTick {
        symbol: "BTCUSDT".into(),
        exchange_ts,
        local_ts: exchange_ts,
        last,
        mark: last,
        bid1: last,
        ask1: last,
        funding_rate: Decimal::ZERO,
    }
}

#[test]
fn touching_the_limit_does_not_fill_but_crossing_it_does() {
    let instrument = InstrumentInfo {
        tick_size: dec!(0.1),
        qty_step: dec!(0.001),
    };
    let calc = Box::new(UniformQuantityCalculator::new(QuantityFormula::FixedBase(dec!(1)), instrument));
    let mut runner = BacktestRunner::new(vec![symbol_config()], calc, dec!(10_000), WindDownMode::LeaveOpen);

    // tick 0 builds the grid and places a resting Buy at 99.0; tick 1 merely
    // touches it; tick 2 strictly crosses below it.
    let ticks = vec![tick(0, dec!(100.0)), tick(1, dec!(99.0)), tick(2, dec!(98.9))];
    runner.run(&ticks).unwrap();

    assert!(runner.metrics().total_volume() > Decimal::ZERO, "the strict cross at tick 2 should have produced a fill");

    let expected_fee = dec!(99.0) * dec!(1) * dec!(0.0006);
    assert_eq!(runner.metrics().total_commission(), expected_fee);
}

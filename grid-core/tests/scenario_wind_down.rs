//! Scenario 6: a backtest ending with an open long position in close-all
//! wind-down mode realizes its PnL via a synthetic closing fill and zeroes
//! unrealized PnL, rather than leaving the position open.

use grid_core::backtest::{BacktestRunner, MarketTick, PositionTracker, SymbolConfig};
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
fn close_all_wind_down_realizes_pnl_directly_on_the_tracker() {
    // Exercises the unit the wind-down pass calls: a standalone long,
    // closed out, realizes PnL net of commission and ends flat.
    let mut tracker = PositionTracker::new(Direction::Long);
    tracker.apply_fill(dec!(0.5), dec!(50000), Decimal::ZERO, true);
    assert_eq!(tracker.unrealized_pnl(dec!(52000)), dec!(1000));

    let commission_rate = dec!(0.0006);
    tracker.close_all(dec!(52000), commission_rate);

    let expected_fee = dec!(0.5) * dec!(52000) * commission_rate;
    assert_eq!(tracker.realized_pnl(), dec!(1000) - expected_fee);
    assert!(tracker.is_empty());
    assert_eq!(tracker.unrealized_pnl(dec!(52000)), Decimal::ZERO);
}

#[test]
fn backtest_close_all_mode_realizes_the_final_position() {
    let instrument = InstrumentInfo {
        tick_size: dec!(0.1),
        qty_step: dec!(0.001),
    };
    let calc = Box::new(UniformQuantityCalculator::new(QuantityFormula::FixedBase(dec!(1)), instrument));
    let mut runner = BacktestRunner::new(vec![symbol_config()], calc, dec!(10_000), WindDownMode::CloseAll);

    let ticks = vec![tick(0, dec!(100.0)), tick(1, dec!(98.9)), tick(2, dec!(97.9))];
    runner.run(&ticks).unwrap();

    // The strict-cross fill opening the position plus the synthetic
    // closing fill wind-down forces both contribute volume/commission.
    assert!(runner.metrics().total_volume() > Decimal::ZERO);
    assert!(runner.metrics().total_commission() > Decimal::ZERO);
}

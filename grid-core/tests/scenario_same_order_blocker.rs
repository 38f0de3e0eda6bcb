//! Scenario 5: two fully-filled executions on the same side at the same
//! price but different order ids set the blocker, which then suppresses
//! intents on the next Ticker while still advancing last_close.

use grid_core::engine::{OpenOrders, StrategyEngine};
use grid_core::event::{Event, EventHeader, Execution, Ticker};
use grid_core::grid::GridConfig;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn config() -> GridConfig {
    GridConfig {
        grid_count: 10,
        grid_step: dec!(1.0),
        rebalance_threshold: dec!(0.30),
        tick_size: dec!(0.1),
    }
}

fn ticker(last: Decimal) -> Event {
    Event::Ticker(Ticker {
        header: EventHeader::new(1, 1),
        symbol: "BTCUSDT".into(),
        last,
        mark: last,
        bid1: last,
        ask1: last,
        funding_rate: Decimal::ZERO,
    })
}

fn execution(order_id: &str, price: Decimal) -> Event {
    Event::Execution(Execution {
        header: EventHeader::new(2, 2),
        symbol: "BTCUSDT".into(),
        exec_id: format!("e-{order_id}"),
        order_id: order_id.to_string(),
        client_order_id: format!("c-{order_id}"),
        side: grid_core::core::Side::Buy,
        price,
        qty: dec!(1),
        fee: dec!(0.01),
        closed_size: Decimal::ZERO,
        leaves_qty: Decimal::ZERO,
        realized_pnl: Decimal::ZERO,
    })
}

#[test]
fn duplicate_fill_blocks_intents_but_last_close_still_advances() {
    let mut engine = StrategyEngine::new("BTCUSDT", config(), None);
    let orders = OpenOrders::default();
    engine.on_event(&ticker(dec!(100.0)), &orders).unwrap();

    engine.on_event(&execution("order-1", dec!(99.0)), &orders).unwrap();
    assert!(!engine.is_blocked());

    engine.on_event(&execution("order-2", dec!(99.0)), &orders).unwrap();
    assert!(engine.is_blocked(), "two distinct orders filling at the same price must set the blocker");

    let intents = engine.on_event(&ticker(dec!(101.0)), &orders).unwrap();
    assert!(intents.is_empty(), "a blocked engine must suppress new intents");
    assert_eq!(engine.last_close(), Some(dec!(101.0)), "last_close must still advance while blocked");
}

//! Scenario 1: grid construction from a reference price.

use grid_core::grid::{Grid, GridConfig, GridSide};
use rust_decimal_macros::dec;

fn config() -> GridConfig {
    GridConfig {
        grid_count: 10,
        grid_step: dec!(1.0),
        rebalance_threshold: dec!(0.30),
        tick_size: dec!(0.1),
    }
}

#[test]
fn builds_symmetric_ladder_around_the_reference_price() {
    let mut grid = Grid::new(config());
    grid.build(dec!(100.0)).unwrap();

    assert_eq!(grid.anchor_price(), Some(dec!(100.0)));
    assert_eq!(grid.len(), 11, "grid_count + 1 center level");

    let sells: Vec<_> = grid.levels().iter().filter(|l| l.side == GridSide::Sell).map(|l| l.price).collect();
    assert_eq!(sells, vec![dec!(101.0), dec!(102.0), dec!(103.0), dec!(104.1), dec!(105.1)]);

    let buys: Vec<_> = grid.levels().iter().filter(|l| l.side == GridSide::Buy).map(|l| l.price).collect();
    assert_eq!(buys, vec![dec!(95.1), dec!(96.1), dec!(97.0), dec!(98.0), dec!(99.0)]);
}

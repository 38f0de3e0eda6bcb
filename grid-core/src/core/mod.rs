//! Closed sum types shared across the engine: sides, directions, order
//! status, and the small value types the executor hands in and the engine
//! hands back.
//!
//! Nothing in this module performs I/O or heap-allocates beyond what
//! `String`/`Decimal` themselves require; it exists purely to replace the
//! duck-typed/string-typed enums a dynamic-language reference implementation
//! would use with closed, validated-on-construction Rust enums.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side as understood by the exchange (`Buy`/`Sell`), independent of
/// grid-level labeling (see [`crate::grid::GridSide`], which additionally has
/// `Wait`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "Buy"),
            Side::Sell => write!(f, "Sell"),
        }
    }
}

/// Which paired position a level, intent, or fill belongs to. Grid trading
/// runs a long ladder and a short ladder simultaneously; `Direction` is what
/// keeps them from being conflated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
        }
    }
}

impl Direction {
    /// The other side of the pair. Used when a risk rule instructs the
    /// opposite manager to adjust its own multiplier.
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }

    /// Bybit `positionIdx` convention used on the wire payload for Place
    /// intents: 1 for long (one-way hedge mode), 2 for short.
    pub fn position_idx(self) -> u8 {
        match self {
            Direction::Long => 1,
            Direction::Short => 2,
        }
    }
}

/// Order lifecycle status as reported by `OrderUpdate` / `Execution` events.
/// The V5 API's legacy `Active` status is intentionally absent — it is
/// ignored wherever it would otherwise appear (see
/// [`crate::event::Event::OrderUpdate`] handling in the engine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    /// `New` and `PartiallyFilled` keep an order counted as pending/open;
    /// the other three are terminal.
    pub fn is_open(self) -> bool {
        matches!(self, OrderStatus::New | OrderStatus::PartiallyFilled)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_open()
    }
}

/// Why a Cancel intent was emitted. Closed so every call site is forced to
/// pick one of the reasons the spec actually names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelReason {
    /// Too many open orders relative to grid size; the grid is being rebuilt.
    Rebuild,
    /// An order exists at a grid price but its side no longer matches the
    /// level's current label.
    SideMismatch,
    /// An order's price is no longer present in the current grid.
    OutsideGrid,
    /// Backtest wind-down: close-all mode cancelling resting orders before
    /// the synthetic closing fill.
    WindDown,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CancelReason::Rebuild => "rebuild",
            CancelReason::SideMismatch => "side_mismatch",
            CancelReason::OutsideGrid => "outside_grid",
            CancelReason::WindDown => "wind_down",
        };
        write!(f, "{}", s)
    }
}

/// How a backtest run treats positions still open at the end of the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum WindDownMode {
    /// Equity uses final unrealized PnL at the last tick.
    #[default]
    LeaveOpen,
    /// Force a synthetic closing fill at the last price for every open
    /// position, realize PnL, then recompute unrealized to zero.
    CloseAll,
}

/// An order as reported by the executor in the `open_orders` map passed into
/// `on_event`. Mirrors §6's `Order{order_id, client_order_id, price, side,
/// qty}` exactly — the engine never adds fields the executor didn't supply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub client_order_id: String,
    pub price: Decimal,
    pub side: Side,
    pub qty: Decimal,
}

/// Read-only per-symbol rounding parameters the executor supplies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentInfo {
    pub tick_size: Decimal,
    pub qty_step: Decimal,
}

impl InstrumentInfo {
    /// `round(p / tick_size) * tick_size`, half-up. The single rounding
    /// helper the Grid and every externally-visible price go through.
    pub fn round_price(&self, price: Decimal) -> Decimal {
        round_to_step(price, self.tick_size)
    }

    /// Ceiling-round a quantity up to `qty_step`. Rounding *down* can violate
    /// the exchange's minimum order size, so the quantity calculator always
    /// rounds up, never down or to-nearest.
    pub fn round_qty_up(&self, qty: Decimal) -> Decimal {
        round_up_to_step(qty, self.qty_step)
    }
}

/// `round(value / step) * step`, half-up (away from zero on a tie).
///
/// `Decimal::round()` defaults to banker's rounding (half-to-even), which
/// does not match the spec's half-up requirement, so the midpoint strategy
/// is picked explicitly.
pub fn round_to_step(value: Decimal, step: Decimal) -> Decimal {
    if step.is_zero() {
        return value;
    }
    let units = (value / step).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    units * step
}

/// `ceil(value / step) * step`.
pub fn round_up_to_step(value: Decimal, step: Decimal) -> Decimal {
    if step.is_zero() {
        return value;
    }
    let units = (value / step).ceil();
    units * step
}

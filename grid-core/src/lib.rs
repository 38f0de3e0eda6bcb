//! grid-core - deterministic grid trading strategy engine for crypto linear
//! perpetual futures.
//!
//! The crate is organized around one invariant: everything under `engine`,
//! `grid`, `risk`, `quantity`, and `intent` is pure and side-effect-free. No
//! module here opens a socket, reads a clock, or calls an exchange. A caller
//! (a live executor, or the `backtest` simulator in this crate) supplies
//! events and open-order snapshots and receives back a list of intents to
//! realize; the one exception is `anchor`, which persists a tiny JSON record
//! between restarts and is the crate's only I/O boundary.
//!
//! ## Modules
//! - `core`: shared sum types (`Side`, `Direction`, `Order`, `InstrumentInfo`)
//! - `grid`: the price ladder and its rebuild/relabel/center logic
//! - `risk`: paired long/short position risk multipliers
//! - `intent`: declarative `PlaceLimit`/`Cancel` output and client-order-id hashing
//! - `event`: the normalized event sum type the engine consumes
//! - `engine`: the strategy engine itself, `StrategyEngine::on_event`
//! - `anchor`: grid anchor persistence (the one I/O boundary)
//! - `quantity`: sizing formulas turning a declarative spec into an order qty
//! - `notify`: alerting interface used by the same-order blocker
//! - `backtest`: fill simulator and session metrics for offline replay
//! - `errors`: the four domain error enums

pub mod anchor;
pub mod backtest;
pub mod core;
pub mod engine;
pub mod errors;
pub mod event;
pub mod grid;
pub mod intent;
pub mod notify;
pub mod quantity;
pub mod risk;

pub use engine::StrategyEngine;
pub use errors::{BacktestError, EngineError, GridError, RiskError};
pub use event::Event;
pub use grid::Grid;
pub use intent::Intent;

/// Convenience re-exports for the common case of driving `StrategyEngine`
/// from an executor or a backtest harness.
pub mod prelude {
    pub use crate::anchor::{AnchorRecord, AnchorStore, InMemoryAnchorStore, JsonFileAnchorStore};
    pub use crate::backtest::{BacktestRunner, MarketTick, SessionMetrics, SymbolConfig};
    pub use crate::core::{CancelReason, Direction, InstrumentInfo, Order, OrderStatus, Side, WindDownMode};
    pub use crate::engine::{OpenOrders, StrategyEngine};
    pub use crate::errors::{BacktestError, EngineError, GridError, RiskError};
    pub use crate::event::{Event, EventHeader, Execution, OrderUpdate, PublicTrade, Ticker};
    pub use crate::grid::{Grid, GridConfig, GridLevel, GridSide};
    pub use crate::intent::{Cancel, Intent, PlaceLimit};
    pub use crate::notify::{NotificationSink, NullSink, ThrottledSink};
    pub use crate::quantity::{QuantityCalculator, QuantityFormula, UniformQuantityCalculator};
    pub use crate::risk::{AmountMultiplier, ManagerId, PositionRiskManager, PositionState, RiskConfig, RiskManagerArena};
}

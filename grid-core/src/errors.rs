//! Domain-specific error types for the grid engine core.
//!
//! These mirror the four error kinds the core distinguishes: programmer
//! contract violations, data-validity failures, business-rule breaches, and
//! out-of-band informational conditions. Only the first two are modeled as
//! `Result::Err` here — business-rule breaches are state (see
//! `engine::SameOrderBlocker`) and informational conditions go through
//! `tracing`, never through these types.

use std::fmt;

use rust_decimal::Decimal;

/// Failures building or updating the price grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    /// Two grid levels rounded to the same price. Indicates `tick_size` is
    /// too coarse relative to `grid_step * reference_price`.
    DuplicatePrice {
        price: Decimal,
        reference_price: Decimal,
    },
    /// `grid_count` must be nonzero and even (the center Wait level is added
    /// separately to reach `grid_count + 1`).
    InvalidGridCount { grid_count: u32 },
    /// `tick_size` must be strictly positive.
    InvalidTickSize { tick_size: Decimal },
    /// `grid_step` must be strictly positive.
    InvalidGridStep { grid_step: Decimal },
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridError::DuplicatePrice {
                price,
                reference_price,
            } => write!(
                f,
                "duplicate grid price {} building from reference {}: tick_size too coarse for grid_step",
                price, reference_price
            ),
            GridError::InvalidGridCount { grid_count } => {
                write!(f, "grid_count must be a positive even number, got {}", grid_count)
            }
            GridError::InvalidTickSize { tick_size } => {
                write!(f, "tick_size must be positive, got {}", tick_size)
            }
            GridError::InvalidGridStep { grid_step } => {
                write!(f, "grid_step must be positive, got {}", grid_step)
            }
        }
    }
}

impl std::error::Error for GridError {}

/// Failures in the position risk manager's contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiskError {
    /// `calculate_amount_multiplier` was called before `link()` paired this
    /// manager with its opposite-direction counterpart.
    MissingOppositeLink,
    /// Wallet balance must be strictly positive to compute margin ratios.
    NonPositiveWalletBalance { wallet_balance: Decimal },
}

impl fmt::Display for RiskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskError::MissingOppositeLink => {
                write!(f, "position risk manager has no opposite-direction link")
            }
            RiskError::NonPositiveWalletBalance { wallet_balance } => {
                write!(f, "wallet_balance must be positive, got {}", wallet_balance)
            }
        }
    }
}

impl std::error::Error for RiskError {}

/// Failures in the strategy engine's contract with its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The `open_orders` map for one direction contained two orders with the
    /// same `order_id` — the executor is expected to deliver a consistent
    /// snapshot.
    DuplicateOrderId { order_id: String },
    /// A grid build triggered by this event failed. Fatal to that event's
    /// dispatch; the engine's prior state is left untouched.
    Grid(GridError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::DuplicateOrderId { order_id } => {
                write!(f, "open_orders map contains duplicate order_id {}", order_id)
            }
            EngineError::Grid(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<GridError> for EngineError {
    fn from(e: GridError) -> Self {
        EngineError::Grid(e)
    }
}

/// Failures in the backtest fill simulator's contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BacktestError {
    /// `run(start, end)` was given a tick stream out of `(exchange_ts,
    /// local_ts)` order.
    OutOfOrderTicks { at_index: usize },
    /// `run` was called with no ticks at all.
    EmptyTickStream,
}

impl fmt::Display for BacktestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BacktestError::OutOfOrderTicks { at_index } => {
                write!(f, "tick stream out of order at index {}", at_index)
            }
            BacktestError::EmptyTickStream => write!(f, "tick stream is empty"),
        }
    }
}

impl std::error::Error for BacktestError {}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn grid_error_display() {
        let err = GridError::DuplicatePrice {
            price: dec!(100.0),
            reference_price: dec!(100.0),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("duplicate grid price"));
    }

    #[test]
    fn risk_error_display() {
        let err = RiskError::MissingOppositeLink;
        assert!(format!("{}", err).contains("opposite-direction link"));
    }
}

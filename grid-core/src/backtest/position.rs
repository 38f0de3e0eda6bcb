//! Per-direction position tracking for the backtest simulator: weighted
//! average entry price on increases, VWAP-against-entry realization on
//! decreases, commission always subtracted from realized PnL.

use rust_decimal::Decimal;

use crate::core::Direction;

#[derive(Debug, Clone)]
pub struct PositionTracker {
    direction: Direction,
    size: Decimal,
    entry_price: Decimal,
    realized_pnl: Decimal,
    commission_paid: Decimal,
}

impl PositionTracker {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            size: Decimal::ZERO,
            entry_price: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            commission_paid: Decimal::ZERO,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn size(&self) -> Decimal {
        self.size
    }

    pub fn entry_price(&self) -> Decimal {
        self.entry_price
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    pub fn commission_paid(&self) -> Decimal {
        self.commission_paid
    }

    pub fn is_empty(&self) -> bool {
        self.size.is_zero()
    }

    pub fn position_value(&self, mark: Decimal) -> Decimal {
        self.size * mark
    }

    pub fn unrealized_pnl(&self, mark: Decimal) -> Decimal {
        if self.is_empty() {
            return Decimal::ZERO;
        }
        match self.direction {
            Direction::Long => (mark - self.entry_price) * self.size,
            Direction::Short => (self.entry_price - mark) * self.size,
        }
    }

    /// Apply one fill. `increasing` tells whether this fill grows this
    /// direction's exposure (opening) or shrinks it (closing) — the caller
    /// resolves that from side + direction before calling in.
    pub fn apply_fill(&mut self, qty: Decimal, price: Decimal, fee: Decimal, increasing: bool) {
        if increasing {
            let new_size = self.size + qty;
            self.entry_price = (self.entry_price * self.size + price * qty) / new_size;
            self.size = new_size;
        } else {
            let closing_qty = qty.min(self.size);
            let pnl_per_unit = match self.direction {
                Direction::Long => price - self.entry_price,
                Direction::Short => self.entry_price - price,
            };
            self.realized_pnl += pnl_per_unit * closing_qty;
            self.size -= closing_qty;
            if self.size.is_zero() {
                self.entry_price = Decimal::ZERO;
            }
            // entry_price is left untouched for the remaining size, matching
            // the linear-perpetual convention of not re-averaging on a
            // partial close.
        }
        self.realized_pnl -= fee;
        self.commission_paid += fee;
    }

    /// Force a synthetic closing fill at `price` for the entire remaining
    /// size, used by wind-down close-all mode. No-op if already flat.
    pub fn close_all(&mut self, price: Decimal, commission_rate: Decimal) {
        if self.is_empty() {
            return;
        }
        let qty = self.size;
        let fee = qty * price * commission_rate;
        self.apply_fill(qty, price, fee, false);
    }
}

/// Whether a fill with `side` on a position tracker of `direction` grows
/// (`false`) or shrinks (`true`) that direction's exposure. Shares the same
/// table as [`crate::engine::blocker::infer_direction`], inverted.
pub fn is_closing_fill(side: crate::core::Side, direction: Direction) -> bool {
    use crate::core::Side;
    matches!(
        (direction, side),
        (Direction::Long, Side::Sell) | (Direction::Short, Side::Buy)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Side;
    use rust_decimal_macros::dec;

    #[test]
    fn weighted_average_entry_on_increase() {
        let mut tracker = PositionTracker::new(Direction::Long);
        tracker.apply_fill(dec!(1), dec!(100), Decimal::ZERO, true);
        tracker.apply_fill(dec!(1), dec!(110), Decimal::ZERO, true);
        assert_eq!(tracker.size(), dec!(2));
        assert_eq!(tracker.entry_price(), dec!(105));
    }

    #[test]
    fn scenario_6_close_all_realizes_pnl_and_zeroes_unrealized() {
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
    fn partial_close_keeps_entry_price_for_remainder() {
        let mut tracker = PositionTracker::new(Direction::Short);
        tracker.apply_fill(dec!(2), dec!(100), Decimal::ZERO, true);
        tracker.apply_fill(dec!(1), dec!(90), Decimal::ZERO, false);
        assert_eq!(tracker.size(), dec!(1));
        assert_eq!(tracker.entry_price(), dec!(100));
        assert_eq!(tracker.realized_pnl(), dec!(10));
    }

    #[test]
    fn is_closing_fill_matches_direction_table() {
        assert!(!is_closing_fill(Side::Buy, Direction::Long));
        assert!(is_closing_fill(Side::Sell, Direction::Long));
        assert!(!is_closing_fill(Side::Sell, Direction::Short));
        assert!(is_closing_fill(Side::Buy, Direction::Short));
    }
}

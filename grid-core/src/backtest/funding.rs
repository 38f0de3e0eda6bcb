//! Funding settlement aligned to the exchange's 00:00/08:00/16:00 UTC
//! schedule (every 8 hours, and the Unix epoch already falls on a boundary
//! so bucketing is a plain integer division).

use rust_decimal::Decimal;

use crate::core::Direction;

const FUNDING_INTERVAL_MS: i64 = 8 * 60 * 60 * 1000;

/// Tracks which 8-hour funding bucket the replay is currently in and
/// signals exactly once per boundary crossed.
#[derive(Debug, Clone, Default)]
pub struct FundingScheduler {
    last_boundary_ms: Option<i64>,
}

impl FundingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn boundary_for(ts_ms: i64) -> i64 {
        ts_ms.div_euclid(FUNDING_INTERVAL_MS) * FUNDING_INTERVAL_MS
    }

    /// Feed the current tick's exchange timestamp. Returns `true` exactly
    /// once per 8-hour boundary crossed — never on the very first tick
    /// observed, since nothing has accrued yet to settle against.
    pub fn should_settle(&mut self, exchange_ts_ms: i64) -> bool {
        let boundary = Self::boundary_for(exchange_ts_ms);
        match self.last_boundary_ms.replace(boundary) {
            None => false,
            Some(prev) => prev != boundary,
        }
    }

    /// Reset scheduler state, required at the start of every `run(start,
    /// end)` so back-to-back runs cannot leak a boundary from the previous
    /// range into the next.
    pub fn reset(&mut self) {
        self.last_boundary_ms = None;
    }
}

/// Funding PnL contribution for one direction's position at settlement:
/// `size * mark * rate`, sign-flipped for longs since a positive rate means
/// longs pay and shorts receive.
pub fn funding_pnl(direction: Direction, size: Decimal, mark: Decimal, rate: Decimal) -> Decimal {
    let magnitude = size * mark * rate;
    match direction {
        Direction::Long => -magnitude,
        Direction::Short => magnitude,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn no_settlement_on_first_tick() {
        let mut scheduler = FundingScheduler::new();
        assert!(!scheduler.should_settle(0));
    }

    #[test]
    fn settles_once_per_eight_hour_boundary() {
        let mut scheduler = FundingScheduler::new();
        let hour = 60 * 60 * 1000;
        assert!(!scheduler.should_settle(1 * hour));
        assert!(!scheduler.should_settle(7 * hour));
        assert!(scheduler.should_settle(8 * hour), "crossed the 08:00 boundary");
        assert!(!scheduler.should_settle(8 * hour + 1));
        assert!(scheduler.should_settle(16 * hour));
    }

    #[test]
    fn reset_clears_boundary_state() {
        let mut scheduler = FundingScheduler::new();
        scheduler.should_settle(0);
        scheduler.should_settle(8 * 60 * 60 * 1000);
        scheduler.reset();
        assert!(!scheduler.should_settle(8 * 60 * 60 * 1000), "state was reset, so this looks like the first tick again");
    }

    #[test]
    fn long_pays_short_receives_when_rate_positive() {
        let rate = dec!(0.0001);
        let long_pnl = funding_pnl(Direction::Long, dec!(1), dec!(100), rate);
        let short_pnl = funding_pnl(Direction::Short, dec!(1), dec!(100), rate);
        assert!(long_pnl < Decimal::ZERO);
        assert!(short_pnl > Decimal::ZERO);
    }
}

//! Session metrics accumulated over a backtest run: trade stats, PnL
//! breakdown, drawdown, Sharpe ratio, activity, and a per-direction split.

use std::fmt;

use rust_decimal::Decimal;

use crate::core::Direction;

const MS_PER_HOUR: i64 = 60 * 60 * 1000;
const HOURS_PER_YEAR: f64 = 365.25 * 24.0;

/// Resample an equity curve to one sample per hour bucket, keeping the last
/// observation in each bucket. Raw tick-by-tick spacing is too irregular to
/// difference directly for a Sharpe ratio.
fn resample_hourly(curve: &[(i64, Decimal)]) -> Vec<Decimal> {
    let mut buckets: Vec<(i64, Decimal)> = Vec::new();
    for &(ts, equity) in curve {
        let bucket = ts.div_euclid(MS_PER_HOUR);
        match buckets.last_mut() {
            Some((last_bucket, last_equity)) if *last_bucket == bucket => *last_equity = equity,
            _ => buckets.push((bucket, equity)),
        }
    }
    buckets.into_iter().map(|(_, equity)| equity).collect()
}

/// Annualized Sharpe ratio (365.25 days/year, a 24/7 market) computed on
/// hourly-resampled equity. Uses `f64` — this is the one place in the crate
/// where that is appropriate, since the ratio itself is a dimensionless
/// statistic, not a price or quantity.
fn sharpe_ratio(curve: &[(i64, Decimal)]) -> f64 {
    use rust_decimal::prelude::ToPrimitive;

    let samples = resample_hourly(curve);
    if samples.len() < 3 {
        return 0.0;
    }
    let returns: Vec<f64> = samples
        .windows(2)
        .filter_map(|w| {
            let prev = w[0].to_f64()?;
            let next = w[1].to_f64()?;
            if prev == 0.0 {
                None
            } else {
                Some((next - prev) / prev)
            }
        })
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (returns.len() as f64 - 1.0);
    let std_dev = variance.sqrt();
    if std_dev == 0.0 {
        return 0.0;
    }
    mean / std_dev * HOURS_PER_YEAR.sqrt()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DirectionBreakdown {
    pub trade_count: usize,
    pub realized_pnl: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct SessionMetrics {
    equity_curve: Vec<(i64, Decimal)>,
    trade_pnls: Vec<(Direction, Decimal)>,
    realized_pnl_total: Decimal,
    commission_total: Decimal,
    funding_total: Decimal,
    volume_total: Decimal,
    peak_equity: Option<Decimal>,
    max_drawdown_value: Decimal,
    max_drawdown_pct: Decimal,
    current_drawdown_ticks: usize,
    max_drawdown_duration_ticks: usize,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the session's equity at this tick and update drawdown state.
    pub fn record_tick(&mut self, exchange_ts: i64, equity: Decimal) {
        self.equity_curve.push((exchange_ts, equity));

        let is_new_peak = match self.peak_equity {
            Some(peak) => equity > peak,
            None => true,
        };
        if is_new_peak {
            self.peak_equity = Some(equity);
            self.current_drawdown_ticks = 0;
        } else {
            self.current_drawdown_ticks += 1;
            self.max_drawdown_duration_ticks = self.max_drawdown_duration_ticks.max(self.current_drawdown_ticks);
        }

        let peak = self.peak_equity.unwrap();
        let drawdown = peak - equity;
        if drawdown > self.max_drawdown_value {
            self.max_drawdown_value = drawdown;
            self.max_drawdown_pct = if peak.is_zero() { Decimal::ZERO } else { drawdown / peak };
        }
    }

    /// Record a fill's activity contribution (every fill, opening or
    /// closing, adds volume and commission).
    pub fn record_fill(&mut self, qty: Decimal, price: Decimal, fee: Decimal) {
        self.volume_total += qty.abs() * price;
        self.commission_total += fee;
    }

    /// Record a closing fill's net realized PnL (already net of commission)
    /// for trade-level win/loss statistics.
    pub fn record_closing_trade(&mut self, direction: Direction, net_pnl: Decimal) {
        self.trade_pnls.push((direction, net_pnl));
    }

    /// Record the realized-PnL delta (already net of commission) produced by
    /// one fill, opening or closing, into the running session total. Kept
    /// distinct from `record_closing_trade`, which only logs closing fills
    /// for win/loss statistics — an opening fill still books a (usually
    /// negative, commission-only) realized delta that belongs in the total.
    pub fn record_realized_delta(&mut self, delta: Decimal) {
        self.realized_pnl_total += delta;
    }

    /// Record one funding settlement's contribution (positive = received,
    /// negative = paid).
    pub fn record_funding(&mut self, amount: Decimal) {
        self.funding_total += amount;
    }

    pub fn trade_count(&self) -> usize {
        self.trade_pnls.len()
    }

    pub fn wins(&self) -> usize {
        self.trade_pnls.iter().filter(|(_, pnl)| *pnl > Decimal::ZERO).count()
    }

    pub fn losses(&self) -> usize {
        self.trade_pnls.iter().filter(|(_, pnl)| *pnl < Decimal::ZERO).count()
    }

    pub fn win_rate(&self) -> f64 {
        if self.trade_pnls.is_empty() {
            return 0.0;
        }
        self.wins() as f64 / self.trade_pnls.len() as f64
    }

    pub fn average_win(&self) -> Decimal {
        average(self.trade_pnls.iter().map(|(_, p)| *p).filter(|p| *p > Decimal::ZERO))
    }

    pub fn average_loss(&self) -> Decimal {
        average(self.trade_pnls.iter().map(|(_, p)| *p).filter(|p| *p < Decimal::ZERO))
    }

    pub fn net_realized_pnl(&self) -> Decimal {
        self.realized_pnl_total
    }

    pub fn total_commission(&self) -> Decimal {
        self.commission_total
    }

    pub fn total_funding(&self) -> Decimal {
        self.funding_total
    }

    pub fn total_volume(&self) -> Decimal {
        self.volume_total
    }

    pub fn max_drawdown_value(&self) -> Decimal {
        self.max_drawdown_value
    }

    pub fn max_drawdown_pct(&self) -> Decimal {
        self.max_drawdown_pct
    }

    pub fn max_drawdown_duration_ticks(&self) -> usize {
        self.max_drawdown_duration_ticks
    }

    pub fn sharpe_ratio(&self) -> f64 {
        sharpe_ratio(&self.equity_curve)
    }

    /// Net PnL including realized, the given unrealized snapshot, and
    /// accumulated funding, net of commission (already folded into
    /// `net_realized_pnl`).
    pub fn net_pnl(&self, unrealized_pnl: Decimal) -> Decimal {
        self.net_realized_pnl() + unrealized_pnl + self.funding_total
    }

    pub fn breakdown(&self, direction: Direction) -> DirectionBreakdown {
        let mut acc = DirectionBreakdown::default();
        for (d, pnl) in &self.trade_pnls {
            if *d == direction {
                acc.trade_count += 1;
                acc.realized_pnl += *pnl;
            }
        }
        acc
    }
}

fn average(values: impl Iterator<Item = Decimal>) -> Decimal {
    let mut sum = Decimal::ZERO;
    let mut count = 0u32;
    for v in values {
        sum += v;
        count += 1;
    }
    if count == 0 {
        Decimal::ZERO
    } else {
        sum / Decimal::from(count)
    }
}

impl fmt::Display for SessionMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "trades: {} (wins {}, losses {}, win rate {:.1}%)",
            self.trade_count(), self.wins(), self.losses(), self.win_rate() * 100.0)?;
        writeln!(f, "avg win {} / avg loss {}", self.average_win(), self.average_loss())?;
        writeln!(
            f,
            "pnl: realized {} / commission {} / funding {} / net (ex-unrealized) {}",
            self.net_realized_pnl(),
            self.commission_total,
            self.funding_total,
            self.net_realized_pnl() + self.funding_total,
        )?;
        writeln!(
            f,
            "drawdown: {} ({:.2}%) over {} ticks",
            self.max_drawdown_value,
            self.max_drawdown_pct * Decimal::ONE_HUNDRED,
            self.max_drawdown_duration_ticks,
        )?;
        writeln!(f, "sharpe (annualized, hourly resample): {:.3}", self.sharpe_ratio())?;
        write!(f, "volume: {}", self.volume_total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rust_decimal_macros::dec;

    #[test]
    fn trade_stats_split_wins_and_losses() {
        let mut metrics = SessionMetrics::new();
        metrics.record_closing_trade(Direction::Long, dec!(10));
        metrics.record_closing_trade(Direction::Long, dec!(-5));
        metrics.record_closing_trade(Direction::Short, dec!(20));

        assert_eq!(metrics.trade_count(), 3);
        assert_eq!(metrics.wins(), 2);
        assert_eq!(metrics.losses(), 1);
        assert_relative_eq!(metrics.win_rate(), 2.0 / 3.0, epsilon = 1e-9);
        assert_eq!(metrics.average_win(), dec!(15));
        assert_eq!(metrics.average_loss(), dec!(-5));
    }

    #[test]
    fn drawdown_tracks_peak_to_trough() {
        let mut metrics = SessionMetrics::new();
        metrics.record_tick(0, dec!(1000));
        metrics.record_tick(1, dec!(1100));
        metrics.record_tick(2, dec!(900));
        metrics.record_tick(3, dec!(850));
        metrics.record_tick(4, dec!(1200));

        assert_eq!(metrics.max_drawdown_value(), dec!(250));
        assert_eq!(metrics.max_drawdown_duration_ticks(), 2);
    }

    #[test]
    fn per_direction_breakdown_isolates_each_side() {
        let mut metrics = SessionMetrics::new();
        metrics.record_closing_trade(Direction::Long, dec!(10));
        metrics.record_closing_trade(Direction::Short, dec!(-4));

        let long = metrics.breakdown(Direction::Long);
        assert_eq!(long.trade_count, 1);
        assert_eq!(long.realized_pnl, dec!(10));

        let short = metrics.breakdown(Direction::Short);
        assert_eq!(short.trade_count, 1);
        assert_eq!(short.realized_pnl, dec!(-4));
    }

    #[test]
    fn sharpe_ratio_is_zero_with_insufficient_samples() {
        let mut metrics = SessionMetrics::new();
        metrics.record_tick(0, dec!(1000));
        assert_relative_eq!(metrics.sharpe_ratio(), 0.0);
    }

    #[test]
    fn sharpe_ratio_is_positive_for_steadily_rising_equity() {
        let mut metrics = SessionMetrics::new();
        let hour = MS_PER_HOUR;
        for i in 0..30 {
            metrics.record_tick(i * hour, Decimal::from(1000 + i * 2));
        }
        assert!(metrics.sharpe_ratio() > 0.0);
    }
}

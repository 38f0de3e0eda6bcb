//! The price grid: a symmetric ladder of buy / wait / sell levels around an
//! anchor price, maintained as the market moves.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::round_to_step;
use crate::errors::GridError;

/// Label of a single grid level. Distinct from [`crate::core::Side`] because
/// a level can also be `Wait` — neither buy nor sell eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridSide {
    Buy,
    Wait,
    Sell,
}

/// One entry in the price ladder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridLevel {
    pub price: Decimal,
    pub side: GridSide,
}

/// Serializable grid configuration (§6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Number of non-Wait levels, symmetric (half buy, half sell). Effective
    /// grid length is `grid_count + 1` once the center Wait level is added.
    pub grid_count: u32,
    /// Percent distance between adjacent levels, e.g. `1.0` = 1%.
    pub grid_step: Decimal,
    /// Fraction imbalance above which `center()` shifts the Wait zone.
    #[serde(default = "default_rebalance_threshold")]
    pub rebalance_threshold: Decimal,
    /// Price rounding increment.
    pub tick_size: Decimal,
}

fn default_rebalance_threshold() -> Decimal {
    Decimal::new(30, 2) // 0.30
}

impl GridConfig {
    pub fn validate(&self) -> Result<(), GridError> {
        if self.grid_count == 0 || self.grid_count % 2 != 0 {
            return Err(GridError::InvalidGridCount {
                grid_count: self.grid_count,
            });
        }
        if self.tick_size <= Decimal::ZERO {
            return Err(GridError::InvalidTickSize {
                tick_size: self.tick_size,
            });
        }
        if self.grid_step <= Decimal::ZERO {
            return Err(GridError::InvalidGridStep {
                grid_step: self.grid_step,
            });
        }
        Ok(())
    }

    fn half(&self) -> u32 {
        self.grid_count / 2
    }
}

/// Outcome of a call to [`Grid::update`], surfaced so the caller (the
/// strategy engine) can log or react, without the grid itself raising an
/// exception for these informational conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Both inputs were `None`; nothing happened.
    NoOp,
    /// Levels were re-labeled in place (and possibly rebalanced).
    Relabeled,
    /// `last_close` moved outside `[min, max]`; the grid was rebuilt.
    Rebuilt,
}

/// The price ladder itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    config: GridConfig,
    levels: Vec<GridLevel>,
    /// The Wait-zone price at initial build, persisted so a restart can
    /// rebuild an identical grid.
    anchor_price: Option<Decimal>,
}

impl Grid {
    pub fn new(config: GridConfig) -> Self {
        Self {
            config,
            levels: Vec::new(),
            anchor_price: None,
        }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn levels(&self) -> &[GridLevel] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn anchor_price(&self) -> Option<Decimal> {
        self.anchor_price
    }

    pub fn min_price(&self) -> Option<Decimal> {
        self.levels.first().map(|l| l.price)
    }

    pub fn max_price(&self) -> Option<Decimal> {
        self.levels.last().map(|l| l.price)
    }

    /// `round(p / tick_size) * tick_size`, half-up.
    pub fn round_price(&self, price: Decimal) -> Decimal {
        round_to_step(price, self.config.tick_size)
    }

    /// Half the tolerance band within which a level is labeled `Wait` rather
    /// than `Buy`/`Sell` during `update`, and the "too close" collapse guard
    /// in `center`. Pinned at `tick_size / 2`: a level rounds to the exact
    /// same tick as `last_close` if and only if it falls inside this band.
    fn wait_tolerance(&self) -> Decimal {
        self.config.tick_size / Decimal::TWO
    }

    /// Discard any existing levels and build a fresh ladder from
    /// `reference_price`. Fails if any two rounded prices collide, which
    /// indicates `tick_size` is too coarse relative to `grid_step *
    /// reference_price`.
    pub fn build(&mut self, reference_price: Decimal) -> Result<(), GridError> {
        self.config.validate()?;
        let half = self.config.half();
        let step = self.config.grid_step / Decimal::ONE_HUNDRED;

        let center_price = self.round_price(reference_price);
        let mut prices = vec![center_price];

        let mut factor_up = Decimal::ONE + step;
        let mut factor_down = Decimal::ONE - step;
        for _ in 0..half {
            prices.push(self.round_price(reference_price * factor_up));
            prices.push(self.round_price(reference_price * factor_down));
            factor_up *= Decimal::ONE + step;
            factor_down *= Decimal::ONE - step;
        }

        prices.sort();
        for w in prices.windows(2) {
            if w[0] == w[1] {
                return Err(GridError::DuplicatePrice {
                    price: w[0],
                    reference_price,
                });
            }
        }

        let levels = prices
            .into_iter()
            .map(|price| GridLevel {
                price,
                side: if price == center_price {
                    GridSide::Wait
                } else if price < center_price {
                    GridSide::Buy
                } else {
                    GridSide::Sell
                },
            })
            .collect();

        self.levels = levels;
        self.anchor_price = Some(center_price);
        info!(reference_price = %reference_price, levels = self.levels.len(), "grid built");
        Ok(())
    }

    /// Build from a previously persisted anchor, recording it as the anchor
    /// again (round-trip identity, §8 property 6).
    pub fn build_from_anchor(&mut self, anchor_price: Decimal) -> Result<(), GridError> {
        self.build(anchor_price)
    }

    /// Re-label every level's side from `last_close`, then rebalance.
    /// Rebuilds instead if `last_close` has moved outside `[min, max]`. A
    /// no-op if both arguments are `None`.
    pub fn update(
        &mut self,
        last_filled_price: Option<Decimal>,
        last_close: Option<Decimal>,
    ) -> Result<UpdateOutcome, GridError> {
        let relabel_price = match last_close.or(last_filled_price) {
            Some(p) => p,
            None => return Ok(UpdateOutcome::NoOp),
        };

        if self.is_empty() {
            self.build(relabel_price)?;
            return Ok(UpdateOutcome::Rebuilt);
        }

        let (min, max) = (self.min_price().unwrap(), self.max_price().unwrap());
        if relabel_price < min || relabel_price > max {
            info!(
                last_close = %relabel_price, min = %min, max = %max,
                "last_close outside grid bounds, rebuilding"
            );
            self.build(relabel_price)?;
            return Ok(UpdateOutcome::Rebuilt);
        }

        let tolerance = self.wait_tolerance();
        for level in &mut self.levels {
            level.side = if (level.price - relabel_price).abs() <= tolerance {
                GridSide::Wait
            } else if level.price < relabel_price {
                GridSide::Buy
            } else {
                GridSide::Sell
            };
        }

        self.center();
        debug!(last_close = %relabel_price, "grid relabeled");
        Ok(UpdateOutcome::Relabeled)
    }

    /// Index of the first non-Buy level: where the market currently sits,
    /// structurally. Falls back to `len()` if every level is still Buy
    /// (degenerate, but keeps distance-ordering well-defined).
    pub fn center_index(&self) -> usize {
        self.levels
            .iter()
            .position(|l| l.side != GridSide::Buy)
            .unwrap_or(self.levels.len())
    }

    /// All levels paired with their index, ordered by ascending distance
    /// from [`Grid::center_index`]. Used by the placement routine so the
    /// levels nearest the current price — the ones most likely to fill next
    /// — are considered first.
    pub fn levels_by_distance_from_center(&self) -> Vec<(usize, &GridLevel)> {
        let center = self.center_index() as i64;
        let mut indexed: Vec<(usize, &GridLevel)> = self.levels.iter().enumerate().collect();
        indexed.sort_by_key(|(idx, _)| (*idx as i64 - center).abs());
        indexed
    }

    fn count_sides(&self) -> (usize, usize, usize) {
        let mut buy = 0;
        let mut wait = 0;
        let mut sell = 0;
        for level in &self.levels {
            match level.side {
                GridSide::Buy => buy += 1,
                GridSide::Wait => wait += 1,
                GridSide::Sell => sell += 1,
            }
        }
        (buy, wait, sell)
    }

    /// Shift the Wait zone toward the heavier side when one side has more
    /// than `rebalance_threshold` fraction more levels than the other.
    ///
    /// Runs once per call (it is invoked every tick by `update`, so the grid
    /// corrects gradually rather than snapping to perfect balance in a
    /// single tick): it converts the single Buy/Sell level nearest the Wait
    /// zone on the heavier side into a Wait level. A "too close" guard skips
    /// the shift when the Wait zone is already down to one level and its two
    /// neighbors are less than one tick apart — shifting further there would
    /// just flap the same level back and forth against the tolerance band
    /// in `update`.
    pub fn center(&mut self) {
        let (buy, wait, sell) = self.count_sides();
        let total = buy + sell;
        if total == 0 {
            return;
        }
        let imbalance = (buy as i64 - sell as i64).unsigned_abs() as f64 / total as f64;
        if imbalance <= self.config.rebalance_threshold_f64() {
            return;
        }
        if wait == 1 && self.is_too_close_to_shrink() {
            return;
        }

        if buy > sell {
            self.convert_highest(GridSide::Buy);
        } else if sell > buy {
            self.convert_lowest(GridSide::Sell);
        }
    }

    /// True when the two levels immediately bracketing a single-level Wait
    /// zone are closer than one tick_size apart — converting either into
    /// Wait would leave a degenerate ladder.
    fn is_too_close_to_shrink(&self) -> bool {
        let wait_idx = match self.levels.iter().position(|l| l.side == GridSide::Wait) {
            Some(i) => i,
            None => return false,
        };
        let below = wait_idx.checked_sub(1).and_then(|i| self.levels.get(i));
        let above = self.levels.get(wait_idx + 1);
        match (below, above) {
            (Some(b), Some(a)) => (a.price - b.price) < self.config.tick_size * Decimal::TWO,
            _ => false,
        }
    }

    fn convert_highest(&mut self, side: GridSide) -> bool {
        if let Some(idx) = self.levels.iter().rposition(|l| l.side == side) {
            self.levels[idx].side = GridSide::Wait;
            true
        } else {
            false
        }
    }

    fn convert_lowest(&mut self, side: GridSide) -> bool {
        if let Some(idx) = self.levels.iter().position(|l| l.side == side) {
            self.levels[idx].side = GridSide::Wait;
            true
        } else {
            false
        }
    }
}

impl GridConfig {
    fn rebalance_threshold_f64(&self) -> f64 {
        use rust_decimal::prelude::ToPrimitive;
        self.rebalance_threshold.to_f64().unwrap_or(0.30)
    }
}

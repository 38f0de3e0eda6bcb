//! Position risk management: paired long/short state and the per-side size
//! multipliers derived from liquidation, margin, and position-ratio rules.
//!
//! Long and short managers reference each other, which is awkward to express
//! as owning references in Rust. Rather than `Rc<RefCell<_>>`, this module
//! uses an arena ([`RiskManagerArena`]) plus index-based links: both
//! managers are constructed, pushed into the arena, then paired with
//! [`RiskManagerArena::link`], which stores each manager's opposite as a
//! plain `usize` index rather than a shared owning reference.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::Direction;
use crate::errors::RiskError;

/// Per-direction position snapshot, passed fresh into `calculate` on every
/// risk evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionState {
    pub size: Decimal,
    pub entry_price: Decimal,
    pub liquidation_price: Decimal,
    pub position_value: Decimal,
    pub leverage: Decimal,
    pub unrealized_pnl: Decimal,
}

impl PositionState {
    pub fn flat() -> Self {
        Self {
            size: Decimal::ZERO,
            entry_price: Decimal::ZERO,
            liquidation_price: Decimal::ZERO,
            position_value: Decimal::ZERO,
            leverage: Decimal::ONE,
            unrealized_pnl: Decimal::ZERO,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size.is_zero()
    }

    /// Unrealized PnL as a percentage of margin, using the reciprocal ROE
    /// formula the exchange uses for linear perpetuals rather than
    /// `(close - entry) / entry`:
    ///
    /// - long:  `(1/entry - 1/close) * entry * 100 * leverage`
    /// - short: `(1/close - 1/entry) * entry * 100 * leverage`
    pub fn unrealized_pnl_pct(&self, direction: Direction, last_close: Decimal) -> Decimal {
        if self.entry_price.is_zero() || last_close.is_zero() {
            return Decimal::ZERO;
        }
        let inv_entry = Decimal::ONE / self.entry_price;
        let inv_close = Decimal::ONE / last_close;
        let diff = match direction {
            Direction::Long => inv_entry - inv_close,
            Direction::Short => inv_close - inv_entry,
        };
        diff * self.entry_price * Decimal::ONE_HUNDRED * self.leverage
    }
}

/// Per-side order-size scaling factors. Reset to `{1.0, 1.0}` at the start
/// of every `calculate` call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmountMultiplier {
    pub buy: Decimal,
    pub sell: Decimal,
}

impl Default for AmountMultiplier {
    fn default() -> Self {
        Self {
            buy: Decimal::ONE,
            sell: Decimal::ONE,
        }
    }
}

/// Serializable risk configuration (§6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Long liquidation danger threshold.
    #[serde(default = "default_min_liq_ratio")]
    pub min_liq_ratio: Decimal,
    /// Short liquidation danger threshold.
    #[serde(default = "default_max_liq_ratio")]
    pub max_liq_ratio: Decimal,
    /// Per-position margin cap (wallet fraction). Consulted by the executor
    /// when sizing orders; not itself one of the priority rules in
    /// `calculate`.
    pub max_margin: Decimal,
    /// Total-margin lower bound below which the low-margin rule fires.
    #[serde(default = "default_min_total_margin")]
    pub min_total_margin: Decimal,
}

fn default_min_liq_ratio() -> Decimal {
    Decimal::new(8, 1) // 0.8
}
fn default_max_liq_ratio() -> Decimal {
    Decimal::new(12, 1) // 1.2
}
fn default_min_total_margin() -> Decimal {
    Decimal::new(15, 2) // 0.15
}

/// Pending cross-manager instruction: a moderate-liquidation rule on one
/// side writes into the *opposite* manager's pending override rather than
/// its own multiplier. The override is consumed (applied, then cleared) the
/// next time the opposite manager's own `calculate` runs, so a write made
/// this turn survives only until the opposite side is evaluated this same
/// turn — it never leaks into a later, unrelated turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
struct PendingOverride {
    buy: Option<Decimal>,
    sell: Option<Decimal>,
}

/// One direction's risk manager. Holds the last position snapshot handed to
/// it (so the *opposite* manager can read it without the caller threading
/// both states through every call) plus a non-owning link to its opposite.
#[derive(Debug, Clone)]
pub struct PositionRiskManager {
    direction: Direction,
    config: RiskConfig,
    state: PositionState,
    opposite: Option<usize>,
    pending_override: PendingOverride,
}

impl PositionRiskManager {
    pub fn new(direction: Direction, config: RiskConfig) -> Self {
        Self {
            direction,
            config,
            state: PositionState::flat(),
            opposite: None,
            pending_override: PendingOverride::default(),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn state(&self) -> &PositionState {
        &self.state
    }
}

/// Handle into a [`RiskManagerArena`]. Opaque on purpose: callers should not
/// rely on it being a bare index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ManagerId(usize);

/// Owns a pair (or more generally, a set) of [`PositionRiskManager`]s and
/// resolves their opposite-direction links by index instead of by shared
/// owning reference.
#[derive(Debug, Clone, Default)]
pub struct RiskManagerArena {
    managers: Vec<PositionRiskManager>,
}

impl RiskManagerArena {
    pub fn new() -> Self {
        Self {
            managers: Vec::new(),
        }
    }

    /// Construct a long/short pair with the given configs, link them to each
    /// other, and return their handles as `(long, short)`.
    pub fn new_pair(long_config: RiskConfig, short_config: RiskConfig) -> (Self, ManagerId, ManagerId) {
        let mut arena = Self::new();
        let long_id = arena.push(PositionRiskManager::new(Direction::Long, long_config));
        let short_id = arena.push(PositionRiskManager::new(Direction::Short, short_config));
        arena.link(long_id, short_id);
        (arena, long_id, short_id)
    }

    pub fn push(&mut self, manager: PositionRiskManager) -> ManagerId {
        self.managers.push(manager);
        ManagerId(self.managers.len() - 1)
    }

    /// Pair two managers as each other's opposite.
    pub fn link(&mut self, a: ManagerId, b: ManagerId) {
        self.managers[a.0].opposite = Some(b.0);
        self.managers[b.0].opposite = Some(a.0);
    }

    pub fn get(&self, id: ManagerId) -> &PositionRiskManager {
        &self.managers[id.0]
    }

    fn pair_mut(&mut self, a: usize, b: usize) -> (&mut PositionRiskManager, &mut PositionRiskManager) {
        assert_ne!(a, b, "a manager cannot be its own opposite");
        if a < b {
            let (left, right) = self.managers.split_at_mut(b);
            (&mut left[a], &mut right[0])
        } else {
            let (left, right) = self.managers.split_at_mut(a);
            (&mut right[0], &mut left[b])
        }
    }

    /// Compute `{Buy, Sell}` size multipliers for `id`'s direction given a
    /// fresh position snapshot.
    ///
    /// Validates the opposite link is present (a missing link is a
    /// programmer contract violation, not a silent no-op) and that
    /// `wallet_balance` is positive before running the priority-ordered rule
    /// chain from §4.2.
    pub fn calculate(
        &mut self,
        id: ManagerId,
        state: PositionState,
        last_close: Decimal,
        wallet_balance: Decimal,
    ) -> Result<AmountMultiplier, RiskError> {
        if wallet_balance <= Decimal::ZERO {
            return Err(RiskError::NonPositiveWalletBalance { wallet_balance });
        }
        let opposite_idx = self.managers[id.0]
            .opposite
            .ok_or(RiskError::MissingOppositeLink)?;

        self.managers[id.0].state = state;

        let (this, opposite) = self.pair_mut(id.0, opposite_idx);
        let mut mult = AmountMultiplier::default();

        match this.direction {
            Direction::Long => apply_long_rules(this, opposite, last_close, wallet_balance, &mut mult),
            Direction::Short => apply_short_rules(this, opposite, last_close, wallet_balance, &mut mult),
        }

        if let Some(buy) = this.pending_override.buy.take() {
            mult.buy = buy;
        }
        if let Some(sell) = this.pending_override.sell.take() {
            mult.sell = sell;
        }

        Ok(mult)
    }
}

fn liq_ratio(state: &PositionState, last_close: Decimal) -> Decimal {
    if last_close.is_zero() {
        return Decimal::ZERO;
    }
    state.liquidation_price / last_close
}

/// `self_size / opposite_size`, using the documented sentinels when the
/// opposite side is flat: infinite if self has size and opposite doesn't,
/// zero if neither does.
fn position_ratio(this: &PositionState, opposite: &PositionState) -> Decimal {
    if opposite.size.is_zero() {
        if this.size.is_zero() {
            Decimal::ZERO
        } else {
            Decimal::MAX
        }
    } else {
        this.size / opposite.size
    }
}

fn total_margin(this: &PositionState, opposite: &PositionState, wallet_balance: Decimal) -> Decimal {
    (this.position_value + opposite.position_value) / wallet_balance
}

fn apply_long_rules(
    this: &mut PositionRiskManager,
    opposite: &mut PositionRiskManager,
    last_close: Decimal,
    wallet_balance: Decimal,
    mult: &mut AmountMultiplier,
) {
    let liq = liq_ratio(&this.state, last_close);
    let ratio = position_ratio(&this.state, &opposite.state);
    let margin = total_margin(&this.state, &opposite.state, wallet_balance);

    // 1. Emergency liquidation risk: decrease long faster.
    if liq > this.config.min_liq_ratio * Decimal::new(105, 2) {
        mult.sell = Decimal::new(15, 1); // 1.5
        return;
    }

    // 2. Moderate liquidation risk: slow the short's growth instead of
    // touching this side's own multipliers.
    if liq > this.config.min_liq_ratio {
        opposite.pending_override.buy = Some(Decimal::new(5, 1)); // 0.5
        return;
    }

    // 3. Low margin: size up the smaller side, size down the larger one.
    if margin < this.config.min_total_margin {
        size_up_smaller_side(this, opposite, ratio, mult);
        return;
    }

    // 4. Losing and tiny relative to the opposite side.
    if ratio < Decimal::new(5, 1) && this.state.unrealized_pnl < Decimal::ZERO {
        mult.buy = Decimal::TWO;
        return;
    }

    // 5. Severely tiny relative to the opposite side.
    if ratio < Decimal::new(20, 2) {
        mult.buy = Decimal::TWO;
    }
}

fn apply_short_rules(
    this: &mut PositionRiskManager,
    opposite: &mut PositionRiskManager,
    last_close: Decimal,
    wallet_balance: Decimal,
    mult: &mut AmountMultiplier,
) {
    let liq = liq_ratio(&this.state, last_close);
    let ratio = position_ratio(&this.state, &opposite.state);
    let margin = total_margin(&this.state, &opposite.state, wallet_balance);

    // 1. Emergency liquidation risk (higher liq_ratio = closer to
    // liquidation for a short).
    if liq > this.config.max_liq_ratio * Decimal::new(95, 2) {
        mult.buy = Decimal::new(15, 1); // 1.5
        return;
    }

    // 2. Low margin: symmetric with the long side.
    if margin < this.config.min_total_margin {
        size_up_smaller_side(this, opposite, ratio, mult);
        return;
    }

    // 3. Losing and oversized relative to the opposite side.
    if ratio > Decimal::TWO && this.state.unrealized_pnl < Decimal::ZERO {
        mult.sell = Decimal::TWO;
        return;
    }

    // 4. Severely oversized relative to the opposite side.
    if ratio > Decimal::new(5, 0) {
        mult.sell = Decimal::TWO;
        return;
    }

    // 5. Moderate liquidation risk, checked last for shorts: the directional
    // hedge via the opposite long is the right remediation once no
    // position-sizing rule above already fired.
    if liq > Decimal::ZERO && liq < this.config.max_liq_ratio {
        opposite.pending_override.sell = Some(Decimal::new(5, 1)); // 0.5
    }
}

/// Low-margin remediation shared by both directions: double the
/// smaller-position side's increasing-side multiplier and halve its
/// decreasing-side multiplier, to restore balance between the pair.
fn size_up_smaller_side(
    this: &mut PositionRiskManager,
    opposite: &mut PositionRiskManager,
    ratio: Decimal,
    mult: &mut AmountMultiplier,
) {
    let this_is_smaller = ratio < Decimal::ONE;
    let (increasing, decreasing) = match this.direction {
        Direction::Long => (&mut mult.buy, &mut mult.sell),
        Direction::Short => (&mut mult.sell, &mut mult.buy),
    };
    if this_is_smaller {
        *increasing = Decimal::TWO;
        *decreasing = Decimal::new(5, 1);
    } else {
        let opposite_override = match opposite.direction {
            Direction::Long => (&mut opposite.pending_override.buy, &mut opposite.pending_override.sell),
            Direction::Short => (&mut opposite.pending_override.sell, &mut opposite.pending_override.buy),
        };
        *opposite_override.0 = Some(Decimal::TWO);
        *opposite_override.1 = Some(Decimal::new(5, 1));
    }
}

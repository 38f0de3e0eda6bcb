//! Backtest fill simulator: replays a chronological tick stream through the
//! same strategy engine used live, resolving fills with the strict-cross
//! model and tracking positions, funding, commission, and session metrics.

pub mod metrics;
mod broker;
mod funding;
mod position;

pub use broker::SimulatedBroker;
pub use funding::{funding_pnl, FundingScheduler};
pub use metrics::{DirectionBreakdown, SessionMetrics};
pub use position::PositionTracker;

use std::collections::HashMap;

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::anchor::AnchorRecord;
use crate::core::{Direction, WindDownMode};
use crate::engine::StrategyEngine;
use crate::errors::BacktestError;
use crate::event::{Event, EventHeader, Ticker};
use crate::grid::GridConfig;
use crate::quantity::QuantityCalculator;

use position::is_closing_fill;

/// One normalized market update for a single symbol, the backtest's unit of
/// replay. Ticks across symbols are interleaved in a single chronological
/// stream, sorted by `(exchange_ts, local_ts)` per §5's ordering guarantee.
#[derive(Debug, Clone)]
pub struct MarketTick {
    pub symbol: String,
    pub exchange_ts: i64,
    pub local_ts: i64,
    pub last: Decimal,
    pub mark: Decimal,
    pub bid1: Decimal,
    pub ask1: Decimal,
    pub funding_rate: Decimal,
}

/// Per-symbol setup handed to [`BacktestRunner::new`].
#[derive(Debug, Clone)]
pub struct SymbolConfig {
    pub symbol: String,
    pub grid_config: GridConfig,
    pub commission_rate: Decimal,
    pub anchor_hint: Option<AnchorRecord>,
}

/// One symbol's full simulated stack: engine, broker, and paired position
/// trackers. Rebuilt from scratch at the start of every `run` call.
struct SymbolRunner {
    engine: StrategyEngine,
    broker: SimulatedBroker,
    long: PositionTracker,
    short: PositionTracker,
    funding: FundingScheduler,
    last_mark: Option<Decimal>,
}

impl SymbolRunner {
    fn new(cfg: &SymbolConfig) -> Self {
        Self {
            engine: StrategyEngine::new(cfg.symbol.clone(), cfg.grid_config, cfg.anchor_hint),
            broker: SimulatedBroker::new(cfg.symbol.clone(), cfg.commission_rate),
            long: PositionTracker::new(Direction::Long),
            short: PositionTracker::new(Direction::Short),
            funding: FundingScheduler::new(),
            last_mark: None,
        }
    }

    fn tracker_mut(&mut self, direction: Direction) -> &mut PositionTracker {
        match direction {
            Direction::Long => &mut self.long,
            Direction::Short => &mut self.short,
        }
    }

    fn tracker(&self, direction: Direction) -> &PositionTracker {
        match direction {
            Direction::Long => &self.long,
            Direction::Short => &self.short,
        }
    }

    fn unrealized_pnl(&self, mark: Decimal) -> Decimal {
        self.long.unrealized_pnl(mark) + self.short.unrealized_pnl(mark)
    }
}

/// Orchestrates a multi-symbol backtest run: feeds a sorted tick stream
/// through each symbol's engine/broker pair under the three-phase ordering
/// §4.5 requires (fills, then aggregate equity, then intents), and
/// accumulates [`SessionMetrics`] along the way.
pub struct BacktestRunner {
    configs: Vec<SymbolConfig>,
    runners: HashMap<String, SymbolRunner>,
    quantity_calc: Box<dyn QuantityCalculator>,
    starting_balance: Decimal,
    wind_down: WindDownMode,
    metrics: SessionMetrics,
}

impl BacktestRunner {
    pub fn new(
        configs: Vec<SymbolConfig>,
        quantity_calc: Box<dyn QuantityCalculator>,
        starting_balance: Decimal,
        wind_down: WindDownMode,
    ) -> Self {
        let runners = configs.iter().map(|c| (c.symbol.clone(), SymbolRunner::new(c))).collect();
        Self {
            configs,
            runners,
            quantity_calc,
            starting_balance,
            wind_down,
            metrics: SessionMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    /// Replay `ticks` (already sorted ascending by `(exchange_ts, local_ts)`)
    /// through every configured symbol. Resets all runner and metrics state
    /// on entry, so repeated calls on the same `BacktestRunner` never leak
    /// state from a prior run.
    pub fn run(&mut self, ticks: &[MarketTick]) -> Result<(), BacktestError> {
        if ticks.is_empty() {
            return Err(BacktestError::EmptyTickStream);
        }
        for (i, w) in ticks.windows(2).enumerate() {
            let a = (w[0].exchange_ts, w[0].local_ts);
            let b = (w[1].exchange_ts, w[1].local_ts);
            if b < a {
                return Err(BacktestError::OutOfOrderTicks { at_index: i + 1 });
            }
        }

        self.reset();
        for tick in ticks {
            self.process_tick(tick);
        }
        self.apply_wind_down(ticks.last().expect("checked nonempty above"));

        Ok(())
    }

    fn reset(&mut self) {
        self.runners = self.configs.iter().map(|c| (c.symbol.clone(), SymbolRunner::new(c))).collect();
        self.metrics = SessionMetrics::new();
    }

    fn process_tick(&mut self, tick: &MarketTick) {
        if !self.runners.contains_key(&tick.symbol) {
            warn!(symbol = %tick.symbol, "tick for unconfigured symbol, ignoring");
            return;
        }

        // Phase A: resolve fills and feed each one back through the engine
        // and this symbol's position trackers.
        let fills = {
            let runner = self.runners.get_mut(&tick.symbol).unwrap();
            runner.broker.resolve_fills(tick.last, tick.exchange_ts, tick.local_ts)
        };

        for fill in &fills {
            let runner = self.runners.get_mut(&tick.symbol).unwrap();
            let direction = runner
                .broker
                .direction_of(&fill.order_id)
                .expect("fill was just resolved from an active order the broker knows the direction of");
            let increasing = !is_closing_fill(fill.side, direction);

            let tracker = runner.tracker_mut(direction);
            let realized_before = tracker.realized_pnl();
            tracker.apply_fill(fill.qty, fill.price, fill.fee, increasing);
            let realized_delta = tracker.realized_pnl() - realized_before;

            self.metrics.record_fill(fill.qty, fill.price, fill.fee);
            self.metrics.record_realized_delta(realized_delta);
            if !increasing {
                self.metrics.record_closing_trade(direction, realized_delta);
            }

            let open_orders = runner.broker.open_orders_snapshot();
            if let Err(e) = runner.engine.on_event(&Event::Execution(fill.clone()), &open_orders) {
                warn!(symbol = %tick.symbol, error = %e, "engine rejected execution event");
            }
        }

        // Funding settlement, independent of the A/B/C ordering (at most
        // once per 8-hour boundary crossed).
        let should_settle = {
            let runner = self.runners.get_mut(&tick.symbol).unwrap();
            runner.funding.should_settle(tick.exchange_ts)
        };
        if should_settle {
            let runner = self.runners.get(&tick.symbol).unwrap();
            for direction in [Direction::Long, Direction::Short] {
                let size = runner.tracker(direction).size();
                if size.is_zero() {
                    continue;
                }
                let amount = funding_pnl(direction, size, tick.mark, tick.funding_rate);
                self.metrics.record_funding(amount);
                info!(symbol = %tick.symbol, direction = %direction, amount = %amount, "funding settled");
            }
        }

        // Phase B: aggregate equity across every runner at its own last
        // observed mark, this symbol's mark now updated.
        {
            let runner = self.runners.get_mut(&tick.symbol).unwrap();
            runner.last_mark = Some(tick.mark);
        }
        let equity = self.total_equity();
        self.metrics.record_tick(tick.exchange_ts, equity);

        // Phase C: feed the tick to the engine as a Ticker and execute any
        // resulting intents through the simulated broker.
        let wallet_balance = equity;
        let runner = self.runners.get_mut(&tick.symbol).unwrap();
        let open_orders = runner.broker.open_orders_snapshot();
        let ticker = Ticker {
            header: EventHeader::new(tick.exchange_ts, tick.local_ts),
            symbol: tick.symbol.clone(),
            last: tick.last,
            mark: tick.mark,
            bid1: tick.bid1,
            ask1: tick.ask1,
            funding_rate: tick.funding_rate,
        };
        match runner.engine.on_event(&Event::Ticker(ticker), &open_orders) {
            Ok(intents) => runner.broker.apply_intents(&intents, self.quantity_calc.as_ref(), wallet_balance),
            Err(e) => warn!(symbol = %tick.symbol, error = %e, "engine rejected ticker event"),
        }
        if let Some(anchor) = runner.engine.take_pending_anchor_write() {
            info!(symbol = %tick.symbol, anchor_price = %anchor.anchor_price, "anchor recorded (caller persists)");
        }
    }

    fn total_realized_pnl(&self) -> Decimal {
        self.runners.values().map(|r| r.long.realized_pnl() + r.short.realized_pnl()).sum()
    }

    fn total_unrealized_pnl(&self) -> Decimal {
        self.runners
            .values()
            .map(|r| r.unrealized_pnl(r.last_mark.unwrap_or(Decimal::ZERO)))
            .sum()
    }

    fn total_equity(&self) -> Decimal {
        self.starting_balance + self.total_realized_pnl() + self.total_unrealized_pnl() + self.metrics.total_funding()
    }

    /// At the end of the range: in `LeaveOpen` mode nothing further happens
    /// (the last recorded equity already reflects final unrealized PnL). In
    /// `CloseAll` mode, cancel every resting order and force a synthetic
    /// closing fill at the last tick's price for every open position, then
    /// record one final equity sample with unrealized PnL at zero.
    fn apply_wind_down(&mut self, last_tick: &MarketTick) {
        if self.wind_down == WindDownMode::LeaveOpen {
            return;
        }

        for runner in self.runners.values_mut() {
            let cancelled = runner.broker.cancel_all();
            if cancelled > 0 {
                info!(cancelled, "wind-down cancelled resting orders");
            }

            let mark = runner.last_mark.unwrap_or(last_tick.mark);
            for direction in [Direction::Long, Direction::Short] {
                let tracker = runner.tracker_mut(direction);
                if tracker.is_empty() {
                    continue;
                }
                let realized_before = tracker.realized_pnl();
                let commission_rate = runner.broker.commission_rate();
                tracker.close_all(mark, commission_rate);
                let delta = tracker.realized_pnl() - realized_before;
                self.metrics.record_realized_delta(delta);
                self.metrics.record_closing_trade(direction, delta);
            }
        }

        info!("wind-down close-all applied");
        let equity = self.total_equity();
        self.metrics.record_tick(last_tick.exchange_ts, equity);
    }
}

//! Simulated broker: a minimal order book that turns engine intents into
//! resting orders and, each tick, resolves fills under a strict-cross
//! model — price must strictly cross the limit, not merely touch it.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::core::{Direction, Side};
use crate::engine::OpenOrders;
use crate::event::{EventHeader, Execution};
use crate::intent::{Intent, PlaceLimit};
use crate::quantity::QuantityCalculator;

use super::position::is_closing_fill;

#[derive(Debug, Clone)]
struct SimOrder {
    order_id: String,
    client_order_id: String,
    price: Decimal,
    qty: Decimal,
    side: Side,
    direction: Direction,
}

impl SimOrder {
    fn as_order(&self) -> crate::core::Order {
        crate::core::Order {
            order_id: self.order_id.clone(),
            client_order_id: self.client_order_id.clone(),
            price: self.price,
            side: self.side,
            qty: self.qty,
        }
    }
}

/// Simulated order book and matching engine for one symbol.
pub struct SimulatedBroker {
    symbol: String,
    commission_rate: Decimal,
    next_order_id: u64,
    active: HashMap<String, SimOrder>,
    client_id_to_order_id: HashMap<String, String>,
    filled: HashMap<String, SimOrder>,
}

impl SimulatedBroker {
    pub fn new(symbol: impl Into<String>, commission_rate: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            commission_rate,
            next_order_id: 0,
            active: HashMap::new(),
            client_id_to_order_id: HashMap::new(),
            filled: HashMap::new(),
        }
    }

    pub fn active_order_count(&self) -> usize {
        self.active.len()
    }

    pub fn commission_rate(&self) -> Decimal {
        self.commission_rate
    }

    /// Direction of a fill already resolved by `resolve_fills`, looked up by
    /// the `order_id` carried on its `Execution`. Backtest callers need this
    /// since `Execution` itself is direction-agnostic (`closed_size` only
    /// says open vs. close, not which side's exposure it affects).
    pub fn direction_of(&self, order_id: &str) -> Option<Direction> {
        self.filled.get(order_id).map(|order| order.direction)
    }

    /// Snapshot of currently-resting orders, split by direction, for the
    /// engine's next `on_event` call.
    pub fn open_orders_snapshot(&self) -> OpenOrders {
        let mut open = OpenOrders::default();
        for order in self.active.values() {
            match order.direction {
                Direction::Long => open.long.push(order.as_order()),
                Direction::Short => open.short.push(order.as_order()),
            }
        }
        open
    }

    /// Execute a batch of intents from the engine against this broker.
    pub fn apply_intents(&mut self, intents: &[Intent], qty_calc: &dyn QuantityCalculator, wallet_balance: Decimal) {
        for intent in intents {
            match intent {
                Intent::PlaceLimit(place) => self.place(place, qty_calc, wallet_balance),
                Intent::Cancel(cancel) => self.cancel(&cancel.order_id),
            }
        }
    }

    fn place(&mut self, place: &PlaceLimit, qty_calc: &dyn QuantityCalculator, wallet_balance: Decimal) {
        // Idempotent: a Place with a client id already resting is a no-op,
        // matching the live executor's deduplication contract.
        if self.client_id_to_order_id.contains_key(&place.client_order_id) {
            return;
        }
        let qty = qty_calc.qty_for(&place.symbol, place.price, place.direction, wallet_balance);
        if qty <= Decimal::ZERO {
            return;
        }

        self.next_order_id += 1;
        let order_id = format!("sim-{}", self.next_order_id);
        let order = SimOrder {
            order_id: order_id.clone(),
            client_order_id: place.client_order_id.clone(),
            price: place.price,
            qty,
            side: place.side,
            direction: place.direction,
        };
        self.client_id_to_order_id.insert(place.client_order_id.clone(), order_id.clone());
        self.active.insert(order_id, order);
    }

    /// Drop the active order and release its client id, so a future Place
    /// at the same price (after a grid rebalance) can reuse it.
    fn cancel(&mut self, order_id: &str) {
        if let Some(order) = self.active.remove(order_id) {
            self.client_id_to_order_id.remove(&order.client_order_id);
        }
    }

    /// Cancel every resting order, used by wind-down close-all mode before
    /// the synthetic closing fills. Returns the number cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let order_ids: Vec<String> = self.active.keys().cloned().collect();
        let count = order_ids.len();
        for order_id in order_ids {
            self.cancel(&order_id);
        }
        count
    }

    /// Phase A: test every active order for a strict price cross and
    /// synthesize an Execution for each one that fills. Filled orders leave
    /// `active` and move into `filled` for later direction lookups.
    pub fn resolve_fills(&mut self, price: Decimal, exchange_ts: i64, local_ts: i64) -> Vec<Execution> {
        let crossed: Vec<String> = self
            .active
            .iter()
            .filter(|(_, order)| strictly_crossed(order.side, order.price, price))
            .map(|(id, _)| id.clone())
            .collect();

        let mut fills = Vec::with_capacity(crossed.len());
        for order_id in crossed {
            let order = self.active.remove(&order_id).unwrap();
            self.client_id_to_order_id.remove(&order.client_order_id);

            let fee = order.qty.abs() * order.price * self.commission_rate;
            let closed_size = if is_closing_fill(order.side, order.direction) {
                order.qty
            } else {
                Decimal::ZERO
            };

            fills.push(Execution {
                header: EventHeader::new(exchange_ts, local_ts),
                symbol: self.symbol.clone(),
                exec_id: format!("exec-{}", order.order_id),
                order_id: order.order_id.clone(),
                client_order_id: order.client_order_id.clone(),
                side: order.side,
                price: order.price,
                qty: order.qty,
                fee,
                closed_size,
                leaves_qty: Decimal::ZERO,
                realized_pnl: Decimal::ZERO,
            });

            self.filled.insert(order.order_id.clone(), order);
        }
        fills
    }
}

fn strictly_crossed(side: Side, limit: Decimal, price: Decimal) -> bool {
    match side {
        Side::Buy => price < limit,
        Side::Sell => price > limit,
    }
}

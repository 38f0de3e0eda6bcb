//! Immutable market/account events the engine consumes.
//!
//! Modeled as a tagged sum type (one variant per Ticker/PublicTrade/
//! Execution/OrderUpdate) rather than duck-typed records, so the engine
//! dispatches on the tag instead of probing for attributes. Each variant
//! embeds the header fields (`symbol`, `exchange_ts`, `local_ts`) directly
//! rather than through inheritance — there is no event base class.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{OrderStatus, Side};

/// Fields common to every event variant. Embedded by value in each variant
/// rather than shared through a base class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventHeader {
    /// Exchange-reported timestamp, milliseconds since epoch. Authoritative;
    /// the primary sort key when merging streams.
    pub exchange_ts: i64,
    /// Local receipt timestamp, milliseconds since epoch. Tiebreaker only.
    pub local_ts: i64,
}

impl EventHeader {
    pub fn new(exchange_ts: i64, local_ts: i64) -> Self {
        Self {
            exchange_ts,
            local_ts,
        }
    }

    /// Ordering key callers must sort merged streams by before calling
    /// `on_event`: `(exchange_ts, local_ts)` ascending.
    fn sort_key(&self) -> (i64, i64) {
        (self.exchange_ts, self.local_ts)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub header: EventHeader,
    pub symbol: String,
    pub last: Decimal,
    pub mark: Decimal,
    pub bid1: Decimal,
    pub ask1: Decimal,
    pub funding_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicTrade {
    pub header: EventHeader,
    pub symbol: String,
    pub trade_id: String,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
}

/// A fill report. `closed_size` is the indicator of whether this fill closed
/// existing exposure (nonzero) or opened new exposure (zero) — `closed_pnl`
/// is deliberately not used for this purpose since it can be zero on a
/// break-even close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub header: EventHeader,
    pub symbol: String,
    pub exec_id: String,
    pub order_id: String,
    pub client_order_id: String,
    pub side: Side,
    pub price: Decimal,
    pub qty: Decimal,
    pub fee: Decimal,
    pub closed_size: Decimal,
    pub leaves_qty: Decimal,
    pub realized_pnl: Decimal,
}

impl Execution {
    /// Fully filled: nothing left resting on the book for this order.
    pub fn is_fully_filled(&self) -> bool {
        self.leaves_qty.is_zero()
    }

    /// This fill closed existing exposure rather than opening new exposure.
    pub fn is_closing(&self) -> bool {
        !self.closed_size.is_zero()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub header: EventHeader,
    pub symbol: String,
    pub order_id: String,
    pub client_order_id: String,
    pub status: OrderStatus,
}

/// A normalized market or account event. The engine dispatches on this tag;
/// there is no further polymorphism.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    Ticker(Ticker),
    PublicTrade(PublicTrade),
    Execution(Execution),
    OrderUpdate(OrderUpdate),
}

impl Event {
    pub fn header(&self) -> &EventHeader {
        match self {
            Event::Ticker(e) => &e.header,
            Event::PublicTrade(e) => &e.header,
            Event::Execution(e) => &e.header,
            Event::OrderUpdate(e) => &e.header,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Event::Ticker(e) => &e.symbol,
            Event::PublicTrade(e) => &e.symbol,
            Event::Execution(e) => &e.symbol,
            Event::OrderUpdate(e) => &e.symbol,
        }
    }
}

/// Sort a batch of merged events ascending by `(exchange_ts, local_ts)`, the
/// ordering §5 requires before handing a merged stream to `on_event`.
pub fn sort_events(events: &mut [Event]) {
    events.sort_by_key(|e| e.header().sort_key());
}

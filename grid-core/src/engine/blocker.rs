//! Same-order blocker: detects two distinct orders filling at the same
//! price on the same side, which would silently accumulate position instead
//! of resting at distinct grid levels.

use std::collections::VecDeque;

use rust_decimal::Decimal;

use crate::core::{Direction, Side};

/// Which direction's exposure a fully-filled execution affects, inferred
/// from side and whether the fill closed existing exposure:
///
/// | side | opening/closing | direction |
/// |---|---|---|
/// | Buy  | opening | long  |
/// | Sell | closing | long  |
/// | Sell | opening | short |
/// | Buy  | closing | short |
pub fn infer_direction(side: Side, is_closing: bool) -> Direction {
    match (side, is_closing) {
        (Side::Buy, false) => Direction::Long,
        (Side::Sell, true) => Direction::Long,
        (Side::Sell, false) => Direction::Short,
        (Side::Buy, true) => Direction::Short,
    }
}

/// Result of feeding one fill into the blocker, for the caller to decide
/// whether to raise a fresh alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockerTransition {
    /// The blocker just became set (it was clear before this fill).
    NewlySet,
    /// The blocker just cleared (a clean fill pushed the duplicate out).
    Cleared,
    /// No change in blocked state.
    Unchanged,
}

/// Two capacity-2 ring buffers of `(order_id, price)`, one per direction.
/// Re-evaluated in full on every fully-filled execution, so the blocked
/// state always reflects the two most recent fills per direction rather
/// than an independently-tracked sticky flag.
#[derive(Debug, Clone, Default)]
pub struct SameOrderBlocker {
    long: VecDeque<(String, Decimal)>,
    short: VecDeque<(String, Decimal)>,
    set: bool,
}

impl SameOrderBlocker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.set
    }

    /// Append `(order_id, price)` to `direction`'s buffer, then re-evaluate
    /// *both* buffers for a same-price/different-id duplicate.
    pub fn record_fill(&mut self, direction: Direction, order_id: &str, price: Decimal) -> BlockerTransition {
        let buffer = match direction {
            Direction::Long => &mut self.long,
            Direction::Short => &mut self.short,
        };
        buffer.push_back((order_id.to_string(), price));
        if buffer.len() > 2 {
            buffer.pop_front();
        }

        let was_set = self.set;
        self.set = Self::has_duplicate(&self.long) || Self::has_duplicate(&self.short);

        match (was_set, self.set) {
            (false, true) => BlockerTransition::NewlySet,
            (true, false) => BlockerTransition::Cleared,
            _ => BlockerTransition::Unchanged,
        }
    }

    fn has_duplicate(buffer: &VecDeque<(String, Decimal)>) -> bool {
        if buffer.len() < 2 {
            return false;
        }
        let (id_a, price_a) = &buffer[0];
        let (id_b, price_b) = &buffer[1];
        id_a != id_b && price_a == price_b
    }
}

//! Quantity calculator: turns a declarative sizing spec into an order
//! quantity. The engine never computes this itself (it places a positive
//! placeholder qty on every `PlaceLimit`); the executor (or the backtest
//! simulator) substitutes the real value via a calculator built here.

use std::fmt;

use rust_decimal::Decimal;

use crate::core::{Direction, InstrumentInfo};

/// A parsed sizing formula, one of the three canonical string formats from
/// §4.5: fixed USD notional (`"100"`), a fraction of wallet balance
/// (`"x0.001"`), or a fixed base-asset quantity (`"b0.001"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityFormula {
    FixedUsd(Decimal),
    WalletFraction(Decimal),
    FixedBase(Decimal),
}

/// The sizing string did not match any of the three recognized formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantitySpecError {
    pub raw: String,
}

impl fmt::Display for QuantitySpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid quantity spec {:?}: expected a plain number, \"x<fraction>\", or \"b<base_qty>\"",
            self.raw
        )
    }
}

impl std::error::Error for QuantitySpecError {}

impl QuantityFormula {
    /// Parse one of `"100"`, `"x0.001"`, `"b0.001"`.
    pub fn parse(spec: &str) -> Result<Self, QuantitySpecError> {
        let trimmed = spec.trim();
        let err = || QuantitySpecError { raw: spec.to_string() };

        if let Some(rest) = trimmed.strip_prefix('x') {
            let fraction: Decimal = rest.parse().map_err(|_| err())?;
            return Ok(QuantityFormula::WalletFraction(fraction));
        }
        if let Some(rest) = trimmed.strip_prefix('b') {
            let base_qty: Decimal = rest.parse().map_err(|_| err())?;
            return Ok(QuantityFormula::FixedBase(base_qty));
        }
        let usd: Decimal = trimmed.parse().map_err(|_| err())?;
        Ok(QuantityFormula::FixedUsd(usd))
    }

    /// Resolve to a concrete quantity given current price and wallet
    /// balance, rounded up to `instrument.qty_step`. `direction` does not
    /// affect magnitude today but is accepted so a future asymmetric
    /// long/short sizing rule has a seam to hook into without an API break.
    pub fn qty_for(
        &self,
        price: Decimal,
        _direction: Direction,
        wallet_balance: Decimal,
        instrument: &InstrumentInfo,
    ) -> Decimal {
        if price.is_zero() {
            return Decimal::ZERO;
        }
        let raw = match self {
            QuantityFormula::FixedUsd(usd) => *usd / price,
            QuantityFormula::WalletFraction(fraction) => (wallet_balance * *fraction) / price,
            QuantityFormula::FixedBase(base_qty) => *base_qty,
        };
        instrument.round_qty_up(raw)
    }
}

/// Executor-supplied sizing function, matching §6's
/// `qty_for(symbol, price, direction, wallet_balance) -> qty`.
pub trait QuantityCalculator {
    fn qty_for(&self, symbol: &str, price: Decimal, direction: Direction, wallet_balance: Decimal) -> Decimal;
}

/// A [`QuantityCalculator`] backed by a single formula applied uniformly
/// across symbols, the common case for a single-instrument strategy run.
pub struct UniformQuantityCalculator {
    formula: QuantityFormula,
    instrument: InstrumentInfo,
}

impl UniformQuantityCalculator {
    pub fn new(formula: QuantityFormula, instrument: InstrumentInfo) -> Self {
        Self { formula, instrument }
    }
}

impl QuantityCalculator for UniformQuantityCalculator {
    fn qty_for(&self, _symbol: &str, price: Decimal, direction: Direction, wallet_balance: Decimal) -> Decimal {
        self.formula.qty_for(price, direction, wallet_balance, &self.instrument)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn instrument() -> InstrumentInfo {
        InstrumentInfo {
            tick_size: dec!(0.1),
            qty_step: dec!(0.001),
        }
    }

    #[test]
    fn parses_fixed_usd() {
        assert_eq!(QuantityFormula::parse("100").unwrap(), QuantityFormula::FixedUsd(dec!(100)));
    }

    #[test]
    fn parses_wallet_fraction() {
        assert_eq!(
            QuantityFormula::parse("x0.001").unwrap(),
            QuantityFormula::WalletFraction(dec!(0.001))
        );
    }

    #[test]
    fn parses_fixed_base() {
        assert_eq!(
            QuantityFormula::parse("b0.001").unwrap(),
            QuantityFormula::FixedBase(dec!(0.001))
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(QuantityFormula::parse("not-a-number").is_err());
    }

    #[test]
    fn fixed_usd_rounds_up_to_qty_step() {
        let formula = QuantityFormula::parse("100").unwrap();
        let qty = formula.qty_for(dec!(99000), Direction::Long, dec!(10_000), &instrument());
        // 100 / 99000 = 0.00101010..., rounded up to 0.001 step -> 0.002
        assert_eq!(qty, dec!(0.002));
    }

    #[test]
    fn wallet_fraction_scales_with_balance() {
        let formula = QuantityFormula::parse("x0.1").unwrap();
        let qty = formula.qty_for(dec!(100), Direction::Long, dec!(10_000), &instrument());
        // 0.1 * 10000 / 100 = 10.0 exactly, already on-step
        assert_eq!(qty, dec!(10));
    }

    #[test]
    fn fixed_base_ignores_price_and_wallet() {
        let formula = QuantityFormula::parse("b0.5").unwrap();
        let qty = formula.qty_for(dec!(12345), Direction::Short, dec!(1), &instrument());
        assert_eq!(qty, dec!(0.5));
    }
}

//! Decimal arithmetic utilities for notional/equity calculations.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Safe division that returns zero if the divisor is zero.
pub fn safe_div(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator == Decimal::ZERO {
        Decimal::ZERO
    } else {
        numerator / denominator
    }
}

/// Ratio of two decimal quantities as `f64`, zero when the denominator is zero.
///
/// Violation ratios feed the severity curve, which is exponential math and
/// therefore lives in `f64` space.
pub fn ratio_f64(numerator: Decimal, denominator: Decimal) -> f64 {
    safe_div(numerator, denominator).to_f64().unwrap_or(0.0)
}

/// Fraction lost relative to a cost basis: `(basis - value) / basis`, clamped at 0.
pub fn loss_fraction(value: Decimal, basis: Decimal) -> f64 {
    if basis <= Decimal::ZERO {
        return 0.0;
    }
    let frac = safe_div(basis - value, basis).to_f64().unwrap_or(0.0);
    frac.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_safe_div_zero_denominator() {
        assert_eq!(safe_div(dec!(10), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(safe_div(dec!(10), dec!(4)), dec!(2.5));
    }

    #[test]
    fn test_ratio_f64() {
        assert!((ratio_f64(dec!(3), dec!(2)) - 1.5).abs() < 1e-9);
        assert_eq!(ratio_f64(dec!(3), Decimal::ZERO), 0.0);
    }

    #[test]
    fn test_loss_fraction() {
        assert!((loss_fraction(dec!(80), dec!(100)) - 0.2).abs() < 1e-9);
        assert_eq!(loss_fraction(dec!(120), dec!(100)), 0.0);
        assert_eq!(loss_fraction(dec!(80), Decimal::ZERO), 0.0);
    }
}

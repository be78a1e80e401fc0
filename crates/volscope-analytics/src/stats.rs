//! Decimal statistics helpers shared by the metrics engine.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, MathematicalOps};

/// `ln(curr / prev)`, `None` when either price is not positive.
pub fn log_return(prev: Decimal, curr: Decimal) -> Option<Decimal> {
    if prev <= Decimal::ZERO || curr <= Decimal::ZERO {
        return None;
    }
    let ratio = curr / prev;
    if ratio == Decimal::ONE {
        return Some(Decimal::ZERO);
    }
    ratio.checked_ln()
}

/// Simple percentage change, `None` when the previous price is not positive.
pub fn pct_change(prev: Decimal, curr: Decimal) -> Option<Decimal> {
    if prev <= Decimal::ZERO {
        return None;
    }
    Some((curr - prev) / prev)
}

pub fn mean(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let sum: Decimal = values.iter().sum();
    Some(sum / Decimal::from(values.len()))
}

/// Sample standard deviation (N-1 denominator); needs at least two values.
pub fn sample_std_dev(values: &[Decimal]) -> Option<Decimal> {
    if values.len() < 2 {
        return None;
    }
    let avg = mean(values)?;
    let squares: Decimal = values
        .iter()
        .map(|v| {
            let diff = *v - avg;
            diff * diff
        })
        .sum();
    let variance = squares / Decimal::from(values.len() - 1);
    if variance.is_zero() {
        return Some(Decimal::ZERO);
    }
    variance.sqrt()
}

/// Percentile of an ascending slice using linear interpolation between
/// order statistics: `rank = pct/100 * (n-1)`,
/// `a[floor] + (a[ceil] - a[floor]) * frac(rank)`.
///
/// Needs at least two values; `pct` is clamped to 0..=100.
pub fn percentile_linear(sorted: &[Decimal], pct: Decimal) -> Option<Decimal> {
    if sorted.len() < 2 {
        return None;
    }
    let pct = pct.max(Decimal::ZERO).min(Decimal::ONE_HUNDRED);
    let rank = pct / Decimal::ONE_HUNDRED * Decimal::from(sorted.len() - 1);
    let lower = rank.floor();
    let frac = rank - lower;
    let lo = lower.to_usize()?;
    let hi = (lo + 1).min(sorted.len() - 1);
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

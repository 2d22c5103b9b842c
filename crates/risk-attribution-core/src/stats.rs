//! Decimal statistics used by the metric and attribution engines.
//!
//! Every helper returns `None` instead of panicking when a result cannot be
//! represented (empty input, zero divisor, overflow), so callers decide how an
//! absent value is reported.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;

pub fn checked_sum<'a, I>(values: I) -> Option<Decimal>
where
    I: IntoIterator<Item = &'a Decimal>,
{
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(*v))
}

pub fn mean(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    checked_sum(values)?.checked_div(Decimal::from(values.len()))
}

/// Sample variance (n - 1 denominator).
pub fn sample_variance(values: &[Decimal]) -> Option<Decimal> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let sum_sq = values.iter().try_fold(Decimal::ZERO, |acc, v| {
        let d = v.checked_sub(m)?;
        acc.checked_add(d.checked_mul(d)?)
    })?;
    sum_sq.checked_div(Decimal::from(values.len() - 1))
}

/// Sample covariance (n - 1 denominator) of two equally long samples.
pub fn sample_covariance(xs: &[Decimal], ys: &[Decimal]) -> Option<Decimal> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mx = mean(xs)?;
    let my = mean(ys)?;
    let sum = xs
        .iter()
        .zip(ys)
        .try_fold(Decimal::ZERO, |acc, (x, y)| {
            let dx = x.checked_sub(mx)?;
            let dy = y.checked_sub(my)?;
            acc.checked_add(dx.checked_mul(dy)?)
        })?;
    sum.checked_div(Decimal::from(xs.len() - 1))
}

pub fn sample_std_dev(values: &[Decimal]) -> Option<Decimal> {
    sqrt(sample_variance(values)?)
}

pub fn sqrt(value: Decimal) -> Option<Decimal> {
    if value.is_zero() {
        return Some(Decimal::ZERO);
    }
    if value.is_sign_negative() {
        return None;
    }
    value.sqrt()
}

/// Percentile of an ascending sample with linear interpolation between the
/// closest ranks. `pct` is in percent (5 = 5th percentile).
pub fn percentile(sorted: &[Decimal], pct: Decimal) -> Option<Decimal> {
    let last = sorted.len().checked_sub(1)?;
    let rank = pct
        .checked_mul(Decimal::from(last))?
        .checked_div(dec!(100))?;
    let lower = rank.floor();
    let lo = lower.to_usize()?.min(last);
    let hi = rank.ceil().to_usize()?.min(last);
    let fraction = rank.checked_sub(lower)?;
    let (a, b) = (sorted[lo], sorted[hi]);
    a.checked_add(b.checked_sub(a)?.checked_mul(fraction)?)
}

/// Largest fall of the compounded curve from a running peak, as a
/// non-positive fraction. The starting level of 1.0 counts as a peak.
pub fn max_drawdown(returns: &[Decimal]) -> Option<Decimal> {
    let mut level = Decimal::ONE;
    let mut peak = Decimal::ONE;
    let mut worst = Decimal::ZERO;

    for r in returns {
        level = level.checked_mul(Decimal::ONE.checked_add(*r)?)?;
        if level > peak {
            peak = level;
        }
        let drawdown = level.checked_sub(peak)?.checked_div(peak)?;
        if drawdown < worst {
            worst = drawdown;
        }
    }
    Some(worst)
}

/// Compounded return over consecutive periods: prod(1 + r) - 1.
pub fn compound(returns: &[Decimal]) -> Option<Decimal> {
    returns
        .iter()
        .try_fold(Decimal::ONE, |acc, r| {
            acc.checked_mul(Decimal::ONE.checked_add(*r)?)
        })?
        .checked_sub(Decimal::ONE)
}

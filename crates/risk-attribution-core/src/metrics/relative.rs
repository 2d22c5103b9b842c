//! Relative-risk metrics over portfolio/benchmark returns on common dates.

use rust_decimal::Decimal;

use super::Absence;
use crate::stats;
use crate::types::Rate;

fn split(pairs: &[(Rate, Rate)]) -> (Vec<Rate>, Vec<Rate>) {
    pairs.iter().copied().unzip()
}

fn active_returns(pairs: &[(Rate, Rate)]) -> Result<Vec<Rate>, Absence> {
    pairs
        .iter()
        .map(|(p, b)| p.checked_sub(*b).ok_or(Absence::Overflow))
        .collect()
}

fn benchmark_variance(benchmark: &[Rate]) -> Result<Decimal, Absence> {
    let variance = stats::sample_variance(benchmark).ok_or(Absence::Overflow)?;
    if variance.is_zero() {
        return Err(Absence::Degenerate("zero benchmark variance"));
    }
    Ok(variance)
}

/// cov(portfolio, benchmark) / var(benchmark), both sample estimates.
pub(crate) fn beta(pairs: &[(Rate, Rate)]) -> Result<Decimal, Absence> {
    let (portfolio, benchmark) = split(pairs);
    let variance = benchmark_variance(&benchmark)?;
    let covariance = stats::sample_covariance(&portfolio, &benchmark).ok_or(Absence::Overflow)?;
    covariance.checked_div(variance).ok_or(Absence::Overflow)
}

pub(crate) fn tracking_error(pairs: &[(Rate, Rate)], sqrt_annualization: Decimal) -> Result<Decimal, Absence> {
    let active = active_returns(pairs)?;
    stats::sample_std_dev(&active)
        .and_then(|s| s.checked_mul(sqrt_annualization))
        .ok_or(Absence::Overflow)
}

/// Annualised arithmetic mean of active returns.
pub(crate) fn active_return(pairs: &[(Rate, Rate)], annualization: Decimal) -> Result<Decimal, Absence> {
    let active = active_returns(pairs)?;
    stats::mean(&active)
        .and_then(|m| m.checked_mul(annualization))
        .ok_or(Absence::Overflow)
}

/// Active return / tracking error. Absent when the benchmark never moves or
/// tracking error is zero.
pub(crate) fn information_ratio(
    pairs: &[(Rate, Rate)],
    annualization: Decimal,
    sqrt_annualization: Decimal,
) -> Result<Decimal, Absence> {
    let (_, benchmark) = split(pairs);
    benchmark_variance(&benchmark)?;
    let te = tracking_error(pairs, sqrt_annualization)?;
    if te.is_zero() {
        return Err(Absence::Degenerate("zero tracking error"));
    }
    active_return(pairs, annualization)?
        .checked_div(te)
        .ok_or(Absence::Overflow)
}

//! Market-risk metrics computed from the portfolio return sample alone.

use rust_decimal::Decimal;

use super::kind::Confidence;
use super::Absence;
use crate::stats;
use crate::types::Rate;

/// Sample standard deviation of daily returns scaled by sqrt(annualisation).
pub(crate) fn annualized_volatility(sample: &[Rate], sqrt_annualization: Decimal) -> Result<Decimal, Absence> {
    let std_dev = stats::sample_std_dev(sample).ok_or(Absence::Overflow)?;
    std_dev.checked_mul(sqrt_annualization).ok_or(Absence::Overflow)
}

fn sorted(sample: &[Rate]) -> Vec<Rate> {
    let mut sorted = sample.to_vec();
    sorted.sort();
    sorted
}

/// Historical-simulation VaR: the tail percentile of the sample, reported as
/// a non-positive loss.
pub(crate) fn value_at_risk(sample: &[Rate], confidence: Confidence) -> Result<Decimal, Absence> {
    let threshold = stats::percentile(&sorted(sample), confidence.tail_percentile()).ok_or(Absence::Overflow)?;
    Ok(threshold.min(Decimal::ZERO))
}

/// Mean of the returns at or below the VaR percentile, as a non-positive
/// loss. Never smaller in magnitude than the matching VaR.
pub(crate) fn expected_shortfall(sample: &[Rate], confidence: Confidence) -> Result<Decimal, Absence> {
    let sorted = sorted(sample);
    let threshold = stats::percentile(&sorted, confidence.tail_percentile()).ok_or(Absence::Overflow)?;
    let tail: Vec<Rate> = sorted.into_iter().take_while(|r| *r <= threshold).collect();
    let tail_mean = stats::mean(&tail).ok_or(Absence::Overflow)?;
    Ok(tail_mean.min(Decimal::ZERO))
}

pub(crate) fn max_drawdown(sample: &[Rate]) -> Result<Decimal, Absence> {
    stats::max_drawdown(sample).ok_or(Absence::Overflow)
}

/// (mean daily excess return / daily std dev) * sqrt(annualisation).
pub(crate) fn sharpe_ratio(
    sample: &[Rate],
    daily_risk_free: Rate,
    sqrt_annualization: Decimal,
) -> Result<Decimal, Absence> {
    let std_dev = stats::sample_std_dev(sample).ok_or(Absence::Overflow)?;
    if std_dev.is_zero() {
        return Err(Absence::Degenerate("zero return volatility"));
    }
    let excess = stats::mean(sample)
        .and_then(|m| m.checked_sub(daily_risk_free))
        .ok_or(Absence::Overflow)?;
    excess
        .checked_div(std_dev)
        .and_then(|r| r.checked_mul(sqrt_annualization))
        .ok_or(Absence::Overflow)
}

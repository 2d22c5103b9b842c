//! Concentration and rate-sensitivity metrics from the current position
//! snapshot. These are point-in-time values and are never windowed.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Absence;
use crate::stats;
use crate::types::Money;

/// A current holding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub security: String,
    pub sector: String,
    pub market_value: Money,
}

/// Explicit rate-sensitivity input for a fixed-income instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BondDuration {
    pub instrument: String,
    pub market_value: Money,
    pub modified_duration: Decimal,
}

/// Positions held on the as-of date.
///
/// `bond_durations` is `None` when the caller has no duration data, in which
/// case DV01 is reported absent rather than guessed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub positions: Vec<Position>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bond_durations: Option<Vec<BondDuration>>,
}

/// Sum of squared weights on the 0 to 10,000 scale.
fn hhi<'a, I>(market_values: I) -> Result<Decimal, Absence>
where
    I: IntoIterator<Item = &'a Money> + Clone,
{
    let total = stats::checked_sum(market_values.clone()).ok_or(Absence::Overflow)?;
    if total.is_zero() {
        return Err(Absence::Degenerate("zero total market value"));
    }
    let mut sum_sq = Decimal::ZERO;
    for mv in market_values {
        let w = mv.checked_div(total).ok_or(Absence::Overflow)?;
        sum_sq = w.checked_mul(w).and_then(|sq| sum_sq.checked_add(sq)).ok_or(Absence::Overflow)?;
    }
    sum_sq.checked_mul(dec!(10000)).ok_or(Absence::Overflow)
}

fn aggregate_by<F>(positions: &[Position], key: F) -> Result<BTreeMap<&str, Money>, Absence>
where
    F: Fn(&Position) -> &str,
{
    let mut totals: BTreeMap<&str, Money> = BTreeMap::new();
    for p in positions {
        let entry = totals.entry(key(p)).or_insert(Decimal::ZERO);
        *entry = entry.checked_add(p.market_value).ok_or(Absence::Overflow)?;
    }
    Ok(totals)
}

fn require_positions(positions: &[Position]) -> Result<(), Absence> {
    if positions.is_empty() {
        return Err(Absence::Insufficient {
            required: 1,
            available: 0,
        });
    }
    Ok(())
}

/// Security-level HHI. Lots of the same security are combined first.
pub(crate) fn security_hhi(positions: &[Position]) -> Result<Decimal, Absence> {
    require_positions(positions)?;
    let by_security = aggregate_by(positions, |p| p.security.as_str())?;
    hhi(by_security.values())
}

pub(crate) fn sector_hhi(positions: &[Position]) -> Result<Decimal, Absence> {
    require_positions(positions)?;
    let by_sector = aggregate_by(positions, |p| p.sector.as_str())?;
    hhi(by_sector.values())
}

/// Dollar value of one basis point: sum of market value * modified duration * 0.0001.
pub(crate) fn dv01(durations: &[BondDuration]) -> Result<Decimal, Absence> {
    durations.iter().try_fold(Decimal::ZERO, |acc, b| {
        b.market_value
            .checked_mul(b.modified_duration)
            .and_then(|v| v.checked_mul(dec!(0.0001)))
            .and_then(|v| acc.checked_add(v))
            .ok_or(Absence::Overflow)
    })
}

//! Building attribution scopes from per-leg sector data.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::brinson::{ScopeInput, SectorRow};
use crate::conditions::{Condition, DataQualityIssue, Leg};
use crate::error::RiskEngineError;
use crate::stats;
use crate::types::{AttributionType, Rate, Weight};
use crate::RiskEngineResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    Equity,
    FixedIncome,
    Other,
}

/// Sector name -> asset class. Sectors not listed are [`AssetClass::Other`]
/// and only appear in the TOTAL scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectorClassification(BTreeMap<String, AssetClass>);

impl SectorClassification {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, sector: impl Into<String>, class: AssetClass) -> Self {
        self.0.insert(sector.into(), class);
        self
    }

    pub fn class_of(&self, sector: &str) -> AssetClass {
        self.0.get(sector).copied().unwrap_or(AssetClass::Other)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for SectorClassification {
    fn default() -> Self {
        Self::new()
            .with("Tech", AssetClass::Equity)
            .with("Financials", AssetClass::Equity)
            .with("US Broad", AssetClass::Equity)
            .with("Canada Broad", AssetClass::Equity)
            .with("CAN Bonds", AssetClass::FixedIncome)
            .with("US Bonds", AssetClass::FixedIncome)
    }
}

/// One sector on one leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorLeg {
    pub sector: String,
    pub weight: Option<Weight>,
    pub period_return: Option<Rate>,
}

impl SectorLeg {
    pub fn new(sector: impl Into<String>, weight: Weight, period_return: Rate) -> Self {
        Self {
            sector: sector.into(),
            weight: Some(weight),
            period_return: Some(period_return),
        }
    }
}

fn index_leg<'a>(leg: Leg, legs: &'a [SectorLeg]) -> RiskEngineResult<BTreeMap<&'a str, &'a SectorLeg>> {
    let mut index = BTreeMap::new();
    for l in legs {
        if index.insert(l.sector.as_str(), l).is_some() {
            return Err(RiskEngineError::InvalidInput {
                field: format!("{}_sectors", leg),
                reason: format!("sector '{}' appears more than once", l.sector),
            });
        }
    }
    Ok(index)
}

/// Outer join of the two legs by sector name. Rows come out in sector order;
/// a sector missing from one leg keeps that leg's fields `None`.
pub fn merge_legs(portfolio: &[SectorLeg], benchmark: &[SectorLeg]) -> RiskEngineResult<Vec<SectorRow>> {
    let p = index_leg(Leg::Portfolio, portfolio)?;
    let b = index_leg(Leg::Benchmark, benchmark)?;

    let mut sectors: Vec<&str> = p.keys().chain(b.keys()).copied().collect();
    sectors.sort_unstable();
    sectors.dedup();

    Ok(sectors
        .into_iter()
        .map(|sector| {
            let pl = p.get(sector);
            let bl = b.get(sector);
            SectorRow {
                sector: sector.to_string(),
                portfolio_weight: pl.and_then(|l| l.weight),
                benchmark_weight: bl.and_then(|l| l.weight),
                portfolio_return: pl.and_then(|l| l.period_return),
                benchmark_return: bl.and_then(|l| l.period_return),
            }
        })
        .collect())
}

/// Rescale weights to sum to 1. `None` for an empty leg or zero total weight.
fn renormalize(legs: Vec<&SectorLeg>) -> Option<Vec<SectorLeg>> {
    if legs.is_empty() {
        return None;
    }
    let total = stats::checked_sum(legs.iter().filter_map(|l| l.weight.as_ref()))?;
    if total <= Decimal::ZERO {
        return None;
    }
    Some(
        legs.into_iter()
            .map(|l| SectorLeg {
                sector: l.sector.clone(),
                weight: l.weight.and_then(|w| w.checked_div(total)),
                period_return: l.period_return,
            })
            .collect(),
    )
}

/// TOTAL scope plus the EQUITY and FIXED_INCOME subsets.
///
/// Subset weights are renormalized per leg. A subset with no sectors (or no
/// weight) on a leg is skipped and reported with an `EmptyScope` condition,
/// as is TOTAL when neither leg has any sector.
pub fn derive_scopes(
    lookback_days: u32,
    portfolio: &[SectorLeg],
    benchmark: &[SectorLeg],
    classification: &SectorClassification,
) -> RiskEngineResult<(Vec<ScopeInput>, Vec<Condition>)> {
    let mut scopes = Vec::new();
    let mut conditions = Vec::new();

    let rows = merge_legs(portfolio, benchmark)?;
    if rows.is_empty() {
        conditions.push(
            DataQualityIssue::EmptyScope {
                scope: AttributionType::Total,
                leg: None,
            }
            .into(),
        );
    } else {
        scopes.push(ScopeInput {
            attribution_type: AttributionType::Total,
            lookback_days,
            rows,
        });
    }

    for (kind, class) in [
        (AttributionType::Equity, AssetClass::Equity),
        (AttributionType::FixedIncome, AssetClass::FixedIncome),
    ] {
        let p = renormalize(select(portfolio, classification, class));
        let b = renormalize(select(benchmark, classification, class));

        match (p, b) {
            (Some(p), Some(b)) => scopes.push(ScopeInput {
                attribution_type: kind,
                lookback_days,
                rows: merge_legs(&p, &b)?,
            }),
            (p, _) => {
                let leg = if p.is_none() { Leg::Portfolio } else { Leg::Benchmark };
                conditions.push(DataQualityIssue::EmptyScope { scope: kind, leg: Some(leg) }.into());
            }
        }
    }

    Ok((scopes, conditions))
}

fn select<'a>(legs: &'a [SectorLeg], classification: &SectorClassification, class: AssetClass) -> Vec<&'a SectorLeg> {
    legs.iter()
        .filter(|l| classification.class_of(&l.sector) == class)
        .collect()
}

/// Compound daily returns over a period: prod(1 + r) - 1. `None` when the
/// period is empty or any day is missing.
pub fn period_return(daily: &[Option<Rate>]) -> Option<Rate> {
    if daily.is_empty() {
        return None;
    }
    let returns: Option<Vec<Rate>> = daily.iter().copied().collect();
    stats::compound(&returns?)
}

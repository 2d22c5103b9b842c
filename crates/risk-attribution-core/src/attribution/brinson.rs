use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::conditions::{Condition, DataQualityIssue, Leg};
use crate::error::RiskEngineError;
use crate::records::{AttributionStatus, SectorAttributionRecord};
use crate::stats;
use crate::types::{AttributionType, Rate, Weight};
use crate::RiskEngineResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Weights and returns of one sector on both legs. A leg with a missing
/// weight or return cannot be attributed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorRow {
    pub sector: String,
    pub portfolio_weight: Option<Weight>,
    pub benchmark_weight: Option<Weight>,
    pub portfolio_return: Option<Rate>,
    pub benchmark_return: Option<Rate>,
}

impl SectorRow {
    pub fn new(
        sector: impl Into<String>,
        portfolio_weight: Weight,
        benchmark_weight: Weight,
        portfolio_return: Rate,
        benchmark_return: Rate,
    ) -> Self {
        Self {
            sector: sector.into(),
            portfolio_weight: Some(portfolio_weight),
            benchmark_weight: Some(benchmark_weight),
            portfolio_return: Some(portfolio_return),
            benchmark_return: Some(benchmark_return),
        }
    }

    pub fn portfolio_only(sector: impl Into<String>, weight: Weight, period_return: Rate) -> Self {
        Self {
            sector: sector.into(),
            portfolio_weight: Some(weight),
            benchmark_weight: None,
            portfolio_return: Some(period_return),
            benchmark_return: None,
        }
    }

    pub fn benchmark_only(sector: impl Into<String>, weight: Weight, period_return: Rate) -> Self {
        Self {
            sector: sector.into(),
            portfolio_weight: None,
            benchmark_weight: Some(weight),
            portfolio_return: None,
            benchmark_return: Some(period_return),
        }
    }

    fn portfolio_leg(&self) -> Option<(Weight, Rate)> {
        Some((self.portfolio_weight?, self.portfolio_return?))
    }

    fn benchmark_leg(&self) -> Option<(Weight, Rate)> {
        Some((self.benchmark_weight?, self.benchmark_return?))
    }
}

/// All sector rows of one attribution scope for one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeInput {
    pub attribution_type: AttributionType,
    /// Length of the attribution period in days (1 for daily attribution)
    pub lookback_days: u32,
    pub rows: Vec<SectorRow>,
}

impl ScopeInput {
    pub fn daily(attribution_type: AttributionType, rows: Vec<SectorRow>) -> Self {
        Self {
            attribution_type,
            lookback_days: 1,
            rows,
        }
    }
}

/// Return the allocation effect is measured against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationReference {
    /// (wp - wb) * rb
    #[default]
    SectorReturn,
    /// (wp - wb) * (rb - Rb), Rb the aggregate benchmark return
    ExcessOverTotal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttributionParams {
    pub allocation_reference: AllocationReference,
    /// Allowed distance of each leg's weight sum from 1
    pub weight_tolerance: Decimal,
    /// Relative tolerance for the effects / active-return identity
    pub identity_tolerance: Decimal,
    /// Aggregate returns below this magnitude on both legs look stale
    pub stale_return_threshold: Rate,
}

impl Default for AttributionParams {
    fn default() -> Self {
        Self {
            allocation_reference: AllocationReference::SectorReturn,
            weight_tolerance: dec!(0.0001),
            identity_tolerance: dec!(0.000000001),
            stale_return_threshold: dec!(0.0001),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorEffects {
    pub allocation: Decimal,
    pub selection: Decimal,
    pub interaction: Decimal,
}

impl SectorEffects {
    pub fn total(&self) -> Decimal {
        self.allocation + self.selection + self.interaction
    }
}

/// Scope-level totals and the identity check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeSummary {
    pub attribution_type: AttributionType,
    pub lookback_days: u32,
    pub portfolio_return: Option<Rate>,
    pub benchmark_return: Option<Rate>,
    pub active_return: Option<Rate>,
    pub total_allocation: Option<Decimal>,
    pub total_selection: Option<Decimal>,
    pub total_interaction: Option<Decimal>,
    pub total_effect: Option<Decimal>,
    /// total_effect - active_return
    pub residual: Option<Decimal>,
    pub portfolio_weight_sum: Option<Weight>,
    pub benchmark_weight_sum: Option<Weight>,
    pub mapped_sectors: usize,
    pub unmapped_sectors: usize,
    pub validated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributionOutcome {
    pub records: Vec<SectorAttributionRecord>,
    pub summary: ScopeSummary,
    pub conditions: Vec<Condition>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn validate_rows(scope: &ScopeInput) -> RiskEngineResult<()> {
    let field = format!("{}.rows", scope.attribution_type);
    if scope.rows.is_empty() {
        return Err(RiskEngineError::InvalidInput {
            field,
            reason: "at least one sector is required".into(),
        });
    }

    let mut seen = BTreeSet::new();
    for row in &scope.rows {
        if row.sector.trim().is_empty() {
            return Err(RiskEngineError::InvalidInput {
                field,
                reason: "sector name must not be empty".into(),
            });
        }
        if !seen.insert(row.sector.as_str()) {
            return Err(RiskEngineError::InvalidInput {
                field,
                reason: format!("sector '{}' appears more than once", row.sector),
            });
        }
    }
    Ok(())
}

/// Sum of weight * return over the complete legs.
fn weighted_return(legs: &[(Weight, Rate)]) -> Option<Rate> {
    legs.iter()
        .try_fold(Decimal::ZERO, |acc, (w, r)| acc.checked_add(w.checked_mul(*r)?))
}

fn sector_effects(wp: Weight, wb: Weight, rp: Rate, rb: Rate, reference: Rate) -> Option<SectorEffects> {
    let active_weight = wp.checked_sub(wb)?;
    let active_return = rp.checked_sub(rb)?;
    Some(SectorEffects {
        allocation: active_weight.checked_mul(rb.checked_sub(reference)?)?,
        selection: wb.checked_mul(active_return)?,
        interaction: active_weight.checked_mul(active_return)?,
    })
}

fn add(acc: Option<Decimal>, v: Decimal) -> Option<Decimal> {
    acc.and_then(|a| a.checked_add(v))
}

fn check_weight_sums(
    scope: &ScopeInput,
    params: &AttributionParams,
    conditions: &mut Vec<Condition>,
) -> (Option<Weight>, Option<Weight>) {
    let kind = scope.attribution_type;
    let portfolio_sum = stats::checked_sum(scope.rows.iter().filter_map(|r| r.portfolio_weight.as_ref()));
    let benchmark_sum = stats::checked_sum(scope.rows.iter().filter_map(|r| r.benchmark_weight.as_ref()));

    for (leg, sum) in [(Leg::Portfolio, portfolio_sum), (Leg::Benchmark, benchmark_sum)] {
        match sum {
            Some(s) if (s - Decimal::ONE).abs() <= params.weight_tolerance => {}
            Some(s) => {
                conditions.push(
                    DataQualityIssue::WeightSum {
                        scope: kind,
                        leg,
                        sum: s,
                        tolerance: params.weight_tolerance,
                    }
                    .into(),
                );
            }
            None => {
                conditions.push(Condition::Sanitized {
                    field: format!("{}.{}_weight", kind, leg),
                    detail: "weight sum not representable".into(),
                });
            }
        }
    }

    for row in &scope.rows {
        for (leg, weight) in [(Leg::Portfolio, row.portfolio_weight), (Leg::Benchmark, row.benchmark_weight)] {
            if let Some(w) = weight.filter(|w| *w < Decimal::ZERO) {
                conditions.push(
                    DataQualityIssue::NegativeWeight {
                        scope: kind,
                        sector: row.sector.clone(),
                        leg,
                        weight: w,
                    }
                    .into(),
                );
            }
        }
    }

    (portfolio_sum, benchmark_sum)
}

/// Allowed residual: `tol * |active|`, or `tol` itself when the active
/// return is exactly zero.
fn identity_bound(tolerance: Decimal, active_return: Rate) -> Option<Decimal> {
    if active_return.is_zero() {
        Some(tolerance)
    } else {
        tolerance.checked_mul(active_return.abs())
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Brinson attribution of one scope.
///
/// Per sector: allocation = (wp - wb) * (rb - reference), selection =
/// wb * (rp - rb), interaction = (wp - wb) * (rp - rb). Sectors missing a leg
/// (or with no data at all) are reported as unmapped with absent effects.
/// The sum of effects is checked against sum(wp * rp) - sum(wb * rb) within
/// a relative tolerance. Any issue for which
/// [`Condition::invalidates_scope`] holds marks the scope's records
/// unvalidated. Only structurally invalid rows return `Err`.
pub fn compute_attribution(
    as_of: NaiveDate,
    scope: &ScopeInput,
    params: &AttributionParams,
) -> RiskEngineResult<AttributionOutcome> {
    validate_rows(scope)?;
    let kind = scope.attribution_type;
    let mut conditions = Vec::new();

    let (portfolio_weight_sum, benchmark_weight_sum) = check_weight_sums(scope, params, &mut conditions);

    let portfolio_legs: Vec<_> = scope.rows.iter().filter_map(SectorRow::portfolio_leg).collect();
    let benchmark_legs: Vec<_> = scope.rows.iter().filter_map(SectorRow::benchmark_leg).collect();
    let portfolio_return = weighted_return(&portfolio_legs);
    let benchmark_return = weighted_return(&benchmark_legs);

    let reference = match params.allocation_reference {
        AllocationReference::SectorReturn => Some(Decimal::ZERO),
        AllocationReference::ExcessOverTotal => benchmark_return,
    };

    let mut total_allocation = Some(Decimal::ZERO);
    let mut total_selection = Some(Decimal::ZERO);
    let mut total_interaction = Some(Decimal::ZERO);
    let mut mapped_sectors = 0;
    let mut unmapped_sectors = 0;
    let mut records = Vec::with_capacity(scope.rows.len());

    for row in &scope.rows {
        let (status, effects) = match (row.portfolio_leg(), row.benchmark_leg()) {
            (Some((wp, rp)), Some((wb, rb))) => {
                mapped_sectors += 1;
                let effects = reference.and_then(|base| sector_effects(wp, wb, rp, rb, base));
                match effects {
                    Some(e) => {
                        total_allocation = add(total_allocation, e.allocation);
                        total_selection = add(total_selection, e.selection);
                        total_interaction = add(total_interaction, e.interaction);
                    }
                    None => {
                        total_allocation = None;
                        conditions.push(Condition::Sanitized {
                            field: format!("{}.{}", kind, row.sector),
                            detail: "attribution effects not representable".into(),
                        });
                    }
                }
                (AttributionStatus::Validated, effects)
            }
            (portfolio, benchmark) => {
                unmapped_sectors += 1;
                let sector = row.sector.clone();
                let issue = match (portfolio, benchmark) {
                    (None, None) => DataQualityIssue::MissingSectorData { scope: kind, sector },
                    (None, _) => DataQualityIssue::UnmappedSector {
                        scope: kind,
                        sector,
                        missing: Leg::Portfolio,
                    },
                    _ => DataQualityIssue::UnmappedSector {
                        scope: kind,
                        sector,
                        missing: Leg::Benchmark,
                    },
                };
                conditions.push(issue.into());
                (AttributionStatus::Unmapped, None)
            }
        };

        records.push(SectorAttributionRecord {
            as_of_date: as_of,
            attribution_type: kind,
            sector: row.sector.clone(),
            lookback_days: scope.lookback_days,
            allocation_effect: effects.map(|e| e.allocation),
            selection_effect: effects.map(|e| e.selection),
            interaction_effect: effects.map(|e| e.interaction),
            portfolio_weight: row.portfolio_weight,
            benchmark_weight: row.benchmark_weight,
            portfolio_return: row.portfolio_return,
            benchmark_return: row.benchmark_return,
            total_benchmark_return: benchmark_return,
            status,
        });
    }

    let active_return = portfolio_return
        .zip(benchmark_return)
        .and_then(|(p, b)| p.checked_sub(b));
    let total_effect = total_allocation
        .zip(total_selection)
        .zip(total_interaction)
        .and_then(|((a, s), i)| a.checked_add(s)?.checked_add(i));
    let residual = total_effect
        .zip(active_return)
        .and_then(|(t, a)| t.checked_sub(a));

    let identity_checked = match (residual, active_return) {
        (Some(r), Some(a)) => match identity_bound(params.identity_tolerance, a) {
            Some(bound) => {
                if r.abs() > bound {
                    conditions.push(DataQualityIssue::IdentityResidual { scope: kind, residual: r }.into());
                }
                true
            }
            None => false,
        },
        _ => false,
    };

    if let (Some(p), Some(b)) = (portfolio_return, benchmark_return) {
        if p.abs() < params.stale_return_threshold && b.abs() < params.stale_return_threshold {
            conditions.push(
                DataQualityIssue::StaleReturns {
                    scope: kind,
                    portfolio_return: p,
                    benchmark_return: b,
                }
                .into(),
            );
        }
    }

    let validated = identity_checked
        && portfolio_weight_sum.is_some()
        && benchmark_weight_sum.is_some()
        && !conditions.iter().any(Condition::invalidates_scope);
    if !validated {
        for record in records
            .iter_mut()
            .filter(|r| r.status == AttributionStatus::Validated)
        {
            record.status = AttributionStatus::Unvalidated;
        }
    }

    debug!(
        scope = %kind,
        lookback_days = scope.lookback_days,
        mapped = mapped_sectors,
        unmapped = unmapped_sectors,
        validated,
        "attribution scope computed"
    );

    Ok(AttributionOutcome {
        records,
        summary: ScopeSummary {
            attribution_type: kind,
            lookback_days: scope.lookback_days,
            portfolio_return,
            benchmark_return,
            active_return,
            total_allocation,
            total_selection,
            total_interaction,
            total_effect,
            residual,
            portfolio_weight_sum,
            benchmark_weight_sum,
            mapped_sectors,
            unmapped_sectors,
            validated,
        },
        conditions,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Risk metric engine.
//!
//! [`compute_metrics`] evaluates every [`MetricKind`] for every requested
//! [`Window`]. A metric that cannot be computed is stored as `None` together
//! with a [`Condition`]; one failing metric never affects the others.

pub mod concentration;
pub mod kind;
pub mod market;
pub mod relative;

pub use concentration::{BondDuration, Position, PositionSnapshot};
pub use kind::{Confidence, MetricBasis, MetricKind};

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::debug;

use crate::conditions::Condition;
use crate::error::RiskEngineError;
use crate::series::{align, ReturnSeries};
use crate::stats;
use crate::types::{Rate, Window, TRADING_DAYS_PER_YEAR};
use crate::RiskEngineResult;

/// Why a formula produced no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Absence {
    Insufficient { required: usize, available: usize },
    Degenerate(&'static str),
    MissingInput(&'static str),
    Overflow,
}

/// Numeric parameters shared by all formulas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricParams {
    annualization: Decimal,
    sqrt_annualization: Decimal,
    daily_risk_free: Rate,
}

impl MetricParams {
    /// `annualization` is the number of return periods per year;
    /// `annual_risk_free` is converted to a per-period rate.
    pub fn new(annualization: Decimal, annual_risk_free: Rate) -> RiskEngineResult<Self> {
        if annualization <= Decimal::ZERO {
            return Err(RiskEngineError::InvalidInput {
                field: "annualization".into(),
                reason: "must be positive".into(),
            });
        }
        let sqrt_annualization = stats::sqrt(annualization).ok_or_else(|| RiskEngineError::InvalidInput {
            field: "annualization".into(),
            reason: "square root not representable".into(),
        })?;
        let daily_risk_free = annual_risk_free
            .checked_div(annualization)
            .ok_or_else(|| RiskEngineError::InvalidInput {
                field: "risk_free_rate".into(),
                reason: "not representable per period".into(),
            })?;
        Ok(Self {
            annualization,
            sqrt_annualization,
            daily_risk_free,
        })
    }

    pub fn annualization(&self) -> Decimal {
        self.annualization
    }
}

impl Default for MetricParams {
    fn default() -> Self {
        let annualization = Decimal::from(TRADING_DAYS_PER_YEAR);
        Self {
            annualization,
            sqrt_annualization: stats::sqrt(annualization).unwrap_or(Decimal::ZERO),
            daily_risk_free: Decimal::ZERO,
        }
    }
}

/// Identity of one computed value. `window` is `None` for snapshot metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricKey {
    pub metric: MetricKind,
    pub window: Option<Window>,
}

impl MetricKey {
    pub fn windowed(metric: MetricKind, window: Window) -> Self {
        Self {
            metric,
            window: Some(window),
        }
    }

    pub fn snapshot(metric: MetricKind) -> Self {
        Self { metric, window: None }
    }
}

/// Result of [`compute_metrics`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSet {
    pub values: BTreeMap<MetricKey, Option<Decimal>>,
    pub conditions: Vec<Condition>,
}

impl MetricSet {
    /// The value for a windowed metric, `None` when absent or not requested.
    pub fn get(&self, metric: MetricKind, window: Window) -> Option<Decimal> {
        self.values
            .get(&MetricKey::windowed(metric, window))
            .copied()
            .flatten()
    }

    pub fn get_snapshot(&self, metric: MetricKind) -> Option<Decimal> {
        self.values.get(&MetricKey::snapshot(metric)).copied().flatten()
    }

    /// Whether the key was evaluated (present or absent).
    pub fn contains(&self, key: &MetricKey) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn record(&mut self, key: MetricKey, outcome: Result<Decimal, Absence>) {
        let value = match outcome {
            Ok(v) => Some(v),
            Err(absence) => {
                self.conditions.push(absence_condition(key, absence));
                None
            }
        };
        self.values.insert(key, value);
    }
}

fn absence_condition(key: MetricKey, absence: Absence) -> Condition {
    match absence {
        Absence::Insufficient { required, available } => Condition::InsufficientData {
            metric: key.metric,
            window: key.window,
            required,
            available,
        },
        Absence::Degenerate(reason) => Condition::DegenerateNumeric {
            metric: key.metric,
            window: key.window,
            reason: reason.to_string(),
        },
        Absence::MissingInput(input) => Condition::MissingInput {
            metric: key.metric,
            input: input.to_string(),
        },
        Absence::Overflow => Condition::Sanitized {
            field: key.metric.name().to_string(),
            detail: format!(
                "{} result not representable",
                key.window.map_or_else(|| "snapshot".to_string(), |w| w.to_string())
            ),
        },
    }
}

struct MetricInputs<'a> {
    sample: &'a [Rate],
    pairs: &'a [(Rate, Rate)],
    snapshot: &'a PositionSnapshot,
    params: &'a MetricParams,
}

/// One formula per metric.
fn evaluate(metric: MetricKind, inputs: &MetricInputs<'_>) -> Result<Decimal, Absence> {
    let p = inputs.params;
    match metric {
        MetricKind::Var95 => market::value_at_risk(inputs.sample, Confidence::P95),
        MetricKind::Var99 => market::value_at_risk(inputs.sample, Confidence::P99),
        MetricKind::ExpectedShortfall95 => market::expected_shortfall(inputs.sample, Confidence::P95),
        MetricKind::ExpectedShortfall99 => market::expected_shortfall(inputs.sample, Confidence::P99),
        MetricKind::Volatility => market::annualized_volatility(inputs.sample, p.sqrt_annualization),
        MetricKind::SharpeRatio => {
            market::sharpe_ratio(inputs.sample, p.daily_risk_free, p.sqrt_annualization)
        }
        MetricKind::MaxDrawdown => market::max_drawdown(inputs.sample),
        MetricKind::Beta => relative::beta(inputs.pairs),
        MetricKind::TrackingError => relative::tracking_error(inputs.pairs, p.sqrt_annualization),
        MetricKind::InformationRatio => {
            relative::information_ratio(inputs.pairs, p.annualization, p.sqrt_annualization)
        }
        MetricKind::ActiveReturn => relative::active_return(inputs.pairs, p.annualization),
        MetricKind::SecurityHhi => concentration::security_hhi(&inputs.snapshot.positions),
        MetricKind::SectorHhi => concentration::sector_hhi(&inputs.snapshot.positions),
        MetricKind::Dv01 => match &inputs.snapshot.bond_durations {
            Some(durations) => concentration::dv01(durations),
            None => Err(Absence::MissingInput("bond durations")),
        },
    }
}

/// Compute every metric for every window.
///
/// Market-risk metrics use all non-missing portfolio returns; relative-risk
/// metrics use only dates where both series have a return. A trailing window
/// of `n` days yields `None` for a metric when fewer than `n` such
/// observations exist. Snapshot metrics are evaluated once, keyed without a
/// window.
pub fn compute_metrics(
    portfolio: &ReturnSeries,
    benchmark: &ReturnSeries,
    snapshot: &PositionSnapshot,
    windows: &[Window],
    params: &MetricParams,
) -> MetricSet {
    let single = portfolio.observations();
    let paired = align(portfolio, benchmark);
    let mut set = MetricSet::default();

    let mut windows = windows.to_vec();
    windows.sort();
    windows.dedup();

    for window in windows {
        let inputs = MetricInputs {
            sample: window.select(&single),
            pairs: window.select(&paired),
            snapshot,
            params,
        };
        debug!(
            window = %window,
            observations = inputs.sample.len(),
            paired = inputs.pairs.len(),
            "evaluating window"
        );

        for metric in MetricKind::ALL.into_iter().filter(MetricKind::is_windowed) {
            let required = window.required_observations(metric.min_observations());
            let available = match metric.basis() {
                MetricBasis::Paired => inputs.pairs.len(),
                MetricBasis::SingleSeries | MetricBasis::Snapshot => inputs.sample.len(),
            };
            let outcome = if available < required {
                Err(Absence::Insufficient { required, available })
            } else {
                evaluate(metric, &inputs)
            };
            set.record(MetricKey::windowed(metric, window), outcome);
        }
    }

    let inputs = MetricInputs {
        sample: &[],
        pairs: &[],
        snapshot,
        params,
    };
    for metric in MetricKind::ALL.into_iter().filter(|m| !m.is_windowed()) {
        set.record(MetricKey::snapshot(metric), evaluate(metric, &inputs));
    }

    set
}

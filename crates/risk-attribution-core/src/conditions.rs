use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::metrics::MetricKind;
use crate::types::{AttributionType, Window};

/// Side of an attribution comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Leg {
    Portfolio,
    Benchmark,
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leg::Portfolio => f.write_str("portfolio"),
            Leg::Benchmark => f.write_str("benchmark"),
        }
    }
}

/// A non-fatal condition raised while computing a batch.
///
/// Conditions travel alongside the records; none of them aborts the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Fewer observations than the window or formula needs.
    InsufficientData {
        metric: MetricKind,
        window: Option<Window>,
        required: usize,
        available: usize,
    },
    /// A required input was never supplied (e.g. bond durations for DV01).
    MissingInput {
        metric: MetricKind,
        input: String,
    },
    /// A zero denominator made the metric undefined.
    DegenerateNumeric {
        metric: MetricKind,
        window: Option<Window>,
        reason: String,
    },
    DataQuality(DataQualityIssue),
    /// A non-finite or unrepresentable value was replaced by "absent".
    Sanitized { field: String, detail: String },
}

/// Attribution input problems. Affected records are still produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQualityIssue {
    WeightSum {
        scope: AttributionType,
        leg: Leg,
        sum: Decimal,
        tolerance: Decimal,
    },
    NegativeWeight {
        scope: AttributionType,
        sector: String,
        leg: Leg,
        weight: Decimal,
    },
    UnmappedSector {
        scope: AttributionType,
        sector: String,
        missing: Leg,
    },
    /// Sum of effects differs from aggregate active return.
    IdentityResidual {
        scope: AttributionType,
        residual: Decimal,
    },
    /// Both aggregate returns are below the stale-price threshold.
    StaleReturns {
        scope: AttributionType,
        portfolio_return: Decimal,
        benchmark_return: Decimal,
    },
    /// Sector row with no complete leg at all.
    MissingSectorData { scope: AttributionType, sector: String },
    /// A scope had no sectors on `leg` (on either leg when `None`) and was
    /// skipped.
    EmptyScope { scope: AttributionType, leg: Option<Leg> },
}

impl Condition {
    pub fn metric(&self) -> Option<MetricKind> {
        match self {
            Condition::InsufficientData { metric, .. }
            | Condition::MissingInput { metric, .. }
            | Condition::DegenerateNumeric { metric, .. } => Some(*metric),
            Condition::DataQuality(_) | Condition::Sanitized { .. } => None,
        }
    }

    pub fn is_data_quality(&self) -> bool {
        matches!(self, Condition::DataQuality(_))
    }

    pub fn invalidates_scope(&self) -> bool {
        matches!(self, Condition::DataQuality(issue) if issue.invalidates_scope())
    }
}

impl DataQualityIssue {
    pub fn scope(&self) -> AttributionType {
        match self {
            DataQualityIssue::WeightSum { scope, .. }
            | DataQualityIssue::NegativeWeight { scope, .. }
            | DataQualityIssue::UnmappedSector { scope, .. }
            | DataQualityIssue::IdentityResidual { scope, .. }
            | DataQualityIssue::StaleReturns { scope, .. }
            | DataQualityIssue::MissingSectorData { scope, .. }
            | DataQualityIssue::EmptyScope { scope, .. } => *scope,
        }
    }

    /// Whether the issue leaves the scope's records unvalidated.
    pub fn invalidates_scope(&self) -> bool {
        match self {
            DataQualityIssue::WeightSum { .. }
            | DataQualityIssue::NegativeWeight { .. }
            | DataQualityIssue::IdentityResidual { .. } => true,
            DataQualityIssue::UnmappedSector { .. }
            | DataQualityIssue::StaleReturns { .. }
            | DataQualityIssue::MissingSectorData { .. }
            | DataQualityIssue::EmptyScope { .. } => false,
        }
    }
}

impl From<DataQualityIssue> for Condition {
    fn from(issue: DataQualityIssue) -> Self {
        Condition::DataQuality(issue)
    }
}

fn window_label(window: &Option<Window>) -> String {
    window.map_or_else(|| "snapshot".to_string(), |w| w.to_string())
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::InsufficientData {
                metric,
                window,
                required,
                available,
            } => write!(
                f,
                "{} ({}): insufficient data, {} observations required, {} available",
                metric,
                window_label(window),
                required,
                available
            ),
            Condition::MissingInput { metric, input } => {
                write!(f, "{}: missing input '{}'", metric, input)
            }
            Condition::DegenerateNumeric {
                metric,
                window,
                reason,
            } => write!(f, "{} ({}): undefined, {}", metric, window_label(window), reason),
            Condition::DataQuality(issue) => write!(f, "{}", issue),
            Condition::Sanitized { field, detail } => write!(f, "{}: sanitized, {}", field, detail),
        }
    }
}

impl fmt::Display for DataQualityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataQualityIssue::WeightSum {
                scope,
                leg,
                sum,
                tolerance,
            } => write!(
                f,
                "{}: {} weights sum to {} (must be within {} of 1)",
                scope, leg, sum, tolerance
            ),
            DataQualityIssue::NegativeWeight {
                scope,
                sector,
                leg,
                weight,
            } => write!(
                f,
                "{}: negative {} weight in sector '{}': {}",
                scope, leg, sector, weight
            ),
            DataQualityIssue::UnmappedSector {
                scope,
                sector,
                missing,
            } => write!(f, "{}: sector '{}' has no {} counterpart", scope, sector, missing),
            DataQualityIssue::IdentityResidual { scope, residual } => write!(
                f,
                "{}: attribution effects differ from active return by {}",
                scope, residual
            ),
            DataQualityIssue::StaleReturns {
                scope,
                portfolio_return,
                benchmark_return,
            } => write!(
                f,
                "{}: portfolio ({}) and benchmark ({}) returns below 1bp, prices may be stale",
                scope, portfolio_return, benchmark_return
            ),
            DataQualityIssue::MissingSectorData { scope, sector } => {
                write!(f, "{}: sector '{}' has no weight and return on either leg", scope, sector)
            }
            DataQualityIssue::EmptyScope { scope, leg: Some(leg) } => {
                write!(f, "{}: no {} sectors, scope skipped", scope, leg)
            }
            DataQualityIssue::EmptyScope { scope, leg: None } => {
                write!(f, "{}: no sectors on either leg, scope skipped", scope)
            }
        }
    }
}

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::MetricCategory;

/// Tail confidence for VaR and Expected Shortfall
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Confidence {
    P95,
    P99,
}

impl Confidence {
    /// Percentile of the return sample that marks the tail (5 for 95%).
    pub fn tail_percentile(&self) -> Decimal {
        match self {
            Confidence::P95 => Decimal::from(5),
            Confidence::P99 => Decimal::ONE,
        }
    }
}

/// What a metric is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricBasis {
    /// Portfolio returns only
    SingleSeries,
    /// Portfolio and benchmark returns on common dates
    Paired,
    /// Current position snapshot, not windowed
    Snapshot,
}

/// Every metric the engine can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetricKind {
    #[serde(rename = "VaR_95")]
    Var95,
    #[serde(rename = "VaR_99")]
    Var99,
    #[serde(rename = "Expected_Shortfall_95")]
    ExpectedShortfall95,
    #[serde(rename = "Expected_Shortfall_99")]
    ExpectedShortfall99,
    #[serde(rename = "Volatility_Ann")]
    Volatility,
    #[serde(rename = "Sharpe_Ratio")]
    SharpeRatio,
    #[serde(rename = "Max_Drawdown")]
    MaxDrawdown,
    #[serde(rename = "Beta")]
    Beta,
    #[serde(rename = "Tracking_Error")]
    TrackingError,
    #[serde(rename = "Information_Ratio")]
    InformationRatio,
    #[serde(rename = "Active_Return")]
    ActiveReturn,
    #[serde(rename = "HHI_Security")]
    SecurityHhi,
    #[serde(rename = "HHI_Sector")]
    SectorHhi,
    #[serde(rename = "DV01")]
    Dv01,
}

impl MetricKind {
    pub const ALL: [MetricKind; 14] = [
        MetricKind::Var95,
        MetricKind::Var99,
        MetricKind::ExpectedShortfall95,
        MetricKind::ExpectedShortfall99,
        MetricKind::Volatility,
        MetricKind::SharpeRatio,
        MetricKind::MaxDrawdown,
        MetricKind::Beta,
        MetricKind::TrackingError,
        MetricKind::InformationRatio,
        MetricKind::ActiveReturn,
        MetricKind::SecurityHhi,
        MetricKind::SectorHhi,
        MetricKind::Dv01,
    ];

    /// Persisted metric name.
    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::Var95 => "VaR_95",
            MetricKind::Var99 => "VaR_99",
            MetricKind::ExpectedShortfall95 => "Expected_Shortfall_95",
            MetricKind::ExpectedShortfall99 => "Expected_Shortfall_99",
            MetricKind::Volatility => "Volatility_Ann",
            MetricKind::SharpeRatio => "Sharpe_Ratio",
            MetricKind::MaxDrawdown => "Max_Drawdown",
            MetricKind::Beta => "Beta",
            MetricKind::TrackingError => "Tracking_Error",
            MetricKind::InformationRatio => "Information_Ratio",
            MetricKind::ActiveReturn => "Active_Return",
            MetricKind::SecurityHhi => "HHI_Security",
            MetricKind::SectorHhi => "HHI_Sector",
            MetricKind::Dv01 => "DV01",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    pub fn category(&self) -> MetricCategory {
        match self {
            MetricKind::Var95
            | MetricKind::Var99
            | MetricKind::ExpectedShortfall95
            | MetricKind::ExpectedShortfall99
            | MetricKind::Volatility
            | MetricKind::SharpeRatio
            | MetricKind::MaxDrawdown => MetricCategory::MarketRisk,
            MetricKind::Beta
            | MetricKind::TrackingError
            | MetricKind::InformationRatio
            | MetricKind::ActiveReturn => MetricCategory::RelativeRisk,
            MetricKind::SecurityHhi | MetricKind::SectorHhi => MetricCategory::Concentration,
            MetricKind::Dv01 => MetricCategory::DurationRisk,
        }
    }

    pub fn basis(&self) -> MetricBasis {
        match self.category() {
            MetricCategory::MarketRisk => MetricBasis::SingleSeries,
            MetricCategory::RelativeRisk => MetricBasis::Paired,
            MetricCategory::Concentration | MetricCategory::DurationRisk => MetricBasis::Snapshot,
        }
    }

    pub fn is_windowed(&self) -> bool {
        self.basis() != MetricBasis::Snapshot
    }

    /// Smallest sample the formula is defined on, independent of window.
    pub fn min_observations(&self) -> usize {
        match self {
            MetricKind::Volatility
            | MetricKind::SharpeRatio
            | MetricKind::Beta
            | MetricKind::TrackingError
            | MetricKind::InformationRatio => 2,
            MetricKind::Var95
            | MetricKind::Var99
            | MetricKind::ExpectedShortfall95
            | MetricKind::ExpectedShortfall99
            | MetricKind::MaxDrawdown
            | MetricKind::ActiveReturn => 1,
            MetricKind::SecurityHhi | MetricKind::SectorHhi | MetricKind::Dv01 => 0,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

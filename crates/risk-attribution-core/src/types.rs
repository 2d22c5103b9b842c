use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Fraction of a portfolio or benchmark (0.25 = 25%).
pub type Weight = Decimal;

/// Market values and other monetary amounts.
pub type Money = Decimal;

/// Trading days per year used for annualisation of daily statistics.
pub const TRADING_DAYS_PER_YEAR: u32 = 252;

/// Lookback window applied to a return series.
///
/// `Trailing(n)` keeps the `n` most recent observations and produces no value
/// when fewer than `n` exist. `Expanding` keeps everything from inception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Window {
    Trailing(u32),
    Expanding,
}

impl Window {
    /// Persisted `lookback_days`; `None` for the expanding window.
    pub fn lookback_days(&self) -> Option<u32> {
        match self {
            Window::Trailing(n) => Some(*n),
            Window::Expanding => None,
        }
    }

    /// Observations a metric needs in this window, given the metric's own
    /// statistical minimum.
    pub fn required_observations(&self, intrinsic_minimum: usize) -> usize {
        match self {
            Window::Trailing(n) => (*n as usize).max(intrinsic_minimum),
            Window::Expanding => intrinsic_minimum,
        }
    }

    /// The tail of `observations` that falls inside the window.
    pub fn select<'a, T>(&self, observations: &'a [T]) -> &'a [T] {
        match self {
            Window::Trailing(n) => {
                let start = observations.len().saturating_sub(*n as usize);
                &observations[start..]
            }
            Window::Expanding => observations,
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Window::Trailing(n) => write!(f, "{}d", n),
            Window::Expanding => write!(f, "expanding"),
        }
    }
}

/// Attribution scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributionType {
    Total,
    Equity,
    FixedIncome,
}

impl AttributionType {
    pub const ALL: [AttributionType; 3] = [
        AttributionType::Total,
        AttributionType::Equity,
        AttributionType::FixedIncome,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttributionType::Total => "TOTAL",
            AttributionType::Equity => "EQUITY",
            AttributionType::FixedIncome => "FIXED_INCOME",
        }
    }
}

impl fmt::Display for AttributionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reporting category of a risk metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricCategory {
    MarketRisk,
    RelativeRisk,
    Concentration,
    DurationRisk,
}

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::metrics::MetricKind;
use crate::types::{AttributionType, MetricCategory, Rate, Weight};

/// One risk metric value for one as-of date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetricRecord {
    pub as_of_date: NaiveDate,
    pub metric_name: MetricKind,
    pub metric_value: Option<Decimal>,
    pub metric_category: MetricCategory,
    /// `None` for the expanding window and for snapshot metrics
    pub lookback_days: Option<u32>,
}

/// Uniqueness key of a [`RiskMetricRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MetricRecordKey {
    pub as_of_date: NaiveDate,
    pub metric_name: MetricKind,
    pub lookback_days: Option<u32>,
}

impl RiskMetricRecord {
    pub fn key(&self) -> MetricRecordKey {
        MetricRecordKey {
            as_of_date: self.as_of_date,
            metric_name: self.metric_name,
            lookback_days: self.lookback_days,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionStatus {
    Validated,
    /// Scope weights or the effect identity failed validation
    Unvalidated,
    /// Sector has no counterpart on one leg; effects are absent
    Unmapped,
}

/// Brinson effects for one sector in one scope on one as-of date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorAttributionRecord {
    pub as_of_date: NaiveDate,
    pub attribution_type: AttributionType,
    pub sector: String,
    pub lookback_days: u32,
    pub allocation_effect: Option<Decimal>,
    pub selection_effect: Option<Decimal>,
    pub interaction_effect: Option<Decimal>,
    pub portfolio_weight: Option<Weight>,
    pub benchmark_weight: Option<Weight>,
    pub portfolio_return: Option<Rate>,
    pub benchmark_return: Option<Rate>,
    pub total_benchmark_return: Option<Rate>,
    pub status: AttributionStatus,
}

/// Uniqueness key of a [`SectorAttributionRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttributionRecordKey {
    pub as_of_date: NaiveDate,
    pub attribution_type: AttributionType,
    pub sector: String,
    pub lookback_days: u32,
}

impl SectorAttributionRecord {
    pub fn key(&self) -> AttributionRecordKey {
        AttributionRecordKey {
            as_of_date: self.as_of_date,
            attribution_type: self.attribution_type,
            sector: self.sector.clone(),
            lookback_days: self.lookback_days,
        }
    }

    /// allocation + selection + interaction, when all three are present.
    pub fn total_effect(&self) -> Option<Decimal> {
        Some(self.allocation_effect? + self.selection_effect? + self.interaction_effect?)
    }
}

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::records::{RiskMetricRecord, SectorAttributionRecord};

/// Convert a raw floating-point value from an external feed into a decimal.
///
/// NaN, infinities and magnitudes outside the decimal range come back as
/// `None`. This is the only place floating-point values enter the engine.
pub fn decimal_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_f64(value)
}

/// Final pass applied to every value before it leaves the engine.
#[derive(Debug, Clone, Copy)]
pub struct Sanitizer {
    scale: u32,
}

impl Sanitizer {
    /// `scale` is the number of decimal places persisted.
    pub fn new(scale: u32) -> Self {
        Self { scale }
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn value(&self, value: Option<Decimal>) -> Option<Decimal> {
        value.map(|v| {
            v.round_dp_with_strategy(self.scale, RoundingStrategy::MidpointNearestEven)
                .normalize()
        })
    }

    pub fn metric_record(&self, mut record: RiskMetricRecord) -> RiskMetricRecord {
        record.metric_value = self.value(record.metric_value);
        record
    }

    pub fn attribution_record(&self, mut record: SectorAttributionRecord) -> SectorAttributionRecord {
        record.allocation_effect = self.value(record.allocation_effect);
        record.selection_effect = self.value(record.selection_effect);
        record.interaction_effect = self.value(record.interaction_effect);
        record.portfolio_weight = self.value(record.portfolio_weight);
        record.benchmark_weight = self.value(record.benchmark_weight);
        record.portfolio_return = self.value(record.portfolio_return);
        record.benchmark_return = self.value(record.benchmark_return);
        record.total_benchmark_return = self.value(record.total_benchmark_return);
        record
    }
}

//! Persistence boundary for computed batches.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::engine::BatchOutput;
use crate::error::RiskEngineError;
use crate::records::{AttributionRecordKey, MetricRecordKey, RiskMetricRecord, SectorAttributionRecord};
use crate::RiskEngineResult;

/// Destination for batch records.
///
/// Writes are idempotent replaces for one as-of date: writing the same batch
/// twice leaves the same stored state. Implementations must reject records
/// dated differently from `as_of` and writes for dates older than the latest
/// stored date.
pub trait RecordSink {
    /// Replace every metric stored for `as_of`. Returns the number written.
    fn upsert_metrics(&mut self, as_of: NaiveDate, records: &[RiskMetricRecord]) -> RiskEngineResult<usize>;

    /// Replace the attribution stored for `as_of` for every lookback in
    /// `lookbacks`, including lookbacks with no records (which clears them).
    /// Every record must carry one of `lookbacks`. Returns the number
    /// written.
    fn upsert_attribution(
        &mut self,
        as_of: NaiveDate,
        lookbacks: &[u32],
        records: &[SectorAttributionRecord],
    ) -> RiskEngineResult<usize>;

    fn persist(&mut self, batch: &BatchOutput) -> RiskEngineResult<(usize, usize)> {
        let metrics = self.upsert_metrics(batch.as_of, &batch.metrics)?;
        let attribution = self.upsert_attribution(batch.as_of, &batch.attribution_lookbacks, &batch.attribution)?;
        Ok((metrics, attribution))
    }
}

/// [`RecordSink`] backed by ordered maps keyed by the record uniqueness keys.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    metrics: BTreeMap<MetricRecordKey, RiskMetricRecord>,
    attribution: BTreeMap<AttributionRecordKey, SectorAttributionRecord>,
    latest: Option<NaiveDate>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent as-of date written.
    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.latest
    }

    pub fn metric(&self, key: &MetricRecordKey) -> Option<&RiskMetricRecord> {
        self.metrics.get(key)
    }

    pub fn metrics_on(&self, as_of: NaiveDate) -> Vec<&RiskMetricRecord> {
        self.metrics.values().filter(|r| r.as_of_date == as_of).collect()
    }

    pub fn attribution_on(&self, as_of: NaiveDate) -> Vec<&SectorAttributionRecord> {
        self.attribution.values().filter(|r| r.as_of_date == as_of).collect()
    }

    pub fn metric_count(&self) -> usize {
        self.metrics.len()
    }

    pub fn attribution_count(&self) -> usize {
        self.attribution.len()
    }

    fn check_date(&self, as_of: NaiveDate, record_dates: impl IntoIterator<Item = NaiveDate>) -> RiskEngineResult<()> {
        if let Some(latest) = self.latest.filter(|latest| as_of < *latest) {
            return Err(RiskEngineError::Persistence(format!(
                "cannot write {}: records exist up to {}",
                as_of, latest
            )));
        }
        if let Some(date) = record_dates.into_iter().find(|d| *d != as_of) {
            return Err(RiskEngineError::Persistence(format!(
                "record dated {} in batch for {}",
                date, as_of
            )));
        }
        Ok(())
    }

    fn advance(&mut self, as_of: NaiveDate) {
        self.latest = Some(self.latest.map_or(as_of, |latest| latest.max(as_of)));
    }
}

fn duplicate_key<K: Ord + std::fmt::Debug>(keys: impl IntoIterator<Item = K>) -> RiskEngineResult<()> {
    let mut seen = BTreeSet::new();
    for key in keys {
        if seen.contains(&key) {
            return Err(RiskEngineError::Persistence(format!("duplicate record {:?} in batch", key)));
        }
        seen.insert(key);
    }
    Ok(())
}

impl RecordSink for InMemoryStore {
    fn upsert_metrics(&mut self, as_of: NaiveDate, records: &[RiskMetricRecord]) -> RiskEngineResult<usize> {
        self.check_date(as_of, records.iter().map(|r| r.as_of_date))?;
        duplicate_key(records.iter().map(RiskMetricRecord::key))?;

        self.metrics.retain(|key, _| key.as_of_date != as_of);
        for record in records {
            self.metrics.insert(record.key(), record.clone());
        }
        self.advance(as_of);
        debug!(as_of = %as_of, written = records.len(), "metrics replaced");
        Ok(records.len())
    }

    fn upsert_attribution(
        &mut self,
        as_of: NaiveDate,
        lookbacks: &[u32],
        records: &[SectorAttributionRecord],
    ) -> RiskEngineResult<usize> {
        self.check_date(as_of, records.iter().map(|r| r.as_of_date))?;
        duplicate_key(records.iter().map(SectorAttributionRecord::key))?;

        let lookbacks: BTreeSet<u32> = lookbacks.iter().copied().collect();
        if let Some(r) = records.iter().find(|r| !lookbacks.contains(&r.lookback_days)) {
            return Err(RiskEngineError::Persistence(format!(
                "record for {} has lookback {} outside the replaced lookbacks",
                r.sector, r.lookback_days
            )));
        }
        self.attribution
            .retain(|key, _| key.as_of_date != as_of || !lookbacks.contains(&key.lookback_days));
        for record in records {
            self.attribution.insert(record.key(), record.clone());
        }
        self.advance(as_of);
        debug!(as_of = %as_of, written = records.len(), "attribution replaced");
        Ok(records.len())
    }
}

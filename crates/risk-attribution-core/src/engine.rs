//! Batch orchestration for one as-of date.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::attribution::{
    compute_attribution, derive_scopes, AttributionOutcome, AttributionParams, ScopeInput, ScopeSummary,
    SectorLeg,
};
use crate::conditions::{Condition, DataQualityIssue};
use crate::config::EngineConfig;
use crate::error::RiskEngineError;
use crate::metrics::{compute_metrics, MetricKind, MetricParams, MetricSet, PositionSnapshot};
use crate::records::{RiskMetricRecord, SectorAttributionRecord};
use crate::sanitize::Sanitizer;
use crate::series::ReturnSeries;
use crate::source::ReturnSeriesSource;
use crate::store::RecordSink;
use crate::RiskEngineResult;

// ---------------------------------------------------------------------------
// Input / Output
// ---------------------------------------------------------------------------

/// Per-leg sector data from which the TOTAL, EQUITY and FIXED_INCOME scopes
/// are derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorLegs {
    pub lookback_days: u32,
    pub portfolio: Vec<SectorLeg>,
    pub benchmark: Vec<SectorLeg>,
}

/// Everything one batch reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineInput {
    pub as_of: NaiveDate,
    pub portfolio: ReturnSeries,
    pub benchmark: ReturnSeries,
    #[serde(default)]
    pub snapshot: PositionSnapshot,
    /// Scopes supplied as ready-made sector rows
    #[serde(default)]
    pub scopes: Vec<ScopeInput>,
    /// Scopes to derive using the configured sector classification
    #[serde(default)]
    pub sector_legs: Vec<SectorLegs>,
}

impl EngineInput {
    pub fn new(as_of: NaiveDate, portfolio: ReturnSeries, benchmark: ReturnSeries) -> Self {
        Self {
            as_of,
            portfolio,
            benchmark,
            snapshot: PositionSnapshot::default(),
            scopes: Vec::new(),
            sector_legs: Vec::new(),
        }
    }

    /// Structural checks. Anything that fails here aborts the batch.
    pub fn validate(&self) -> RiskEngineResult<()> {
        if self.portfolio.observation_count() == 0 {
            return Err(RiskEngineError::EmptySeries(self.portfolio.label().to_string()));
        }
        for series in [&self.portfolio, &self.benchmark] {
            if let Some(last) = series.last_date().filter(|d| *d > self.as_of) {
                return Err(RiskEngineError::InvalidSeries {
                    series: series.label().to_string(),
                    reason: format!("contains {} after as-of date {}", last, self.as_of),
                });
            }
        }
        if let Some(p) = self
            .snapshot
            .positions
            .iter()
            .find(|p| p.market_value.is_sign_negative() && !p.market_value.is_zero())
        {
            return Err(RiskEngineError::InvalidInput {
                field: "positions".into(),
                reason: format!("negative market value for {}", p.security),
            });
        }
        if let Some(b) = self
            .snapshot
            .bond_durations
            .iter()
            .flatten()
            .find(|b| b.market_value.is_sign_negative() && !b.market_value.is_zero())
        {
            return Err(RiskEngineError::InvalidInput {
                field: "bond_durations".into(),
                reason: format!("negative market value for {}", b.instrument),
            });
        }
        Ok(())
    }
}

/// Records and conditions produced for one as-of date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutput {
    pub as_of: NaiveDate,
    pub metrics: Vec<RiskMetricRecord>,
    pub attribution: Vec<SectorAttributionRecord>,
    pub summaries: Vec<ScopeSummary>,
    /// Attribution lookbacks the batch was asked for, including ones whose
    /// scopes were all skipped. Persisting replaces exactly these.
    pub attribution_lookbacks: Vec<u32>,
    pub conditions: Vec<Condition>,
}

impl BatchOutput {
    pub fn metric(&self, metric: MetricKind, lookback_days: Option<u32>) -> Option<&RiskMetricRecord> {
        self.metrics
            .iter()
            .find(|r| r.metric_name == metric && r.lookback_days == lookback_days)
    }

    pub fn metric_value(&self, metric: MetricKind, lookback_days: Option<u32>) -> Option<Decimal> {
        self.metric(metric, lookback_days).and_then(|r| r.metric_value)
    }

    pub fn data_quality(&self) -> impl Iterator<Item = &Condition> {
        self.conditions.iter().filter(|c| c.is_data_quality())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ingestion_conditions(input: &EngineInput) -> Vec<Condition> {
    [&input.portfolio, &input.benchmark]
        .into_iter()
        .flat_map(|s| {
            [
                ("daily_return", s.sanitized_returns()),
                ("market_value", s.sanitized_market_values()),
            ]
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(move |(field, count)| Condition::Sanitized {
                field: format!("{}.{}", s.label(), field),
                detail: format!("{} non-finite input values treated as missing", count),
            })
        })
        .collect()
}

fn requested_lookbacks(input: &EngineInput) -> Vec<u32> {
    let lookbacks: BTreeSet<u32> = input
        .scopes
        .iter()
        .map(|s| s.lookback_days)
        .chain(input.sector_legs.iter().map(|l| l.lookback_days))
        .collect();
    lookbacks.into_iter().collect()
}

fn check_unique_scopes(scopes: &[ScopeInput]) -> RiskEngineResult<()> {
    let mut seen = BTreeSet::new();
    for scope in scopes {
        if !seen.insert((scope.attribution_type, scope.lookback_days)) {
            return Err(RiskEngineError::InvalidInput {
                field: "scopes".into(),
                reason: format!(
                    "{} attribution over {} days supplied more than once",
                    scope.attribution_type, scope.lookback_days
                ),
            });
        }
    }
    Ok(())
}

fn metric_records(as_of: NaiveDate, set: &MetricSet) -> Vec<RiskMetricRecord> {
    set.values
        .iter()
        .map(|(key, value)| RiskMetricRecord {
            as_of_date: as_of,
            metric_name: key.metric,
            metric_value: *value,
            metric_category: key.metric.category(),
            lookback_days: key.window.and_then(|w| w.lookback_days()),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Computes risk metrics and sector attribution for one as-of date.
///
/// [`run`](Self::run) is a pure function of the input and the configuration;
/// no I/O happens inside the engine.
#[derive(Debug, Clone)]
pub struct RiskEngine {
    config: EngineConfig,
    metric_params: MetricParams,
    attribution_params: AttributionParams,
    sanitizer: Sanitizer,
}

impl RiskEngine {
    pub fn new(config: EngineConfig) -> RiskEngineResult<Self> {
        config.validate()?;
        Ok(Self {
            metric_params: config.metric_params()?,
            attribution_params: config.attribution_params(),
            sanitizer: Sanitizer::new(config.output_scale),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Supplied and derived scopes. Scopes without any sector row are
    /// skipped with an `EmptyScope` condition.
    fn resolve_scopes(&self, input: &EngineInput) -> RiskEngineResult<(Vec<ScopeInput>, Vec<Condition>)> {
        let mut conditions = Vec::new();
        let mut scopes = Vec::with_capacity(input.scopes.len());
        for scope in &input.scopes {
            if scope.rows.is_empty() {
                conditions.push(
                    DataQualityIssue::EmptyScope {
                        scope: scope.attribution_type,
                        leg: None,
                    }
                    .into(),
                );
            } else {
                scopes.push(scope.clone());
            }
        }
        for legs in &input.sector_legs {
            let (derived, skipped) = derive_scopes(
                legs.lookback_days,
                &legs.portfolio,
                &legs.benchmark,
                &self.config.classification,
            )?;
            scopes.extend(derived);
            conditions.extend(skipped);
        }
        check_unique_scopes(&scopes)?;
        Ok((scopes, conditions))
    }

    fn metrics(&self, input: &EngineInput) -> MetricSet {
        compute_metrics(
            &input.portfolio,
            &input.benchmark,
            &input.snapshot,
            &self.config.windows,
            &self.metric_params,
        )
    }

    fn attribution(&self, as_of: NaiveDate, scopes: &[ScopeInput]) -> RiskEngineResult<Vec<AttributionOutcome>> {
        scopes
            .iter()
            .map(|scope| compute_attribution(as_of, scope, &self.attribution_params))
            .collect()
    }

    #[cfg(feature = "parallel")]
    fn compute(
        &self,
        input: &EngineInput,
        scopes: &[ScopeInput],
    ) -> (MetricSet, RiskEngineResult<Vec<AttributionOutcome>>) {
        rayon::join(|| self.metrics(input), || self.attribution(input.as_of, scopes))
    }

    #[cfg(not(feature = "parallel"))]
    fn compute(
        &self,
        input: &EngineInput,
        scopes: &[ScopeInput],
    ) -> (MetricSet, RiskEngineResult<Vec<AttributionOutcome>>) {
        (self.metrics(input), self.attribution(input.as_of, scopes))
    }

    /// Compute one batch. Returns `Err` only for structurally invalid input
    /// (such as duplicate sectors in a scope); missing or empty sector data
    /// and every other problem is reported in [`BatchOutput::conditions`].
    pub fn run(&self, input: &EngineInput) -> RiskEngineResult<BatchOutput> {
        input.validate()?;
        let (scopes, scope_conditions) = self.resolve_scopes(input)?;
        info!(
            as_of = %input.as_of,
            portfolio_observations = input.portfolio.observation_count(),
            benchmark_observations = input.benchmark.observation_count(),
            scopes = scopes.len(),
            "risk batch started"
        );

        let (metric_set, outcomes) = self.compute(input, &scopes);
        let outcomes = outcomes?;

        let mut conditions = ingestion_conditions(input);
        conditions.extend(scope_conditions);
        conditions.extend(metric_set.conditions.iter().cloned());

        let metrics = metric_records(input.as_of, &metric_set)
            .into_iter()
            .map(|r| self.sanitizer.metric_record(r))
            .collect::<Vec<_>>();

        let mut attribution = Vec::new();
        let mut summaries = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            attribution.extend(outcome.records.into_iter().map(|r| self.sanitizer.attribution_record(r)));
            summaries.push(outcome.summary);
            conditions.extend(outcome.conditions);
        }

        for condition in conditions.iter().filter(|c| c.is_data_quality()) {
            warn!(as_of = %input.as_of, %condition, "data quality");
        }

        info!(
            as_of = %input.as_of,
            metrics = metrics.len(),
            absent_metrics = metrics.iter().filter(|r| r.metric_value.is_none()).count(),
            attribution = attribution.len(),
            conditions = conditions.len(),
            "risk batch finished"
        );

        Ok(BatchOutput {
            as_of: input.as_of,
            metrics,
            attribution,
            summaries,
            attribution_lookbacks: requested_lookbacks(input),
            conditions,
        })
    }

    /// Compute one batch and hand it to `sink`.
    pub fn run_and_persist<S: RecordSink + ?Sized>(
        &self,
        input: &EngineInput,
        sink: &mut S,
    ) -> RiskEngineResult<BatchOutput> {
        let batch = self.run(input)?;
        let (metrics, attribution) = sink.persist(&batch)?;
        info!(as_of = %batch.as_of, metrics, attribution, "risk batch persisted");
        Ok(batch)
    }

    /// Load the input for `as_of` from `source` and compute the batch.
    pub fn run_from_source<S: ReturnSeriesSource + ?Sized>(
        &self,
        source: &mut S,
        as_of: NaiveDate,
    ) -> RiskEngineResult<BatchOutput> {
        let input = source.load(as_of)?;
        if input.as_of != as_of {
            return Err(RiskEngineError::Source(format!(
                "requested {} but source returned {}",
                as_of, input.as_of
            )));
        }
        self.run(&input)
    }
}

use chrono::{DateTime, Days, Duration, NaiveDate, TimeZone, Utc};
use pretty_assertions::assert_eq;
use risk_attribution_core::attribution::{ScopeInput, SectorLeg, SectorRow};
use risk_attribution_core::engine::SectorLegs;
use risk_attribution_core::metrics::{MetricKind, Position, PositionSnapshot};
use risk_attribution_core::series::{RawReturnPoint, ReturnPoint, ReturnSeries};
use risk_attribution_core::source::{ReturnSeriesSource, TtlCache};
use risk_attribution_core::store::{InMemoryStore, RecordSink};
use risk_attribution_core::{
    AttributionStatus, AttributionType, Condition, DataQualityIssue, EngineConfig, EngineInput, RiskEngine, RiskEngineError,
    RiskEngineResult, Window,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
}

fn day(offset: u64) -> NaiveDate {
    start() + Days::new(offset)
}

fn make_series(label: &str, n: usize, seed: i64) -> ReturnSeries {
    let points = (0..n)
        .map(|i| {
            let r = Decimal::new((i as i64 * seed + 3) % 23 - 11, 3);
            ReturnPoint::new(day(i as u64), r)
        })
        .collect();
    ReturnSeries::new(label, points).unwrap()
}

fn make_input(days: usize) -> EngineInput {
    let mut input = EngineInput::new(
        day(days as u64 - 1),
        make_series("portfolio", days, 7),
        make_series("benchmark", days, 5),
    );
    input.snapshot = PositionSnapshot {
        positions: vec![
            Position { security: "XIU".into(), sector: "Canada Broad".into(), market_value: dec!(50000) },
            Position { security: "ZAG".into(), sector: "CAN Bonds".into(), market_value: dec!(50000) },
        ],
        bond_durations: None,
    };
    input.sector_legs.push(SectorLegs {
        lookback_days: 1,
        portfolio: vec![
            SectorLeg::new("Canada Broad", dec!(0.5), dec!(0.004)),
            SectorLeg::new("CAN Bonds", dec!(0.5), dec!(0.001)),
        ],
        benchmark: vec![
            SectorLeg::new("Canada Broad", dec!(0.6), dec!(0.003)),
            SectorLeg::new("CAN Bonds", dec!(0.4), dec!(0.0015)),
        ],
    });
    input
}

fn make_engine() -> RiskEngine {
    RiskEngine::new(EngineConfig {
        windows: vec![Window::Trailing(30), Window::Trailing(90), Window::Expanding],
        ..EngineConfig::default()
    })
    .unwrap()
}

// ===========================================================================
// Batch output
// ===========================================================================

#[test]
fn test_rerun_is_identical() {
    let engine = make_engine();
    let input = make_input(60);
    let first = engine.run(&input).unwrap();
    let second = engine.run(&input).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_window_longer_than_history_is_absent() {
    let batch = make_engine().run(&make_input(60)).unwrap();
    assert!(batch.metric_value(MetricKind::Volatility, Some(30)).is_some());
    let vol_90 = batch.metric(MetricKind::Volatility, Some(90)).unwrap();
    assert_eq!(vol_90.metric_value, None);
    assert!(batch.conditions.contains(&Condition::InsufficientData {
        metric: MetricKind::Volatility,
        window: Some(Window::Trailing(90)),
        required: 90,
        available: 60,
    }));
}

#[test]
fn test_snapshot_records_have_no_lookback() {
    let batch = make_engine().run(&make_input(60)).unwrap();
    let hhi = batch.metric(MetricKind::SectorHhi, None).unwrap();
    assert_eq!(hhi.metric_value, Some(dec!(5000)));
    assert_eq!(batch.metric_value(MetricKind::Dv01, None), None);
    assert!(batch
        .conditions
        .iter()
        .any(|c| matches!(c, Condition::MissingInput { metric: MetricKind::Dv01, .. })));
}

#[test]
fn test_flat_benchmark_is_reported_not_fatal() {
    let mut input = make_input(40);
    input.benchmark = ReturnSeries::new(
        "benchmark",
        (0..40).map(|i| ReturnPoint::new(day(i), dec!(0.0002))).collect(),
    )
    .unwrap();
    let batch = make_engine().run(&input).unwrap();
    assert_eq!(batch.metric_value(MetricKind::Beta, Some(30)), None);
    assert_eq!(batch.metric_value(MetricKind::InformationRatio, None), None);
    assert!(batch.metric_value(MetricKind::Volatility, Some(30)).is_some());
}

#[test]
fn test_derived_scopes_are_attributed() {
    let batch = make_engine().run(&make_input(60)).unwrap();
    // TOTAL and EQUITY and FIXED_INCOME with two, one and one sectors
    assert_eq!(batch.summaries.len(), 3);
    assert_eq!(batch.attribution.len(), 4);
    assert!(batch.summaries.iter().all(|s| s.validated));
}

#[test]
fn test_unvalidated_scope_surfaces_warning() {
    let mut input = make_input(60);
    input.sector_legs.clear();
    input.scopes.push(ScopeInput::daily(
        AttributionType::Total,
        vec![
            SectorRow::new("Tech", dec!(0.7), dec!(0.5), dec!(0.01), dec!(0.012)),
            SectorRow::new("Financials", dec!(0.2), dec!(0.5), dec!(0.02), dec!(0.01)),
        ],
    ));
    let batch = make_engine().run(&input).unwrap();
    assert!(!batch.summaries[0].validated);
    assert!(batch.data_quality().any(|c| matches!(
        c,
        Condition::DataQuality(DataQualityIssue::WeightSum { .. })
    )));
    assert_eq!(batch.attribution.len(), 2);
}

#[test]
fn test_non_finite_feed_values_become_missing() {
    let raw: Vec<RawReturnPoint> = (0..40)
        .map(|i| RawReturnPoint {
            date: day(i),
            daily_return: Some(if i == 10 { f64::NAN } else { 0.001 * ((i % 5) as f64 - 2.0) }),
            market_value: None,
        })
        .collect();
    let mut input = make_input(40);
    input.portfolio = ReturnSeries::from_raw("portfolio", &raw).unwrap();
    let batch = make_engine().run(&input).unwrap();
    assert!(batch
        .conditions
        .iter()
        .any(|c| matches!(c, Condition::Sanitized { field, .. } if field == "portfolio.daily_return")));
    assert!(batch.metric_value(MetricKind::Volatility, None).is_some());
}

#[test]
fn test_non_finite_market_values_are_named() {
    let raw: Vec<RawReturnPoint> = (0..40)
        .map(|i| RawReturnPoint {
            date: day(i),
            daily_return: Some(0.001 * ((i % 5) as f64 - 2.0)),
            market_value: Some(if i == 3 { f64::INFINITY } else { 100_000.0 }),
        })
        .collect();
    let mut input = make_input(40);
    input.portfolio = ReturnSeries::from_raw("portfolio", &raw).unwrap();
    let batch = make_engine().run(&input).unwrap();
    let sanitized: Vec<_> = batch
        .conditions
        .iter()
        .filter_map(|c| match c {
            Condition::Sanitized { field, .. } => Some(field.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(sanitized, vec!["portfolio.market_value"]);
}

// ===========================================================================
// Missing sector data
// ===========================================================================

#[test]
fn test_sector_without_data_does_not_abort_batch() {
    let mut input = make_input(60);
    input.sector_legs[0].portfolio.push(SectorLeg {
        sector: "Financials".into(),
        weight: None,
        period_return: None,
    });
    let batch = make_engine().run(&input).unwrap();
    assert!(batch.metric_value(MetricKind::Volatility, Some(30)).is_some());

    let financials: Vec<_> = batch.attribution.iter().filter(|r| r.sector == "Financials").collect();
    // TOTAL and EQUITY both carry the sector
    assert_eq!(financials.len(), 2);
    assert!(financials.iter().all(|r| r.status == AttributionStatus::Unmapped));
    assert!(batch.data_quality().any(|c| matches!(
        c,
        Condition::DataQuality(DataQualityIssue::MissingSectorData { scope: AttributionType::Total, sector })
            if sector == "Financials"
    )));
    assert!(batch.summaries.iter().all(|s| s.validated));
}

#[test]
fn test_empty_sector_legs_keep_metrics() {
    let mut input = make_input(60);
    input.sector_legs[0].portfolio.clear();
    input.sector_legs[0].benchmark.clear();
    let batch = make_engine().run(&input).unwrap();
    assert!(batch.attribution.is_empty());
    assert!(batch.summaries.is_empty());
    assert_eq!(batch.attribution_lookbacks, vec![1]);
    assert!(batch.metric_value(MetricKind::Beta, Some(30)).is_some());
    assert_eq!(
        batch
            .data_quality()
            .filter(|c| matches!(c, Condition::DataQuality(DataQualityIssue::EmptyScope { .. })))
            .count(),
        3
    );
}

// ===========================================================================
// Structural failures
// ===========================================================================

#[test]
fn test_negative_position_is_rejected() {
    let mut input = make_input(10);
    input.snapshot.positions[0].market_value = dec!(-1);
    assert!(matches!(
        make_engine().run(&input),
        Err(RiskEngineError::InvalidInput { .. })
    ));
}

#[test]
fn test_duplicate_scope_sector_is_rejected() {
    let mut input = make_input(10);
    input.sector_legs[0].benchmark.push(SectorLeg::new("CAN Bonds", dec!(0.0), dec!(0.0)));
    assert!(matches!(
        make_engine().run(&input),
        Err(RiskEngineError::InvalidInput { .. })
    ));
}

#[test]
fn test_unordered_series_is_rejected() {
    let points = vec![ReturnPoint::new(day(1), dec!(0.01)), ReturnPoint::new(day(0), dec!(0.01))];
    assert!(matches!(
        ReturnSeries::new("portfolio", points),
        Err(RiskEngineError::InvalidSeries { .. })
    ));
}

// ===========================================================================
// Persistence
// ===========================================================================

#[test]
fn test_persist_twice_leaves_same_state() {
    let engine = make_engine();
    let input = make_input(60);
    let mut store = InMemoryStore::new();

    let batch = engine.run_and_persist(&input, &mut store).unwrap();
    let metric_count = store.metric_count();
    let attribution_count = store.attribution_count();
    engine.run_and_persist(&input, &mut store).unwrap();

    assert_eq!(store.metric_count(), metric_count);
    assert_eq!(store.attribution_count(), attribution_count);
    assert_eq!(metric_count, batch.metrics.len());
    assert_eq!(store.latest_date(), Some(input.as_of));
}

#[test]
fn test_next_day_appends_and_backfill_fails() {
    let engine = make_engine();
    let mut store = InMemoryStore::new();

    let today = make_input(60);
    let tomorrow = make_input(61);
    engine.run_and_persist(&today, &mut store).unwrap();
    engine.run_and_persist(&tomorrow, &mut store).unwrap();
    assert_eq!(store.metrics_on(today.as_of).len(), store.metrics_on(tomorrow.as_of).len());

    let err = engine.run_and_persist(&today, &mut store).unwrap_err();
    assert!(matches!(err, RiskEngineError::Persistence(_)));
}

#[test]
fn test_rerun_without_sector_data_clears_attribution() {
    let engine = make_engine();
    let mut store = InMemoryStore::new();
    let input = make_input(60);
    engine.run_and_persist(&input, &mut store).unwrap();
    assert_eq!(store.attribution_on(input.as_of).len(), 4);

    let mut rerun = input.clone();
    rerun.sector_legs[0].portfolio.clear();
    rerun.sector_legs[0].benchmark.clear();
    engine.run_and_persist(&rerun, &mut store).unwrap();
    assert!(store.attribution_on(input.as_of).is_empty());
    assert!(!store.metrics_on(input.as_of).is_empty());
}

#[test]
fn test_sink_rejects_foreign_dates() {
    let batch = make_engine().run(&make_input(60)).unwrap();
    let mut store = InMemoryStore::new();
    let wrong_day = batch.as_of + Days::new(1);
    assert!(store.upsert_metrics(wrong_day, &batch.metrics).is_err());
    assert_eq!(store.metric_count(), 0);
}

// ===========================================================================
// Sources
// ===========================================================================

struct CachedFeed {
    benchmark: TtlCache<ReturnSeries>,
    now: DateTime<Utc>,
    loads: usize,
}

impl ReturnSeriesSource for CachedFeed {
    fn load(&mut self, as_of: NaiveDate) -> RiskEngineResult<EngineInput> {
        let days = (as_of - start()).num_days() as usize + 1;
        let loads = &mut self.loads;
        let benchmark = self
            .benchmark
            .get_or_refresh(self.now, || -> RiskEngineResult<_> {
                *loads += 1;
                Ok(make_series("benchmark", days, 5))
            })?
            .clone();
        let mut input = make_input(days);
        input.benchmark = benchmark;
        Ok(input)
    }
}

#[test]
fn test_run_from_source_uses_cached_benchmark() {
    let mut feed = CachedFeed {
        benchmark: TtlCache::new(Duration::minutes(30)),
        now: Utc.with_ymd_and_hms(2024, 6, 29, 18, 0, 0).unwrap(),
        loads: 0,
    };
    let engine = make_engine();
    let first = engine.run_from_source(&mut feed, day(59)).unwrap();
    let second = engine.run_from_source(&mut feed, day(59)).unwrap();
    assert_eq!(first, second);
    assert_eq!(feed.loads, 1);

    feed.now += Duration::hours(1);
    engine.run_from_source(&mut feed, day(59)).unwrap();
    assert_eq!(feed.loads, 2);
}

struct WrongDateFeed;

impl ReturnSeriesSource for WrongDateFeed {
    fn load(&mut self, _as_of: NaiveDate) -> RiskEngineResult<EngineInput> {
        Ok(make_input(30))
    }
}

#[test]
fn test_source_returning_other_date_is_rejected() {
    let err = make_engine().run_from_source(&mut WrongDateFeed, day(40)).unwrap_err();
    assert!(matches!(err, RiskEngineError::Source(_)));
}

use chrono::{Days, NaiveDate};
use risk_attribution_core::metrics::{
    compute_metrics, BondDuration, MetricKind, MetricParams, Position, PositionSnapshot,
};
use risk_attribution_core::series::{ReturnPoint, ReturnSeries};
use risk_attribution_core::{Condition, Window};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
}

fn make_series(label: &str, returns: &[Decimal]) -> ReturnSeries {
    let points = returns
        .iter()
        .enumerate()
        .map(|(i, r)| ReturnPoint::new(start() + Days::new(i as u64), *r))
        .collect();
    ReturnSeries::new(label, points).unwrap()
}

/// Deterministic, non-constant daily returns.
fn synthetic_returns(n: usize, seed: i64) -> Vec<Decimal> {
    (0..n as i64)
        .map(|i| Decimal::new((i * seed + 3) % 23 - 11, 3))
        .collect()
}

fn scenario() -> (ReturnSeries, ReturnSeries) {
    (
        make_series("portfolio", &[dec!(0.01), dec!(-0.02), dec!(0.015), dec!(0.005), dec!(-0.01)]),
        make_series("benchmark", &[dec!(0.008), dec!(-0.015), dec!(0.01), dec!(0.004), dec!(-0.008)]),
    )
}

// ===========================================================================
// Five-day scenario
// ===========================================================================

#[test]
fn test_scenario_relative_metrics_are_finite() {
    let (p, b) = scenario();
    let set = compute_metrics(&p, &b, &PositionSnapshot::default(), &[Window::Expanding], &MetricParams::default());
    for metric in [
        MetricKind::Beta,
        MetricKind::TrackingError,
        MetricKind::ActiveReturn,
        MetricKind::SharpeRatio,
        MetricKind::InformationRatio,
        MetricKind::Volatility,
    ] {
        assert!(set.get(metric, Window::Expanding).is_some(), "{} absent", metric);
    }
}

#[test]
fn test_scenario_beta_matches_covariance_over_variance() {
    let (p, b) = scenario();
    let set = compute_metrics(&p, &b, &PositionSnapshot::default(), &[Window::Expanding], &MetricParams::default());

    let pr: Vec<Decimal> = p.observations();
    let br: Vec<Decimal> = b.observations();
    let n = Decimal::from(pr.len() as u64);
    let mp: Decimal = pr.iter().sum::<Decimal>() / n;
    let mb: Decimal = br.iter().sum::<Decimal>() / n;
    let cov: Decimal = pr.iter().zip(&br).map(|(x, y)| (x - mp) * (y - mb)).sum();
    let var: Decimal = br.iter().map(|y| (y - mb) * (y - mb)).sum();
    let expected = cov / var;

    let beta = set.get(MetricKind::Beta, Window::Expanding).unwrap();
    assert!((beta - expected).abs() < dec!(0.0000000001), "beta {} vs {}", beta, expected);
    // 0.00063 / 0.0004688
    assert!((beta - dec!(1.3438566553)).abs() < dec!(0.0000000001));
}

#[test]
fn test_scenario_tail_metrics_ordering() {
    let (p, b) = scenario();
    let set = compute_metrics(&p, &b, &PositionSnapshot::default(), &[Window::Expanding], &MetricParams::default());
    let var95 = set.get(MetricKind::Var95, Window::Expanding).unwrap();
    let var99 = set.get(MetricKind::Var99, Window::Expanding).unwrap();
    let es95 = set.get(MetricKind::ExpectedShortfall95, Window::Expanding).unwrap();
    let es99 = set.get(MetricKind::ExpectedShortfall99, Window::Expanding).unwrap();
    assert!(var99.abs() >= var95.abs());
    assert!(es95.abs() >= var95.abs());
    assert!(es99.abs() >= var99.abs());
    // 5th percentile of the sorted sample by linear interpolation
    assert_eq!(var95, dec!(-0.018));
    assert_eq!(es95, dec!(-0.02));
    assert!(set.get(MetricKind::MaxDrawdown, Window::Expanding).unwrap() <= Decimal::ZERO);
}

// ===========================================================================
// Minimum-sample policy
// ===========================================================================

#[test]
fn test_29_paired_observations_is_insufficient_for_30_day_window() {
    let p = make_series("portfolio", &synthetic_returns(30, 7));
    // Benchmark is missing the first date, leaving 29 common dates
    let b_points: Vec<_> = synthetic_returns(30, 5)
        .into_iter()
        .enumerate()
        .skip(1)
        .map(|(i, r)| ReturnPoint::new(start() + Days::new(i as u64), r))
        .collect();
    let b = ReturnSeries::new("benchmark", b_points).unwrap();

    let window = Window::Trailing(30);
    let set = compute_metrics(&p, &b, &PositionSnapshot::default(), &[window], &MetricParams::default());

    assert_eq!(set.get(MetricKind::Beta, window), None);
    assert_eq!(set.get(MetricKind::TrackingError, window), None);
    assert!(set.conditions.contains(&Condition::InsufficientData {
        metric: MetricKind::Beta,
        window: Some(window),
        required: 30,
        available: 29,
    }));
    // The portfolio alone still has 30 observations
    assert!(set.get(MetricKind::Volatility, window).is_some());
}

#[test]
fn test_30_paired_observations_yield_values() {
    let p = make_series("portfolio", &synthetic_returns(30, 7));
    let b = make_series("benchmark", &synthetic_returns(30, 5));
    let window = Window::Trailing(30);
    let set = compute_metrics(&p, &b, &PositionSnapshot::default(), &[window], &MetricParams::default());
    assert!(set.get(MetricKind::Beta, window).is_some());
    assert!(set.get(MetricKind::TrackingError, window).is_some());
    assert!(set
        .conditions
        .iter()
        .all(|c| !matches!(c, Condition::InsufficientData { window: Some(_), .. })));
}

#[test]
fn test_missing_days_are_skipped_not_zeroed() {
    let mut points: Vec<_> = synthetic_returns(10, 7)
        .into_iter()
        .enumerate()
        .map(|(i, r)| ReturnPoint::new(start() + Days::new(i as u64), r))
        .collect();
    points[4] = ReturnPoint::missing(points[4].date);
    let p = ReturnSeries::new("portfolio", points).unwrap();
    let b = make_series("benchmark", &synthetic_returns(10, 5));

    let window = Window::Trailing(10);
    let set = compute_metrics(&p, &b, &PositionSnapshot::default(), &[window], &MetricParams::default());
    // Nine observations in a ten-day window
    assert_eq!(set.get(MetricKind::Volatility, window), None);

    let set = compute_metrics(&p, &b, &PositionSnapshot::default(), &[Window::Trailing(9)], &MetricParams::default());
    assert!(set.get(MetricKind::Volatility, Window::Trailing(9)).is_some());
    assert!(set.get(MetricKind::Beta, Window::Trailing(9)).is_some());
}

// ===========================================================================
// Degenerate inputs
// ===========================================================================

#[test]
fn test_flat_benchmark_makes_beta_and_ir_absent() {
    let p = make_series("portfolio", &synthetic_returns(20, 7));
    let b = make_series("benchmark", &[dec!(0.0003); 20]);
    let set = compute_metrics(&p, &b, &PositionSnapshot::default(), &[Window::Expanding], &MetricParams::default());
    assert_eq!(set.get(MetricKind::Beta, Window::Expanding), None);
    assert_eq!(set.get(MetricKind::InformationRatio, Window::Expanding), None);
    assert!(set.conditions.iter().any(|c| matches!(
        c,
        Condition::DegenerateNumeric { metric: MetricKind::Beta, .. }
    )));
    // Tracking error is still defined
    assert!(set.get(MetricKind::TrackingError, Window::Expanding).unwrap() > Decimal::ZERO);
}

#[test]
fn test_flat_portfolio_makes_sharpe_absent() {
    let p = make_series("portfolio", &[dec!(0.001); 10]);
    let b = make_series("benchmark", &synthetic_returns(10, 5));
    let set = compute_metrics(&p, &b, &PositionSnapshot::default(), &[Window::Expanding], &MetricParams::default());
    assert_eq!(set.get(MetricKind::Volatility, Window::Expanding), Some(Decimal::ZERO));
    assert_eq!(set.get(MetricKind::SharpeRatio, Window::Expanding), None);
    assert_eq!(set.get(MetricKind::MaxDrawdown, Window::Expanding), Some(Decimal::ZERO));
}

// ===========================================================================
// Snapshot metrics
// ===========================================================================

#[test]
fn test_snapshot_metrics() {
    let (p, b) = scenario();
    let snapshot = PositionSnapshot {
        positions: vec![
            Position { security: "XIU".into(), sector: "Canada Broad".into(), market_value: dec!(40000) },
            Position { security: "VFV".into(), sector: "US Broad".into(), market_value: dec!(30000) },
            Position { security: "ZAG".into(), sector: "CAN Bonds".into(), market_value: dec!(30000) },
        ],
        bond_durations: Some(vec![BondDuration {
            instrument: "ZAG".into(),
            market_value: dec!(30000),
            modified_duration: dec!(7.2),
        }]),
    };
    let set = compute_metrics(&p, &b, &snapshot, &[Window::Expanding], &MetricParams::default());
    // 0.16 + 0.09 + 0.09
    assert_eq!(set.get_snapshot(MetricKind::SecurityHhi), Some(dec!(3400)));
    assert_eq!(set.get_snapshot(MetricKind::SectorHhi), Some(dec!(3400)));
    // 30000 * 7.2 * 0.0001
    assert_eq!(set.get_snapshot(MetricKind::Dv01), Some(dec!(21.6)));
}

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::RiskEngineError;
use crate::sanitize::decimal_from_f64;
use crate::types::{Money, Rate};
use crate::RiskEngineResult;

/// One day of a return series. A `None` return is a missing observation,
/// never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnPoint {
    pub date: NaiveDate,
    pub daily_return: Option<Rate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_value: Option<Money>,
}

impl ReturnPoint {
    pub fn new(date: NaiveDate, daily_return: Rate) -> Self {
        Self {
            date,
            daily_return: Some(daily_return),
            market_value: None,
        }
    }

    pub fn missing(date: NaiveDate) -> Self {
        Self {
            date,
            daily_return: None,
            market_value: None,
        }
    }
}

/// A return point as delivered by a floating-point market data feed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawReturnPoint {
    pub date: NaiveDate,
    pub daily_return: Option<f64>,
    pub market_value: Option<f64>,
}

/// Date-ordered return series with unique dates, immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SeriesRepr")]
pub struct ReturnSeries {
    label: String,
    points: Vec<ReturnPoint>,
    sanitized_returns: usize,
    sanitized_market_values: usize,
}

#[derive(Deserialize)]
struct SeriesRepr {
    label: String,
    points: Vec<ReturnPoint>,
    #[serde(default)]
    sanitized_returns: usize,
    #[serde(default)]
    sanitized_market_values: usize,
}

impl TryFrom<SeriesRepr> for ReturnSeries {
    type Error = RiskEngineError;

    fn try_from(repr: SeriesRepr) -> Result<Self, Self::Error> {
        let mut series = Self::new(repr.label, repr.points)?;
        series.sanitized_returns = repr.sanitized_returns;
        series.sanitized_market_values = repr.sanitized_market_values;
        Ok(series)
    }
}

fn convert_counted(value: Option<f64>, sanitized: &mut usize) -> Option<Decimal> {
    let v = value?;
    let d = decimal_from_f64(v);
    if d.is_none() {
        *sanitized += 1;
    }
    d
}

impl ReturnSeries {
    /// Build a series, rejecting out-of-order or duplicate dates and
    /// negative market values.
    pub fn new(label: impl Into<String>, points: Vec<ReturnPoint>) -> RiskEngineResult<Self> {
        let label = label.into();

        for pair in points.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(RiskEngineError::InvalidSeries {
                    series: label,
                    reason: format!(
                        "dates must be strictly increasing ({} follows {})",
                        pair[1].date, pair[0].date
                    ),
                });
            }
        }

        if let Some(p) = points
            .iter()
            .find(|p| p.market_value.is_some_and(|mv| mv.is_sign_negative() && !mv.is_zero()))
        {
            return Err(RiskEngineError::InvalidSeries {
                series: label,
                reason: format!("negative market value on {}", p.date),
            });
        }

        Ok(Self {
            label,
            points,
            sanitized_returns: 0,
            sanitized_market_values: 0,
        })
    }

    /// Build a series from floating-point input. Non-finite values become
    /// missing and are counted per field.
    pub fn from_raw(label: impl Into<String>, raw: &[RawReturnPoint]) -> RiskEngineResult<Self> {
        let mut sanitized_returns = 0;
        let mut sanitized_market_values = 0;

        let points: Vec<ReturnPoint> = raw
            .iter()
            .map(|r| ReturnPoint {
                date: r.date,
                daily_return: convert_counted(r.daily_return, &mut sanitized_returns),
                market_value: convert_counted(r.market_value, &mut sanitized_market_values),
            })
            .collect();

        let mut series = Self::new(label, points)?;
        series.sanitized_returns = sanitized_returns;
        series.sanitized_market_values = sanitized_market_values;
        Ok(series)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn points(&self) -> &[ReturnPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of raw daily returns that were not finite.
    pub fn sanitized_returns(&self) -> usize {
        self.sanitized_returns
    }

    /// Number of raw market values that were not finite.
    pub fn sanitized_market_values(&self) -> usize {
        self.sanitized_market_values
    }

    pub fn sanitized_values(&self) -> usize {
        self.sanitized_returns + self.sanitized_market_values
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    /// Non-missing returns in date order.
    pub fn observations(&self) -> Vec<Rate> {
        self.points.iter().filter_map(|p| p.daily_return).collect()
    }

    pub fn observation_count(&self) -> usize {
        self.points.iter().filter(|p| p.daily_return.is_some()).count()
    }
}

/// Returns on dates where both series have an observation, in date order.
pub fn align(portfolio: &ReturnSeries, benchmark: &ReturnSeries) -> Vec<(Rate, Rate)> {
    let (p, b) = (portfolio.points(), benchmark.points());
    let mut paired = Vec::with_capacity(p.len().min(b.len()));
    let (mut i, mut j) = (0, 0);

    while i < p.len() && j < b.len() {
        match p[i].date.cmp(&b[j].date) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                if let (Some(rp), Some(rb)) = (p[i].daily_return, b[j].daily_return) {
                    paired.push((rp, rb));
                }
                i += 1;
                j += 1;
            }
        }
    }
    paired
}

//! Metric queries over a rolling historical window
//!
//! This module defines the metric-source capability the engine consumes,
//! the calendar window every query covers, and the reduction of a
//! time-bucketed series to a single scalar.

mod reducer;

pub use reducer::{MetricWindowReducer, ReducerConfig};

use crate::error::MetricQueryError;
use crate::models::{Aggregation, MetricSeries, MetricValue};
use chrono::{Days, NaiveDate, Utc};

pub use async_trait::async_trait;

/// Default collection window in days
pub const DEFAULT_WINDOW_DAYS: u32 = 90;

/// Default bucket size (ISO-8601 duration)
pub const DEFAULT_GRANULARITY: &str = "PT1H";

/// A metric request as sent to the metric source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricQuery {
    pub resource_id: String,
    /// Comma-joined metric names
    pub metric_names: String,
    /// `<startDate>/<endDate>`
    pub timespan: String,
    /// ISO-8601 duration, e.g. `PT1H`
    pub interval: String,
    pub aggregation: Aggregation,
}

/// Capability for querying a time-series metric source
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Return one series per requested metric name, in request order
    async fn query_metrics(&self, query: &MetricQuery)
        -> Result<Vec<MetricSeries>, MetricQueryError>;
}

/// Statistic taken per bucket, combined across the window with `max`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReductionKind {
    MaxOfAverage,
    MaxOfMaximum,
}

impl ReductionKind {
    pub fn aggregation(&self) -> Aggregation {
        match self {
            ReductionKind::MaxOfAverage => Aggregation::Average,
            ReductionKind::MaxOfMaximum => Aggregation::Maximum,
        }
    }

    fn pick(&self, value: &MetricValue) -> Option<f64> {
        match self {
            ReductionKind::MaxOfAverage => value.average,
            ReductionKind::MaxOfMaximum => value.maximum,
        }
    }
}

/// Calendar window `[start, end)` covered by a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl MetricWindow {
    /// Window of `window_days` days before `today`, through the end of `today`.
    /// Clamped to the representable date range.
    pub fn ending_on(today: NaiveDate, window_days: u32) -> Self {
        Self {
            start: today
                .checked_sub_days(Days::new(u64::from(window_days)))
                .unwrap_or(NaiveDate::MIN),
            end: today.checked_add_days(Days::new(1)).unwrap_or(today),
        }
    }

    /// Window ending today (UTC), recomputed on every call
    pub fn current(window_days: u32) -> Self {
        Self::ending_on(Utc::now().date_naive(), window_days)
    }

    pub fn timespan(&self) -> String {
        format!("{}/{}", self.start, self.end)
    }
}

/// Reduce a series to its largest bucket statistic.
///
/// Buckets without the statistic are skipped; an empty result is `0.0`,
/// which is indistinguishable from a genuine zero reading.
pub fn reduce_series(series: &MetricSeries, kind: ReductionKind) -> f64 {
    series
        .timeseries
        .iter()
        .flat_map(|segment| segment.data.iter())
        .filter_map(|value| kind.pick(value))
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))))
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimeSeriesElement;

    fn value(average: Option<f64>, maximum: Option<f64>) -> MetricValue {
        MetricValue {
            average,
            maximum,
            ..Default::default()
        }
    }

    fn series(segments: Vec<Vec<MetricValue>>) -> MetricSeries {
        MetricSeries {
            name: "usedmemory".to_string(),
            timeseries: segments
                .into_iter()
                .map(|data| TimeSeriesElement { data })
                .collect(),
        }
    }

    #[test]
    fn test_window_bounds() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let window = MetricWindow::ending_on(today, 90);
        assert_eq!(window.start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(window.end, NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
        assert_eq!(window.timespan(), "2024-01-01/2024-04-01");
    }

    #[test]
    fn test_window_crosses_year() {
        let today = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        let window = MetricWindow::ending_on(today, 7);
        assert_eq!(window.timespan(), "2023-12-24/2024-01-01");
    }

    #[test]
    fn test_oversized_window_clamped() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let window = MetricWindow::ending_on(today, u32::MAX);
        assert_eq!(window.start, NaiveDate::MIN);
        assert_eq!(window.end, NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());

        let current = MetricWindow::current(u32::MAX);
        assert_eq!(current.start, NaiveDate::MIN);
    }

    #[test]
    fn test_reduce_max_of_average_across_segments() {
        let s = series(vec![
            vec![value(Some(10.0), Some(50.0)), value(Some(30.0), None)],
            vec![value(None, Some(90.0)), value(Some(25.0), Some(5.0))],
        ]);
        assert_eq!(reduce_series(&s, ReductionKind::MaxOfAverage), 30.0);
        assert_eq!(reduce_series(&s, ReductionKind::MaxOfMaximum), 90.0);
    }

    #[test]
    fn test_reduce_missing_statistic_is_zero() {
        let s = series(vec![vec![value(Some(12.0), None), value(Some(3.0), None)]]);
        assert_eq!(reduce_series(&s, ReductionKind::MaxOfMaximum), 0.0);
    }

    #[test]
    fn test_reduce_empty_series_is_zero() {
        assert_eq!(reduce_series(&series(vec![]), ReductionKind::MaxOfAverage), 0.0);
        assert_eq!(
            reduce_series(&series(vec![vec![]]), ReductionKind::MaxOfAverage),
            0.0
        );
    }

    #[test]
    fn test_reduce_negative_values_kept() {
        let s = series(vec![vec![value(Some(-4.0), None), value(Some(-2.0), None)]]);
        assert_eq!(reduce_series(&s, ReductionKind::MaxOfAverage), -2.0);
    }

    #[test]
    fn test_reduction_aggregation() {
        assert_eq!(ReductionKind::MaxOfAverage.aggregation(), Aggregation::Average);
        assert_eq!(ReductionKind::MaxOfMaximum.aggregation(), Aggregation::Maximum);
    }
}

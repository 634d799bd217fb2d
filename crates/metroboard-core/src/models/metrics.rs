//! Derived metrics models
//!
//! Everything here is derived, immutable, and reconstructable from
//! (dataset, station definition, month): these are cache values, never a
//! source of truth.

use crate::models::Month;
use serde::Serialize;
use std::sync::Arc;

/// Aggregated statistics for one (station, month).
///
/// Null policy, preserved deliberately: `new_signup_pct` is `0` on an empty
/// denominator, while the rating fields are `None` when the filtered rating
/// sample is empty. The two are different questions ("what share" vs "we have
/// no sample") and callers render them differently.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationMetricsSnapshot {
    /// Rides starting at this station.
    pub starts: usize,
    /// Rides ending at this station.
    pub ends: usize,
    /// Rides that both started and ended here.
    pub round_trips: usize,
    /// Distinct riders in the start subset.
    pub unique_riders: usize,
    /// Riders whose signup month equals the dataset month.
    pub new_signups: usize,
    pub new_signup_pct: f64,
    /// Riders with exactly one ride this month.
    pub one_time: usize,
    /// Riders inside the light-use band.
    pub light: usize,
    /// Riders at or above the heavy-use floor.
    pub heavy: usize,
    /// Mean duration over the start subset, ignoring missing cells.
    pub avg_duration: Option<f64>,
    /// Mean of in-range ratings; `None` when no valid sample exists.
    pub avg_rating: Option<f64>,
    /// Share of in-range ratings at or above the positive floor.
    pub positive_rating_pct: Option<f64>,
    /// Size of the in-range rating sample.
    pub total_ratings: usize,
}

/// Ride count for one hour of the day (0-23).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HourlyPoint {
    pub hour: u32,
    pub rides: usize,
}

/// Ride count for one (weekday, hour) cell of the activity heatmap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayHourPoint {
    /// English day name, Monday through Sunday.
    pub day: String,
    pub hour: u32,
    pub rides: usize,
}

/// When-do-people-ride profile for one (station, month): start counts by
/// hour of day and by (weekday, hour).
///
/// Sparse: only nonzero cells appear. `hourly` is sorted by hour, `day_hour`
/// by (Monday-first weekday, hour). Rows without a parseable start timestamp
/// are excluded, so the point sums can be below the station's start count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityProfile {
    pub hourly: Vec<HourlyPoint>,
    pub day_hour: Vec<DayHourPoint>,
    /// Start-subset rows that carried a timestamp.
    pub timed_rides: usize,
}

/// One point of a station's cross-month ride series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    pub month: Month,
    pub starts: usize,
}

/// Chronological sequence of a station's monthly start counts.
///
/// A month appears iff its dataset existed and loaded at computation time.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TrendSeries {
    pub points: Vec<TrendPoint>,
}

impl TrendSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// A single point has no trend; callers should not chart series of
    /// length <= 1.
    pub fn is_chartable(&self) -> bool {
        self.points.len() > 1
    }
}

/// Percent change between a current and a previous value.
///
/// `None` when there is nothing to compare against (missing or zero previous).
pub fn trend_delta(current: f64, previous: Option<f64>) -> Option<f64> {
    match previous {
        Some(prev) if prev != 0.0 => Some((current - prev) / prev * 100.0),
        _ => None,
    }
}

/// Metrics answer for one station/month query, with the optional
/// previous-month snapshot for comparison rendering.
///
/// `current: None` means the month's dataset had no rides for the station,
/// a normal empty result distinct from any error.
#[derive(Debug, Clone)]
pub struct MetricsReport {
    pub station: String,
    pub month: Month,
    pub current: Option<Arc<StationMetricsSnapshot>>,
    pub previous: Option<Arc<StationMetricsSnapshot>>,
}

impl MetricsReport {
    /// Percent change of a selected metric against the previous month.
    pub fn delta<F>(&self, select: F) -> Option<f64>
    where
        F: Fn(&StationMetricsSnapshot) -> f64,
    {
        let current = select(self.current.as_deref()?);
        let previous = self.previous.as_deref().map(&select);
        trend_delta(current, previous)
    }
}

/// One row of the all-stations comparison table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub station: String,
    pub total_starts: usize,
    pub total_riders: usize,
    pub avg_duration: Option<f64>,
    pub avg_rating: Option<f64>,
    pub heavy_users: usize,
}

/// Comparison of all stations with data for one month, in registry order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonTable {
    pub month: Month,
    pub rows: Vec<ComparisonRow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trend_delta_basic() {
        assert_eq!(trend_delta(150.0, Some(100.0)), Some(50.0));
        assert_eq!(trend_delta(50.0, Some(100.0)), Some(-50.0));
    }

    #[test]
    fn test_trend_delta_missing_or_zero_previous() {
        assert_eq!(trend_delta(10.0, None), None);
        assert_eq!(trend_delta(10.0, Some(0.0)), None);
    }

    #[test]
    fn test_series_chartability() {
        let mut series = TrendSeries::default();
        assert!(!series.is_chartable());

        series.points.push(TrendPoint {
            month: "2025-01".parse().unwrap(),
            starts: 5,
        });
        assert!(!series.is_chartable());

        series.points.push(TrendPoint {
            month: "2025-02".parse().unwrap(),
            starts: 7,
        });
        assert!(series.is_chartable());
    }

    #[test]
    fn test_report_delta_requires_current() {
        let report = MetricsReport {
            station: "X".to_string(),
            month: "2025-01".parse().unwrap(),
            current: None,
            previous: None,
        };
        assert_eq!(report.delta(|s| s.starts as f64), None);
    }
}

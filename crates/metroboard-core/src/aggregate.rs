//! Per-station monthly metrics aggregation
//!
//! Turns one matched dataset into a [`StationMetricsSnapshot`]. Pure and
//! deterministic: repeated calls over unchanged inputs return identical
//! snapshots, which is what makes the metrics keyspace safe to memoize.

use crate::matcher::match_station;
use crate::models::{
    ActivityProfile, DayHourPoint, HourlyPoint, Month, MonthlyDataset, StationMetricsSnapshot,
};
use chrono::{Datelike, Timelike};
use std::collections::HashMap;

/// Valid rating bounds; numeric values outside this range are corrupt and
/// excluded from the rating sample.
pub const MIN_RATING: f64 = 1.0;
pub const MAX_RATING: f64 = 5.0;
/// Ratings at or above this count as positive.
pub const POSITIVE_RATING_MIN: f64 = 4.0;

/// Ride-count bands for the loyalty segmentation.
///
/// Configuration, not per-call literals: one-time is exactly one ride, light
/// is `[light_min, light_max]`, heavy is `>= heavy_min`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentThresholds {
    pub light_min: usize,
    pub light_max: usize,
    pub heavy_min: usize,
}

impl Default for SegmentThresholds {
    fn default() -> Self {
        Self {
            light_min: 2,
            light_max: 5,
            heavy_min: 6,
        }
    }
}

/// Compute the full statistics snapshot for one station in one month.
///
/// Returns `None` when no rides start at the station, a normal empty
/// outcome rather than a failure.
pub fn aggregate(
    dataset: &MonthlyDataset,
    keyword: &str,
    month: Month,
    thresholds: SegmentThresholds,
) -> Option<StationMetricsSnapshot> {
    let matched = match_station(dataset, keyword);
    if matched.starts.is_empty() {
        return None;
    }

    let start_rows = || matched.starts.iter().map(|&i| &dataset.rows[i]);

    // Distinct riders and rides per rider over the start subset.
    let mut rides_per_user: HashMap<&str, usize> = HashMap::new();
    for row in start_rows() {
        *rides_per_user.entry(row.user_id.as_str()).or_default() += 1;
    }
    let unique_riders = rides_per_user.len();

    // New signups: signup month equals the dataset month exactly.
    let new_signups = start_rows()
        .filter(|row| {
            row.signup_date
                .map(|d| {
                    Month::new(chrono::Datelike::year(&d), chrono::Datelike::month(&d))
                        .map(|m| m == month)
                        .unwrap_or(false)
                })
                .unwrap_or(false)
        })
        .map(|row| row.user_id.as_str())
        .collect::<std::collections::HashSet<_>>()
        .len();

    let one_time = rides_per_user.values().filter(|&&n| n == 1).count();
    let light = rides_per_user
        .values()
        .filter(|&&n| n >= thresholds.light_min && n <= thresholds.light_max)
        .count();
    let heavy = rides_per_user
        .values()
        .filter(|&&n| n >= thresholds.heavy_min)
        .count();

    let durations: Vec<f64> = start_rows().filter_map(|row| row.duration_min).collect();
    let avg_duration = mean(&durations);

    // Rating sample restricted to the valid range; out-of-range numerics are
    // corrupt, not clamped.
    let ratings: Vec<f64> = start_rows()
        .filter_map(|row| row.rating)
        .filter(|&r| (MIN_RATING..=MAX_RATING).contains(&r))
        .collect();
    let total_ratings = ratings.len();
    let avg_rating = mean(&ratings);
    let positive_rating_pct = if ratings.is_empty() {
        None
    } else {
        let positive = ratings.iter().filter(|&&r| r >= POSITIVE_RATING_MIN).count();
        Some(positive as f64 / total_ratings as f64 * 100.0)
    };

    // Zero-denominator policy differs on purpose: counts fall back to 0,
    // rating statistics stay None.
    let new_signup_pct = if unique_riders == 0 {
        0.0
    } else {
        new_signups as f64 / unique_riders as f64 * 100.0
    };

    Some(StationMetricsSnapshot {
        starts: matched.starts.len(),
        ends: matched.ends.len(),
        round_trips: matched.round_trips,
        unique_riders,
        new_signups,
        new_signup_pct,
        one_time,
        light,
        heavy,
        avg_duration,
        avg_rating,
        positive_rating_pct,
        total_ratings,
    })
}

const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Compute the hour-of-day and weekday-by-hour ride distributions for one
/// station in one dataset.
///
/// Counts the start subset only; rows without a parseable start timestamp
/// are skipped. Returns `None` when no rides start at the station, same as
/// [`aggregate`].
pub fn activity_profile(dataset: &MonthlyDataset, keyword: &str) -> Option<ActivityProfile> {
    let matched = match_station(dataset, keyword);
    if matched.starts.is_empty() {
        return None;
    }

    let mut by_hour = [0usize; 24];
    let mut by_day_hour = [[0usize; 24]; 7];
    let mut timed_rides = 0;

    for &i in &matched.starts {
        let Some(started) = dataset.rows[i].started_at else {
            continue;
        };
        let hour = started.hour() as usize;
        let day = started.weekday().num_days_from_monday() as usize;
        by_hour[hour] += 1;
        by_day_hour[day][hour] += 1;
        timed_rides += 1;
    }

    let hourly = by_hour
        .iter()
        .enumerate()
        .filter(|(_, &rides)| rides > 0)
        .map(|(hour, &rides)| HourlyPoint {
            hour: hour as u32,
            rides,
        })
        .collect();

    let mut day_hour = Vec::new();
    for (day, hours) in by_day_hour.iter().enumerate() {
        for (hour, &rides) in hours.iter().enumerate() {
            if rides > 0 {
                day_hour.push(DayHourPoint {
                    day: DAY_NAMES[day].to_string(),
                    hour: hour as u32,
                    rides,
                });
            }
        }
    }

    Some(ActivityProfile {
        hourly,
        day_hour,
        timed_rides,
    })
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

//! Data models for metroboard-core

pub mod metrics;
pub mod month;
pub mod ride;

pub use metrics::{
    trend_delta, ActivityProfile, ComparisonRow, ComparisonTable, DayHourPoint, HourlyPoint,
    MetricsReport, StationMetricsSnapshot, TrendPoint, TrendSeries,
};
pub use month::Month;
pub use ride::{Fingerprint, MonthlyDataset, RideEvent};

//! Ride event and monthly dataset models
//!
//! A `RideEvent` is a fixed-shape record: every coercible-but-possibly-missing
//! cell is an explicit `Option`, never a stringly-typed bag. Rows are immutable
//! once loaded and owned by the `MonthlyDataset` that produced them.

use crate::models::Month;
use std::time::SystemTime;

/// One ride record from a monthly table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RideEvent {
    /// Free-text label of the station where the ride started.
    pub start: Option<String>,
    /// Free-text label of the station where the ride ended.
    pub end: Option<String>,
    /// Rider identifier. Empty when the cell was blank.
    pub user_id: String,
    /// Date the rider signed up.
    pub signup_date: Option<chrono::NaiveDate>,
    /// Timestamp the ride started.
    pub started_at: Option<chrono::NaiveDateTime>,
    /// Ride duration in minutes.
    pub duration_min: Option<f64>,
    /// Rating as entered; range filtering happens at aggregation time.
    pub rating: Option<f64>,
}

/// Identity of a dataset's on-disk source, used in cache keys.
///
/// Two loads of the same path with equal fingerprints are guaranteed to
/// produce equal datasets; a differing fingerprint forces a re-parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Fingerprint {
    pub mtime_secs: u64,
    pub mtime_nanos: u32,
    pub len: u64,
}

impl Fingerprint {
    pub fn new(mtime: SystemTime, len: u64) -> Self {
        let since_epoch = mtime
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            mtime_secs: since_epoch.as_secs(),
            mtime_nanos: since_epoch.subsec_nanos(),
            len,
        }
    }
}

/// All ride events for one calendar month, plus source identity.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyDataset {
    pub month: Month,
    /// Normalized column headers (NBSP stripped, trimmed), in file order.
    pub columns: Vec<String>,
    pub rows: Vec<RideEvent>,
    pub fingerprint: Fingerprint,
}

impl MonthlyDataset {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

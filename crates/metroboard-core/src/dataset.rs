//! Monthly dataset store
//!
//! Loads raw ride tables from `<data_dir>/<year>/<YYYY-MM>.<ext>` and
//! normalizes them into typed [`MonthlyDataset`]s. CSV is the canonical
//! format, JSON (an array of row objects) the fallback. Unparseable cells
//! degrade to `None`; only I/O failures and structurally broken files fail
//! the load. File absence is "no data", not an error.

use crate::error::CoreError;
use crate::models::{Fingerprint, Month, MonthlyDataset, RideEvent};
use chrono::{NaiveDate, NaiveDateTime};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Required columns with descriptions, used for validation checklists.
pub const REQUIRED_COLUMNS: [(&str, &str); 7] = [
    ("Start", "Station where the ride started"),
    ("End", "Station where the ride ended"),
    ("User Id", "Unique identifier for the rider"),
    ("Signup Local Date", "Date the rider signed up"),
    ("Start Date Local", "Date and time the ride started"),
    ("Duration", "Ride duration in minutes"),
    ("Rating", "Rider rating (1-5 stars)"),
];

const START_COL: &str = "Start";
const END_COL: &str = "End";
const USER_COL: &str = "User Id";
const SIGNUP_COL: &str = "Signup Local Date";
const START_DATE_COL: &str = "Start Date Local";
const DURATION_COL: &str = "Duration";
const RATING_COL: &str = "Rating";

/// Dataset file format. Resolution tries CSV first, then JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    Csv,
    Json,
}

impl DatasetFormat {
    const ALL: [DatasetFormat; 2] = [DatasetFormat::Csv, DatasetFormat::Json];

    pub fn extension(&self) -> &'static str {
        match self {
            DatasetFormat::Csv => "csv",
            DatasetFormat::Json => "json",
        }
    }
}

/// Store for monthly dataset files under a data directory.
///
/// Cheap to clone; holds only the root path.
#[derive(Debug, Clone)]
pub struct DatasetStore {
    data_dir: PathBuf,
}

impl DatasetStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path a dataset file for `month` would live at, per format.
    pub fn month_path(&self, month: Month, format: DatasetFormat) -> PathBuf {
        self.data_dir
            .join(month.year().to_string())
            .join(format!("{}.{}", month, format.extension()))
    }

    /// Resolve the physical source for a month: canonical format first,
    /// fallback second. `None` means no data uploaded.
    pub fn resolve(&self, month: Month) -> Option<(PathBuf, DatasetFormat)> {
        DatasetFormat::ALL.into_iter().find_map(|format| {
            let path = self.month_path(month, format);
            path.exists().then_some((path, format))
        })
    }

    /// Stat the month's source file without parsing it.
    ///
    /// The cache layer uses this to decide whether a cached dataset is still
    /// backed by the same bytes.
    pub fn fingerprint(
        &self,
        month: Month,
    ) -> Result<(PathBuf, DatasetFormat, Fingerprint), CoreError> {
        let (path, format) = self
            .resolve(month)
            .ok_or(CoreError::DatasetNotFound { month })?;
        let meta = std::fs::metadata(&path).map_err(|e| CoreError::DatasetLoad {
            path: path.clone(),
            message: e.to_string(),
        })?;
        let mtime = meta.modified().map_err(|e| CoreError::DatasetLoad {
            path: path.clone(),
            message: e.to_string(),
        })?;
        Ok((path, format, Fingerprint::new(mtime, meta.len())))
    }

    /// Load and normalize the dataset for `month`.
    ///
    /// Fails with `DatasetNotFound` when no file exists, `DatasetLoad` on
    /// I/O or structural corruption, and `DatasetInvalid` when required
    /// columns are absent. Invalid datasets are never cached upstream.
    pub async fn load(&self, month: Month) -> Result<MonthlyDataset, CoreError> {
        let (path, format, fingerprint) = self.fingerprint(month)?;

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| CoreError::DatasetLoad {
                path: path.clone(),
                message: e.to_string(),
            })?;

        let dataset = match format {
            DatasetFormat::Csv => parse_csv(month, &bytes, fingerprint, &path)?,
            DatasetFormat::Json => parse_json(month, &bytes, fingerprint, &path)?,
        };

        Self::validate(&dataset)?;

        debug!(month = %month, rows = dataset.len(), format = ?format, "Dataset loaded");
        Ok(dataset)
    }

    /// Check that all seven required columns are present.
    pub fn validate(dataset: &MonthlyDataset) -> Result<(), CoreError> {
        let missing = missing_columns(&dataset.columns);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(CoreError::DatasetInvalid {
                month: dataset.month,
                missing,
            })
        }
    }

    /// All months that have an uploaded dataset, ascending chronological.
    pub fn uploaded_months(&self) -> Vec<Month> {
        let mut months = Vec::new();

        let Ok(entries) = std::fs::read_dir(&self.data_dir) else {
            return months;
        };

        for entry in entries.flatten() {
            let Ok(year) = entry.file_name().to_string_lossy().parse::<i32>() else {
                continue;
            };
            for m in 1..=12 {
                let Ok(month) = Month::new(year, m) else {
                    continue;
                };
                if self.resolve(month).is_some() {
                    months.push(month);
                }
            }
        }

        months.sort();
        months
    }

    /// Validate a raw CSV payload and persist it as the month's canonical
    /// dataset, replacing any previous file. Returns the number of rows.
    ///
    /// The payload is rejected (and nothing written) if it is structurally
    /// broken or missing required columns. The write goes through a temp
    /// file and a rename, so a concurrent reader sees either the old file
    /// or the new one, never a partial write.
    pub async fn save_upload(&self, month: Month, payload: &[u8]) -> Result<usize, CoreError> {
        let path = self.month_path(month, DatasetFormat::Csv);

        let dataset = parse_csv(month, payload, Fingerprint::default(), &path)?;
        Self::validate(&dataset)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::DatasetLoad {
                path: path.clone(),
                message: e.to_string(),
            })?;
        }

        let tmp = path.with_extension("csv.tmp");
        tokio::fs::write(&tmp, payload)
            .await
            .map_err(|e| CoreError::DatasetLoad {
                path: path.clone(),
                message: e.to_string(),
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| CoreError::DatasetLoad {
                path: path.clone(),
                message: e.to_string(),
            })?;

        // A replaced upload supersedes any stale fallback file.
        let json_path = self.month_path(month, DatasetFormat::Json);
        if json_path.exists() {
            let _ = std::fs::remove_file(&json_path);
        }

        debug!(month = %month, rows = dataset.len(), path = %path.display(), "Dataset saved");
        Ok(dataset.len())
    }

    /// Remove the month's dataset files. Returns whether anything existed.
    pub fn delete(&self, month: Month) -> Result<bool, CoreError> {
        let mut existed = false;
        for format in DatasetFormat::ALL {
            let path = self.month_path(month, format);
            if path.exists() {
                std::fs::remove_file(&path).map_err(|e| CoreError::DatasetRemove {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
                existed = true;
            }
        }
        debug!(month = %month, existed, "Dataset deleted");
        Ok(existed)
    }
}

/// Which required columns are absent from a header set.
fn missing_columns(columns: &[String]) -> Vec<String> {
    REQUIRED_COLUMNS
        .iter()
        .filter(|(name, _)| !columns.iter().any(|c| c == name))
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Strip non-breaking spaces and surrounding whitespace from a header.
fn normalize_header(raw: &str) -> String {
    raw.replace('\u{a0}', " ").trim().to_string()
}

/// Positions of the required columns within a header row.
#[derive(Default)]
struct ColumnIndex {
    start: Option<usize>,
    end: Option<usize>,
    user: Option<usize>,
    signup: Option<usize>,
    started: Option<usize>,
    duration: Option<usize>,
    rating: Option<usize>,
}

impl ColumnIndex {
    fn from_headers(columns: &[String]) -> Self {
        let find = |name: &str| columns.iter().position(|c| c == name);
        Self {
            start: find(START_COL),
            end: find(END_COL),
            user: find(USER_COL),
            signup: find(SIGNUP_COL),
            started: find(START_DATE_COL),
            duration: find(DURATION_COL),
            rating: find(RATING_COL),
        }
    }
}

fn parse_csv(
    month: Month,
    bytes: &[u8],
    fingerprint: Fingerprint,
    path: &Path,
) -> Result<MonthlyDataset, CoreError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(bytes);

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| CoreError::DatasetLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
        .iter()
        .map(normalize_header)
        .collect();

    let idx = ColumnIndex::from_headers(&columns);
    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record.map_err(|e| CoreError::DatasetLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let cell = |i: Option<usize>| i.and_then(|i| record.get(i));
        rows.push(build_row(
            cell(idx.start),
            cell(idx.end),
            cell(idx.user),
            cell(idx.signup),
            cell(idx.started),
            cell(idx.duration),
            cell(idx.rating),
        ));
    }

    Ok(MonthlyDataset {
        month,
        columns,
        rows,
        fingerprint,
    })
}

fn parse_json(
    month: Month,
    bytes: &[u8],
    fingerprint: Fingerprint,
    path: &Path,
) -> Result<MonthlyDataset, CoreError> {
    use serde_json::Value;

    let raw: Vec<serde_json::Map<String, Value>> =
        serde_json::from_slice(bytes).map_err(|e| CoreError::DatasetLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    // Column set comes from the first row; JSON rows are homogeneous exports.
    let columns: Vec<String> = raw
        .first()
        .map(|row| row.keys().map(|k| normalize_header(k)).collect())
        .unwrap_or_default();

    let rows = raw
        .iter()
        .map(|row| {
            let text = |name: &str| -> Option<String> {
                row.iter()
                    .find(|(k, _)| normalize_header(k) == name)
                    .and_then(|(_, v)| match v {
                        Value::String(s) => Some(s.clone()),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
            };
            build_row(
                text(START_COL).as_deref(),
                text(END_COL).as_deref(),
                text(USER_COL).as_deref(),
                text(SIGNUP_COL).as_deref(),
                text(START_DATE_COL).as_deref(),
                text(DURATION_COL).as_deref(),
                text(RATING_COL).as_deref(),
            )
        })
        .collect();

    Ok(MonthlyDataset {
        month,
        columns,
        rows,
        fingerprint,
    })
}

#[allow(clippy::too_many_arguments)]
fn build_row(
    start: Option<&str>,
    end: Option<&str>,
    user: Option<&str>,
    signup: Option<&str>,
    started: Option<&str>,
    duration: Option<&str>,
    rating: Option<&str>,
) -> RideEvent {
    RideEvent {
        start: start.and_then(non_empty),
        end: end.and_then(non_empty),
        user_id: user.map(|s| s.trim().to_string()).unwrap_or_default(),
        signup_date: signup.and_then(coerce_date),
        started_at: started.and_then(coerce_datetime),
        duration_min: duration.and_then(coerce_number),
        rating: rating.and_then(coerce_number),
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn coerce_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok()
}

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M",
];

fn coerce_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| coerce_datetime(s).map(|dt| dt.date()))
}

fn coerce_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const HEADER: &str = "Start,End,User Id,Signup Local Date,Start Date Local,Duration,Rating";

    fn month(s: &str) -> Month {
        s.parse().unwrap()
    }

    fn write_csv(store: &DatasetStore, m: Month, content: &str) {
        let path = store.month_path(m, DatasetFormat::Csv);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn test_load_missing_month_is_not_found() {
        let dir = tempdir().unwrap();
        let store = DatasetStore::new(dir.path());

        let err = store.load(month("2025-01")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_load_parses_and_coerces_rows() {
        let dir = tempdir().unwrap();
        let store = DatasetStore::new(dir.path());
        let m = month("2025-06");

        let body = format!(
            "{HEADER}\n\
             Helio Station,Alf Maskan,u1,2025-06-02,2025-06-10 08:30:00,12.5,5\n\
             Alf Maskan,,u2,not-a-date,2025-06-11 09:00:00,oops,bad\n"
        );
        write_csv(&store, m, &body);

        let ds = store.load(m).await.unwrap();
        assert_eq!(ds.len(), 2);

        let first = &ds.rows[0];
        assert_eq!(first.start.as_deref(), Some("Helio Station"));
        assert_eq!(first.duration_min, Some(12.5));
        assert_eq!(first.rating, Some(5.0));
        assert_eq!(
            first.signup_date,
            NaiveDate::from_ymd_opt(2025, 6, 2)
        );

        // Bad cells degrade to missing, never fail the load.
        let second = &ds.rows[1];
        assert_eq!(second.end, None);
        assert_eq!(second.signup_date, None);
        assert_eq!(second.duration_min, None);
        assert_eq!(second.rating, None);
    }

    #[tokio::test]
    async fn test_load_normalizes_headers() {
        let dir = tempdir().unwrap();
        let store = DatasetStore::new(dir.path());
        let m = month("2025-06");

        let body = format!(
            " Start ,End,User\u{a0}Id,Signup Local Date,Start Date Local,Duration,Rating\n\
             A,B,u1,2025-06-01,2025-06-01 10:00:00,5,4\n"
        );
        write_csv(&store, m, &body);

        let ds = store.load(m).await.unwrap();
        assert!(ds.columns.contains(&"Start".to_string()));
        assert!(ds.columns.contains(&"User Id".to_string()));
        assert_eq!(ds.rows[0].start.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_load_missing_columns_is_invalid_not_load_error() {
        let dir = tempdir().unwrap();
        let store = DatasetStore::new(dir.path());
        let m = month("2025-06");

        write_csv(&store, m, "Start,End,User Id\nA,B,u1\n");

        let err = store.load(m).await.unwrap_err();
        match err {
            CoreError::DatasetInvalid { missing, .. } => {
                assert!(missing.contains(&"Rating".to_string()));
                assert!(missing.contains(&"Duration".to_string()));
                assert_eq!(missing.len(), 4);
            }
            other => panic!("expected DatasetInvalid, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_json_fallback_is_loaded_when_no_csv() {
        let dir = tempdir().unwrap();
        let store = DatasetStore::new(dir.path());
        let m = month("2025-06");

        let path = store.month_path(m, DatasetFormat::Json);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            path,
            r#"[{"Start":"A","End":"B","User Id":"u1","Signup Local Date":"2025-06-01",
                "Start Date Local":"2025-06-01 08:00:00","Duration":7,"Rating":4}]"#,
        )
        .unwrap();

        let ds = store.load(m).await.unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.rows[0].duration_min, Some(7.0));
    }

    #[tokio::test]
    async fn test_corrupt_json_is_load_error() {
        let dir = tempdir().unwrap();
        let store = DatasetStore::new(dir.path());
        let m = month("2025-06");

        let path = store.month_path(m, DatasetFormat::Json);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "{{{ definitely not json").unwrap();

        let err = store.load(m).await.unwrap_err();
        assert!(matches!(err, CoreError::DatasetLoad { .. }));
    }

    #[tokio::test]
    async fn test_uploaded_months_sorted_across_years() {
        let dir = tempdir().unwrap();
        let store = DatasetStore::new(dir.path());

        for m in ["2025-02", "2024-12", "2025-01"] {
            write_csv(&store, month(m), &format!("{HEADER}\n"));
        }

        let months: Vec<String> = store
            .uploaded_months()
            .iter()
            .map(|m| m.to_string())
            .collect();
        assert_eq!(months, vec!["2024-12", "2025-01", "2025-02"]);
    }

    #[tokio::test]
    async fn test_save_upload_rejects_invalid_payload() {
        let dir = tempdir().unwrap();
        let store = DatasetStore::new(dir.path());
        let m = month("2025-06");

        let err = store
            .save_upload(m, b"Start,End\nA,B\n")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::DatasetInvalid { .. }));

        // Nothing persisted on rejection.
        assert!(store.resolve(m).is_none());
    }

    #[tokio::test]
    async fn test_save_upload_then_load_and_delete() {
        let dir = tempdir().unwrap();
        let store = DatasetStore::new(dir.path());
        let m = month("2025-06");

        let payload = format!("{HEADER}\nA,B,u1,2025-06-01,2025-06-01 10:00:00,5,4\n");
        let rows = store.save_upload(m, payload.as_bytes()).await.unwrap();
        assert_eq!(rows, 1);

        let ds = store.load(m).await.unwrap();
        assert_eq!(ds.len(), 1);

        assert!(store.delete(m).unwrap());
        assert!(!store.delete(m).unwrap());
        assert!(store.load(m).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_save_upload_renames_into_place() {
        let dir = tempdir().unwrap();
        let store = DatasetStore::new(dir.path());
        let m = month("2025-06");

        let payload = format!("{HEADER}\nA,B,u1,2025-06-01,2025-06-01 10:00:00,5,4\n");
        store.save_upload(m, payload.as_bytes()).await.unwrap();
        store.save_upload(m, payload.as_bytes()).await.unwrap();

        // The canonical file holds the complete payload and no temp file
        // survives the rename.
        let path = store.month_path(m, DatasetFormat::Csv);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), payload);

        let names: Vec<String> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["2025-06.csv".to_string()]);
    }

    #[test]
    fn test_fingerprint_tracks_file_changes() {
        let dir = tempdir().unwrap();
        let store = DatasetStore::new(dir.path());
        let m = month("2025-06");

        write_csv(&store, m, &format!("{HEADER}\nA,B,u1,,,5,4\n"));
        let (_, _, before) = store.fingerprint(m).unwrap();

        write_csv(&store, m, &format!("{HEADER}\nA,B,u1,,,5,4\nC,D,u2,,,6,3\n"));
        let (_, _, after) = store.fingerprint(m).unwrap();

        assert_ne!(before, after);
    }
}

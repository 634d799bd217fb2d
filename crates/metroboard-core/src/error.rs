//! Error types for metroboard-core
//!
//! One thiserror hierarchy for the whole engine. Variants carry only owned,
//! cloneable data so that a failure cached behind a shared computation
//! (`Arc<CoreError>`) can be rethrown to every waiting caller.

use crate::models::Month;
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for metroboard operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    // ===================
    // Dataset errors
    // ===================
    /// No file exists for the requested month. Expected condition, not a fault.
    #[error("No dataset uploaded for {month}")]
    DatasetNotFound { month: Month },

    /// The file parsed, but required columns are absent. Never cached.
    #[error("Dataset for {month} is missing required columns: {}", .missing.join(", "))]
    DatasetInvalid { month: Month, missing: Vec<String> },

    /// I/O failure or a file too malformed to produce rows at all.
    #[error("Failed to load dataset {path}: {message}")]
    DatasetLoad { path: PathBuf, message: String },

    #[error("Failed to remove dataset {path}: {message}")]
    DatasetRemove { path: PathBuf, message: String },

    // ===================
    // Station registry errors
    // ===================
    #[error("Failed to persist station config {path}: {message}")]
    ConfigPersist { path: PathBuf, message: String },

    #[error("Station already exists: {name}")]
    StationExists { name: String },

    #[error("Unknown station: {name}")]
    StationNotFound { name: String },

    // ===================
    // Input errors
    // ===================
    #[error("Invalid month '{input}', expected YYYY-MM")]
    InvalidMonth { input: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

impl CoreError {
    /// True for "no data for that month": callers render an upload prompt,
    /// the trend builder skips the month.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::DatasetNotFound { .. })
    }

    /// Actionable remediation hint for user-facing rendering.
    pub fn remediation(&self) -> Option<String> {
        match self {
            CoreError::DatasetNotFound { month } => {
                Some(format!("Upload a dataset for {month} to see its metrics"))
            }
            CoreError::DatasetInvalid { missing, .. } => Some(format!(
                "Re-upload the file with the missing columns added: {}",
                missing.join(", ")
            )),
            CoreError::DatasetLoad { .. } => {
                Some("The file could not be read; re-upload it".to_string())
            }
            CoreError::ConfigPersist { path, .. } => Some(format!(
                "Check that {} is writable; the station was not added",
                path.display()
            )),
            CoreError::InvalidMonth { .. } => {
                Some("Use the YYYY-MM format, e.g. 2025-06".to_string())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_invalid_lists_columns() {
        let err = CoreError::DatasetInvalid {
            month: "2025-06".parse().unwrap(),
            missing: vec!["Rating".to_string(), "Duration".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("2025-06"));
        assert!(msg.contains("Rating, Duration"));
    }

    #[test]
    fn test_not_found_classification() {
        let month: Month = "2025-01".parse().unwrap();
        assert!(CoreError::DatasetNotFound { month }.is_not_found());
        assert!(!CoreError::StationNotFound {
            name: "X".to_string()
        }
        .is_not_found());
    }

    #[test]
    fn test_remediation_mentions_month() {
        let month: Month = "2025-03".parse().unwrap();
        let hint = CoreError::DatasetNotFound { month }.remediation().unwrap();
        assert!(hint.contains("2025-03"));
    }
}

//! Station registry with durable JSON persistence
//!
//! Holds the display-name -> match-keyword mapping in insertion order.
//! `add` persists before committing to memory: on persistence failure the
//! in-memory list is untouched, so durable and in-memory state never diverge.
//! Every successful add bumps a version counter consumed by metrics cache
//! keys.

use crate::error::CoreError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Stations seeded when no config file exists yet.
const DEFAULT_STATIONS: [(&str, &str); 6] = [
    ("Koleyet El Banat", "كليه البنات"),
    ("Safaa Hegazy", "صفاء"),
    ("Al-Ahram", "الاهرام"),
    ("Heliopolis", "هليوبوليس"),
    ("Alf Maskan", "الف مسكن"),
    ("Haroun", "هارون"),
];

/// A station and the keyword used to match its free-text labels.
///
/// Keywords are matched as case-insensitive substrings; overlapping keywords
/// are accepted behavior, each station's subset is computed independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationDefinition {
    pub name: String,
    pub keyword: String,
}

/// Thread-safe station registry backed by a JSON config file.
pub struct StationRegistry {
    path: PathBuf,
    stations: RwLock<Vec<StationDefinition>>,
    version: AtomicU64,
}

impl StationRegistry {
    /// Load the registry from `path`, falling back to the built-in defaults
    /// when the file is missing or unreadable (a broken config file must
    /// not take the dashboard down).
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let stations = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Vec<StationDefinition>>(&content) {
                Ok(stations) => stations,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Station config unreadable, using defaults");
                    Self::defaults()
                }
            },
            Err(_) => Self::defaults(),
        };

        debug!(path = %path.display(), count = stations.len(), "Station registry loaded");

        Self {
            path,
            stations: RwLock::new(stations),
            version: AtomicU64::new(0),
        }
    }

    fn defaults() -> Vec<StationDefinition> {
        DEFAULT_STATIONS
            .iter()
            .map(|(name, keyword)| StationDefinition {
                name: name.to_string(),
                keyword: keyword.to_string(),
            })
            .collect()
    }

    /// All stations, in insertion order.
    pub fn list(&self) -> Vec<StationDefinition> {
        self.stations.read().clone()
    }

    /// Match keyword for a station display name.
    pub fn keyword_of(&self, name: &str) -> Result<String, CoreError> {
        self.stations
            .read()
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.keyword.clone())
            .ok_or_else(|| CoreError::StationNotFound {
                name: name.to_string(),
            })
    }

    /// Registry version. Increments on every successful add; metrics cache
    /// keys embed it so prior entries become unreachable after a change.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Add a station, persisting before the in-memory commit.
    pub fn add(&self, name: &str, keyword: &str) -> Result<(), CoreError> {
        let name = name.trim();
        let keyword = keyword.trim();
        if name.is_empty() || keyword.is_empty() {
            return Err(CoreError::InvalidInput {
                message: "station name and keyword must both be non-empty".to_string(),
            });
        }

        let mut guard = self.stations.write();

        if guard.iter().any(|s| s.name == name) {
            return Err(CoreError::StationExists {
                name: name.to_string(),
            });
        }

        let mut next = guard.clone();
        next.push(StationDefinition {
            name: name.to_string(),
            keyword: keyword.to_string(),
        });

        // Durable state first; memory only mutates once the write landed.
        self.persist(&next)?;

        *guard = next;
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(name, keyword, version, "Station added");
        Ok(())
    }

    /// Write the station list atomically (temp file + rename).
    fn persist(&self, stations: &[StationDefinition]) -> Result<(), CoreError> {
        let persist_err = |e: &dyn std::fmt::Display| CoreError::ConfigPersist {
            path: self.path.clone(),
            message: e.to_string(),
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| persist_err(&e))?;
        }

        let content =
            serde_json::to_string_pretty(stations).map_err(|e| persist_err(&e))?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(|e| persist_err(&e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| persist_err(&e))?;
        Ok(())
    }
}

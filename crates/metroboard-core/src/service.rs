//! Query service for the analytics engine
//!
//! `Dashboard` is the one object the presentation layer talks to. It is
//! constructed at process start and injected into request handlers, with no
//! ambient global state. Reads go through the cache concurrently; the rare
//! write paths (upload, delete, station add) are serialized against each
//! other and complete their invalidation before returning, so a read started
//! after a mutation never observes torn state across keyspaces.

use crate::aggregate::SegmentThresholds;
use crate::cache::{CacheConfig, MetricsCache, MetricsKey};
use crate::dataset::DatasetStore;
use crate::error::CoreError;
use crate::event::{DataEvent, EventBus};
use crate::models::{
    ActivityProfile, ComparisonRow, ComparisonTable, MetricsReport, Month,
    StationMetricsSnapshot, TrendSeries,
};
use crate::stations::{StationDefinition, StationRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Configuration for the dashboard service
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Root of the per-year dataset directories
    pub data_dir: PathBuf,
    /// Station registry config file
    pub stations_path: PathBuf,
    /// Loyalty segmentation bands
    pub thresholds: SegmentThresholds,
    /// Cache TTLs and capacities
    pub cache: CacheConfig,
}

impl DashboardConfig {
    /// Conventional layout under one root: `<root>/data` and
    /// `<root>/config/stations.json`.
    pub fn with_root(root: &Path) -> Self {
        Self {
            data_dir: root.join("data"),
            stations_path: root.join("config").join("stations.json"),
            thresholds: SegmentThresholds::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// The metrics aggregation and caching engine behind the dashboard.
pub struct Dashboard {
    store: DatasetStore,
    registry: StationRegistry,
    cache: MetricsCache,
    thresholds: SegmentThresholds,
    events: EventBus,
    /// Serializes upload/delete/station-add against each other.
    write_lock: Mutex<()>,
}

impl Dashboard {
    pub fn new(config: DashboardConfig) -> Self {
        let store = DatasetStore::new(&config.data_dir);
        let registry = StationRegistry::load(&config.stations_path);
        let cache = MetricsCache::new(config.cache);

        info!(
            data_dir = %config.data_dir.display(),
            stations = registry.list().len(),
            "Dashboard service initialized"
        );

        Self {
            store,
            registry,
            cache,
            thresholds: config.thresholds,
            events: EventBus::default_capacity(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_root(root: &Path) -> Self {
        Self::new(DashboardConfig::with_root(root))
    }

    /// Event bus for subscribing to mutation notifications.
    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    // ===================
    // Queries
    // ===================

    /// Metrics for one station in one month, optionally with the previous
    /// month's snapshot for comparison.
    ///
    /// Comparison lookups degrade silently: a missing or broken previous
    /// month renders as "no comparison", never as a failure of the current
    /// month's answer.
    pub async fn get_metrics(
        &self,
        station: &str,
        month: Month,
        compare_previous: bool,
    ) -> Result<MetricsReport, CoreError> {
        let keyword = self.registry.keyword_of(station)?;

        let current = self.metrics_for(station, &keyword, month).await?;
        let previous = if compare_previous {
            self.metrics_for(station, &keyword, month.prev())
                .await
                .unwrap_or(None)
        } else {
            None
        };

        Ok(MetricsReport {
            station: station.to_string(),
            month,
            current,
            previous,
        })
    }

    /// Comparison of every registered station with data for the month, in
    /// registry order. Stations with no rides are omitted.
    pub async fn comparison_table(&self, month: Month) -> Result<ComparisonTable, CoreError> {
        let mut rows = Vec::new();

        for station in self.registry.list() {
            let snapshot = self
                .metrics_for(&station.name, &station.keyword, month)
                .await?;
            if let Some(snap) = snapshot {
                rows.push(ComparisonRow {
                    station: station.name,
                    total_starts: snap.starts,
                    total_riders: snap.unique_riders,
                    avg_duration: snap.avg_duration,
                    avg_rating: snap.avg_rating,
                    heavy_users: snap.heavy,
                });
            }
        }

        Ok(ComparisonTable { month, rows })
    }

    /// When-do-people-ride distributions for one station in one month:
    /// start counts by hour of day and by (weekday, hour).
    ///
    /// `None` mirrors [`Dashboard::get_metrics`]: the month has no rides for
    /// the station.
    pub async fn activity_profile(
        &self,
        station: &str,
        month: Month,
    ) -> Result<Option<Arc<ActivityProfile>>, CoreError> {
        let keyword = self.registry.keyword_of(station)?;
        let dataset = self.cache.dataset(&self.store, month).await?;
        let key = MetricsKey {
            month,
            fingerprint: dataset.fingerprint,
            station: station.to_string(),
            registry_version: self.registry.version(),
        };
        Ok(self.cache.profile(key, dataset, &keyword).await)
    }

    /// Ride-count series for the station across all uploaded months.
    pub async fn trend(&self, station: &str) -> Result<Arc<TrendSeries>, CoreError> {
        let keyword = self.registry.keyword_of(station)?;
        let months = self.store.uploaded_months();
        Ok(self.cache.trend(&self.store, &keyword, months).await)
    }

    /// All months with an uploaded dataset, chronological.
    pub fn uploaded_months(&self) -> Vec<Month> {
        self.store.uploaded_months()
    }

    /// All registered stations, insertion order.
    pub fn stations(&self) -> Vec<StationDefinition> {
        self.registry.list()
    }

    // ===================
    // Mutations
    // ===================

    /// Validate and persist a raw CSV payload as the month's dataset.
    /// Returns the number of rows accepted.
    pub async fn upload_month(&self, month: Month, payload: &[u8]) -> Result<usize, CoreError> {
        let _guard = self.write_lock.lock().await;

        let rows = self.store.save_upload(month, payload).await?;
        self.cache.invalidate_month(month).await;
        self.events.publish(DataEvent::DatasetUploaded(month));

        info!(month = %month, rows, "Dataset uploaded");
        Ok(rows)
    }

    /// Delete the month's dataset and drop everything derived from it.
    pub async fn delete_month(&self, month: Month) -> Result<(), CoreError> {
        let _guard = self.write_lock.lock().await;

        if !self.store.delete(month)? {
            return Err(CoreError::DatasetNotFound { month });
        }
        self.cache.invalidate_month(month).await;
        self.events.publish(DataEvent::DatasetDeleted(month));

        info!(month = %month, "Dataset deleted");
        Ok(())
    }

    /// Register a new station. The registry version bump reroutes every
    /// future metrics key, so no cache flush is needed here; dataset and
    /// trend keyspaces do not depend on the registry.
    pub async fn add_station(&self, name: &str, keyword: &str) -> Result<(), CoreError> {
        let _guard = self.write_lock.lock().await;

        self.registry.add(name, keyword)?;
        self.events
            .publish(DataEvent::StationAdded(name.trim().to_string()));

        info!(name, keyword, "Station added");
        Ok(())
    }

    // ===================
    // Internals
    // ===================

    async fn metrics_for(
        &self,
        station: &str,
        keyword: &str,
        month: Month,
    ) -> Result<Option<Arc<StationMetricsSnapshot>>, CoreError> {
        let dataset = self.cache.dataset(&self.store, month).await?;
        let key = MetricsKey {
            month,
            fingerprint: dataset.fingerprint,
            station: station.to_string(),
            registry_version: self.registry.version(),
        };
        Ok(self
            .cache
            .metrics(key, dataset, keyword, self.thresholds)
            .await)
    }
}

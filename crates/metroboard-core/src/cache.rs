//! Keyed, TTL-aware memoization for datasets, metrics and trends
//!
//! Independent moka keyspaces, each with its own TTL, so an expired
//! metrics entry recomputes against a still-cached dataset without touching
//! the file again. Keys encode every input the value depends on: dataset
//! identity (source fingerprint), registry version, month and station. A
//! mutation can therefore never be followed by a stale read; entries for
//! changed inputs are unreachable by key, and targeted invalidation drops
//! them eagerly.
//!
//! Population goes through moka's `get_with`/`try_get_with`, which collapses
//! concurrent misses on the same key into a single computation and publishes
//! the finished value atomically. An abandoned caller does not abort an
//! in-flight population; the value still lands for the next request.

use crate::aggregate::{activity_profile, aggregate, SegmentThresholds};
use crate::dataset::DatasetStore;
use crate::error::CoreError;
use crate::matcher::start_count;
use crate::models::{
    ActivityProfile, Fingerprint, Month, MonthlyDataset, StationMetricsSnapshot, TrendPoint,
    TrendSeries,
};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-keyspace TTLs and capacities.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub dataset_ttl: Duration,
    pub metrics_ttl: Duration,
    pub trend_ttl: Duration,
    pub dataset_capacity: u64,
    pub metrics_capacity: u64,
    pub trend_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dataset_ttl: Duration::from_secs(3600),
            metrics_ttl: Duration::from_secs(3600),
            trend_ttl: Duration::from_secs(3600),
            dataset_capacity: 64,
            metrics_capacity: 4096,
            trend_capacity: 512,
        }
    }
}

/// Full input set of one metrics snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricsKey {
    pub month: Month,
    pub fingerprint: Fingerprint,
    pub station: String,
    pub registry_version: u64,
}

/// Full input set of one trend series: the keyword plus every source file
/// (month and fingerprint) at computation time.
///
/// Embedding the fingerprints means a mutation reroutes the key immediately:
/// a reader arriving after an upload or delete can never join an in-flight
/// computation over the pre-mutation files.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrendKey {
    pub keyword: String,
    pub sources: Vec<(Month, Fingerprint)>,
}

/// The derived-value keyspaces.
pub struct MetricsCache {
    datasets: Cache<Month, Arc<MonthlyDataset>>,
    metrics: Cache<MetricsKey, Option<Arc<StationMetricsSnapshot>>>,
    profiles: Cache<MetricsKey, Option<Arc<ActivityProfile>>>,
    trends: Cache<TrendKey, Arc<TrendSeries>>,
}

impl MetricsCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            datasets: Cache::builder()
                .max_capacity(config.dataset_capacity)
                .time_to_live(config.dataset_ttl)
                .build(),
            metrics: Cache::builder()
                .max_capacity(config.metrics_capacity)
                .time_to_live(config.metrics_ttl)
                .support_invalidation_closures()
                .build(),
            // Same inputs and lifecycle as metrics snapshots.
            profiles: Cache::builder()
                .max_capacity(config.metrics_capacity)
                .time_to_live(config.metrics_ttl)
                .support_invalidation_closures()
                .build(),
            trends: Cache::builder()
                .max_capacity(config.trend_capacity)
                .time_to_live(config.trend_ttl)
                .build(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    /// Load the month's dataset through the cache.
    ///
    /// A hit is served only while the on-disk fingerprint still matches;
    /// otherwise the entry is dropped and the file re-parsed. Load and
    /// validation failures are not cached.
    pub async fn dataset(
        &self,
        store: &DatasetStore,
        month: Month,
    ) -> Result<Arc<MonthlyDataset>, CoreError> {
        load_dataset(&self.datasets, store, month).await
    }

    /// Metrics snapshot for a fully resolved key, computed from an already
    /// loaded dataset on a miss. `None` (no rides for the station) is cached
    /// like any other outcome.
    pub async fn metrics(
        &self,
        key: MetricsKey,
        dataset: Arc<MonthlyDataset>,
        keyword: &str,
        thresholds: SegmentThresholds,
    ) -> Option<Arc<StationMetricsSnapshot>> {
        let month = key.month;
        let keyword = keyword.to_string();
        self.metrics
            .get_with(key, async move {
                debug!(month = %month, keyword = %keyword, "Computing station metrics");
                aggregate(&dataset, &keyword, month, thresholds).map(Arc::new)
            })
            .await
    }

    /// Hour/weekday activity profile for a fully resolved key, computed from
    /// an already loaded dataset on a miss.
    pub async fn profile(
        &self,
        key: MetricsKey,
        dataset: Arc<MonthlyDataset>,
        keyword: &str,
    ) -> Option<Arc<ActivityProfile>> {
        let month = key.month;
        let keyword = keyword.to_string();
        self.profiles
            .get_with(key, async move {
                debug!(month = %month, keyword = %keyword, "Computing activity profile");
                activity_profile(&dataset, &keyword).map(Arc::new)
            })
            .await
    }

    /// Ride-count series for a keyword across the given months, in order.
    ///
    /// Months that cannot be statted or loaded are skipped with a warning,
    /// never aborting the series.
    pub async fn trend(
        &self,
        store: &DatasetStore,
        keyword: &str,
        months: Vec<Month>,
    ) -> Arc<TrendSeries> {
        // Stat every source up front; the fingerprints become part of the key.
        let sources: Vec<(Month, Fingerprint)> = months
            .into_iter()
            .filter_map(|month| match store.fingerprint(month) {
                Ok((_, _, fingerprint)) => Some((month, fingerprint)),
                Err(e) => {
                    warn!(month = %month, error = %e, "Skipping month in trend series");
                    None
                }
            })
            .collect();

        let key = TrendKey {
            keyword: keyword.to_string(),
            sources: sources.clone(),
        };

        let datasets = self.datasets.clone();
        let store = store.clone();
        let keyword = keyword.to_string();

        self.trends
            .get_with(key, async move {
                let mut points = Vec::new();
                for (month, _) in sources {
                    match load_dataset(&datasets, &store, month).await {
                        Ok(dataset) => points.push(TrendPoint {
                            month,
                            starts: start_count(&dataset, &keyword),
                        }),
                        Err(e) => {
                            warn!(month = %month, error = %e, "Skipping month in trend series")
                        }
                    }
                }
                Arc::new(TrendSeries { points })
            })
            .await
    }

    /// Drop everything keyed on a mutated month: its dataset, its metrics
    /// and profile entries, and all trend series (trend keys embed the
    /// mutated fingerprints, so this is memory reclamation, not correctness).
    /// Entries for other months are untouched.
    pub async fn invalidate_month(&self, month: Month) {
        self.datasets.invalidate(&month).await;
        if let Err(e) = self
            .metrics
            .invalidate_entries_if(move |key, _| key.month == month)
        {
            warn!(month = %month, error = %e, "Metrics invalidation predicate rejected");
        }
        if let Err(e) = self
            .profiles
            .invalidate_entries_if(move |key, _| key.month == month)
        {
            warn!(month = %month, error = %e, "Profile invalidation predicate rejected");
        }
        self.trends.invalidate_all();
        debug!(month = %month, "Caches invalidated for month");
    }
}

async fn load_dataset(
    datasets: &Cache<Month, Arc<MonthlyDataset>>,
    store: &DatasetStore,
    month: Month,
) -> Result<Arc<MonthlyDataset>, CoreError> {
    let (_, _, current) = store.fingerprint(month)?;

    if let Some(hit) = datasets.get(&month).await {
        if hit.fingerprint == current {
            return Ok(hit);
        }
        debug!(month = %month, "Dataset source changed, dropping cached copy");
        datasets.invalidate(&month).await;
    }

    let store = store.clone();
    datasets
        .try_get_with(month, async move { store.load(month).await.map(Arc::new) })
        .await
        .map_err(|e: Arc<CoreError>| (*e).clone())
}

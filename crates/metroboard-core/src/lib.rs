//! metroboard-core - Core library for metroboard
//!
//! Provides the dataset store, station registry, metrics aggregation,
//! trend builder and cache layer behind the transit dashboard.

pub mod aggregate;
pub mod cache;
pub mod dataset;
pub mod error;
pub mod event;
pub mod export;
pub mod matcher;
pub mod models;
pub mod service;
pub mod stations;

pub use aggregate::SegmentThresholds;
pub use cache::{CacheConfig, MetricsCache};
pub use dataset::DatasetStore;
pub use error::CoreError;
pub use event::{DataEvent, EventBus};
pub use export::{comparison_to_csv, export_comparison_to_csv};
pub use models::Month;
pub use service::{Dashboard, DashboardConfig};
pub use stations::{StationDefinition, StationRegistry};

//! Optional counters for the image cache (feature `metrics`).

pub mod metrics_impl;
pub mod snapshot;
pub mod traits;

pub use metrics_impl::ImageCacheMetrics;
pub use snapshot::ImageCacheMetricsSnapshot;
pub use traits::{ImageCacheMetricsRecorder, MetricsSnapshotProvider};

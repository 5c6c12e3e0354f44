//! # Metrics Traits
//!
//! Recording and snapshotting are split the same way the cache splits
//! ordering from byte accounting: the cache only calls the recorder at the
//! points where something happened, and readers take a snapshot.
//!
//! ```text
//!   ImageCache ──record_*──► ImageCacheMetricsRecorder
//!                                    │
//!                                    ▼
//!                       MetricsSnapshotProvider<S> ──► tests / monitoring
//! ```

/// Counters written by [`ImageCache`](crate::cache::ImageCache).
pub trait ImageCacheMetricsRecorder {
    fn record_load(&mut self, bytes: usize);
    fn record_load_failure(&mut self);
    fn record_preload(&mut self, bytes: usize);
    fn record_preload_rejected(&mut self);
    fn record_eviction(&mut self, bytes: usize);
    fn record_unload(&mut self, bytes: usize);
    fn record_access(&mut self);
    fn record_access_fast_path(&mut self);
    fn record_mark_used(&mut self);
    fn record_mark_free(&mut self);
    fn record_policy_swap(&mut self);
    fn record_limit_change(&mut self, clamped: bool);
}

/// Produces a point-in-time copy of the counters.
pub trait MetricsSnapshotProvider<S> {
    fn snapshot(&self) -> S;
}

use crate::metrics::snapshot::ImageCacheMetricsSnapshot;
use crate::metrics::traits::{ImageCacheMetricsRecorder, MetricsSnapshotProvider};

#[derive(Debug, Default)]
pub struct ImageCacheMetrics {
    pub loads: u64,
    pub loaded_bytes: u64,
    pub load_failures: u64,
    pub preloads: u64,
    pub preloaded_bytes: u64,
    pub preload_rejections: u64,
    pub evictions: u64,
    pub evicted_bytes: u64,
    pub unloads: u64,
    pub unloaded_bytes: u64,
    pub accesses: u64,
    pub access_fast_path_hits: u64,
    pub mark_used_calls: u64,
    pub mark_free_calls: u64,
    pub policy_swaps: u64,
    pub limit_changes: u64,
    pub limit_clamps: u64,
}

impl ImageCacheMetricsRecorder for ImageCacheMetrics {
    #[inline]
    fn record_load(&mut self, bytes: usize) {
        self.loads += 1;
        self.loaded_bytes += bytes as u64;
    }

    #[inline]
    fn record_load_failure(&mut self) {
        self.load_failures += 1;
    }

    #[inline]
    fn record_preload(&mut self, bytes: usize) {
        self.preloads += 1;
        self.preloaded_bytes += bytes as u64;
    }

    #[inline]
    fn record_preload_rejected(&mut self) {
        self.preload_rejections += 1;
    }

    #[inline]
    fn record_eviction(&mut self, bytes: usize) {
        self.evictions += 1;
        self.evicted_bytes += bytes as u64;
    }

    #[inline]
    fn record_unload(&mut self, bytes: usize) {
        self.unloads += 1;
        self.unloaded_bytes += bytes as u64;
    }

    #[inline]
    fn record_access(&mut self) {
        self.accesses += 1;
    }

    #[inline]
    fn record_access_fast_path(&mut self) {
        self.access_fast_path_hits += 1;
    }

    #[inline]
    fn record_mark_used(&mut self) {
        self.mark_used_calls += 1;
    }

    #[inline]
    fn record_mark_free(&mut self) {
        self.mark_free_calls += 1;
    }

    #[inline]
    fn record_policy_swap(&mut self) {
        self.policy_swaps += 1;
    }

    #[inline]
    fn record_limit_change(&mut self, clamped: bool) {
        self.limit_changes += 1;
        if clamped {
            self.limit_clamps += 1;
        }
    }
}

impl MetricsSnapshotProvider<ImageCacheMetricsSnapshot> for ImageCacheMetrics {
    fn snapshot(&self) -> ImageCacheMetricsSnapshot {
        ImageCacheMetricsSnapshot {
            loads: self.loads,
            loaded_bytes: self.loaded_bytes,
            load_failures: self.load_failures,
            preloads: self.preloads,
            preloaded_bytes: self.preloaded_bytes,
            preload_rejections: self.preload_rejections,
            evictions: self.evictions,
            evicted_bytes: self.evicted_bytes,
            unloads: self.unloads,
            unloaded_bytes: self.unloaded_bytes,
            accesses: self.accesses,
            access_fast_path_hits: self.access_fast_path_hits,
            mark_used_calls: self.mark_used_calls,
            mark_free_calls: self.mark_free_calls,
            policy_swaps: self.policy_swaps,
            limit_changes: self.limit_changes,
            limit_clamps: self.limit_clamps,
            ..Default::default()
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImageCacheMetricsSnapshot {
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

    // gauges captured at snapshot time
    pub free_entries: usize,
    pub used_entries: usize,
    pub memory_usage: usize,
    pub size_limit: usize,
}

impl ImageCacheMetricsSnapshot {
    /// Share of accesses answered by the last-accessed fast path.
    pub fn fast_path_ratio(&self) -> f64 {
        if self.accesses == 0 {
            0.0
        } else {
            self.access_fast_path_hits as f64 / self.accesses as f64
        }
    }
}

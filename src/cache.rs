//! # Image Cache
//!
//! Decides which images are memory-resident, keeps their decoded byte
//! sizes under a budget, and mediates every load and unload issued to the
//! [`GraphicsBackend`] on behalf of the resource manager.
//!
//! ## Architecture
//!
//! ```text
//!   ┌───────────────────────────────────────────────────────────────────────┐
//!   │                           ImageCache<B>                               │
//!   │                                                                       │
//!   │   used_policy ──► ┌───────────────────────────────┐                   │
//!   │                   │ used list (request count > 0) │  never evicted    │
//!   │                   └──────────────┬────────────────┘  automatically    │
//!   │                    mark_as_free  │  ▲ mark_as_used                    │
//!   │                                  ▼  │                                 │
//!   │   free_policy ──► ┌───────────────────────────────┐                   │
//!   │                   │ free list (loaded, unused)    │ ──► evict at end  │
//!   │                   └───────────────────────────────┘                   │
//!   │                                                                       │
//!   │   size_limit >= free_list.size() + used_list.size()                   │
//!   │                                                                       │
//!   │   backend: B  (probe / load_image / unload_image)                     │
//!   └───────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Eviction
//!
//! To make room for `n` bytes the cache repeatedly asks the free list's
//! policy for its eviction candidate, unloads it through the backend and
//! accumulates the freed bytes, until `n` bytes are freed or the free list
//! is empty. The used list is never touched. Evictions already performed
//! are kept when the overall operation fails.
//!
//! ## Key Operations
//!
//! | Method                  | Evicts? | Target list | Failure                     |
//! |-------------------------|---------|-------------|-----------------------------|
//! | `load_img`              | yes     | used        | `BudgetExceeded`, `Backend` |
//! | `preload_img`           | no      | free        | `BudgetExceeded`, `Backend` |
//! | `mark_as_used`          | no      | used        | `NotResident`               |
//! | `mark_as_free`          | no      | free        | `NotResident`               |
//! | `unload_specific_image` | -       | -           | `false` if not resident     |
//! | `set_cache_size_limit`  | yes     | -           | `false`, limit clamped      |
//!
//! ## Residency and the resource manager
//!
//! A standalone cache exposes its load and mark operations directly. Once
//! a cache is handed to [`ResourceManager`](crate::resource::ResourceManager)
//! the manager owns it and only hands out `&ImageCache`; residency then
//! follows request counts, and reconfiguration goes through
//! `ResourceManager::apply_cache_settings`.
//!
//! ## Thread Safety
//!
//! `ImageCache` is a single-threaded core. Every mutation, including policy
//! swaps, needs `&mut self`; [`SharedImageCache`] puts it behind a
//! `parking_lot::Mutex` for the GUI thread and the background loader.
//!
//! ## Example
//!
//! ```
//! use imgcache::backend::MemoryBackend;
//! use imgcache::cache::ImageCache;
//! use imgcache::image::{ImageId, ImageInfo, PixelFormat};
//! use imgcache::policy::ReplacementPolicyKind;
//!
//! let backend = MemoryBackend::new()
//!     .with_image("logo.png", ImageInfo::new(10, 10, PixelFormat::Argb8888))
//!     .with_image("wallpaper.png", ImageInfo::new(20, 10, PixelFormat::Argb8888));
//!
//! let mut cache = ImageCache::new(
//!     backend,
//!     1000,
//!     ReplacementPolicyKind::Lru,
//!     ReplacementPolicyKind::Fifo,
//! );
//! cache.load_img("logo.png", ImageId(1)).unwrap();
//! cache.mark_as_free(ImageId(1)).unwrap();
//!
//! // 800 more bytes only fit after the free logo is evicted.
//! cache.load_img("wallpaper.png", ImageId(2)).unwrap();
//! assert!(!cache.contains(ImageId(1)));
//! assert_eq!(cache.current_memory_usage(), 800);
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::backend::GraphicsBackend;
use crate::config::CacheSettings;
use crate::error::{CacheError, InvariantError};
use crate::image::ImageId;
use crate::list::ReplacementList;
#[cfg(feature = "metrics")]
use crate::metrics::{
    ImageCacheMetrics, ImageCacheMetricsRecorder, ImageCacheMetricsSnapshot,
    MetricsSnapshotProvider,
};
use crate::policy::{ReplacementPolicy, ReplacementPolicyKind, create_policy};

/// Default size limit: 100 MiB.
pub const DEFAULT_CACHE_SIZE: usize = 100 * 1024 * 1024;

/// Cache handle shared between the GUI thread and the background loader.
pub type SharedImageCache<B> = Arc<Mutex<ImageCache<B>>>;

/// Byte-budgeted cache of decoded images.
#[derive(Debug)]
pub struct ImageCache<B> {
    backend: B,
    size_limit: usize,
    free_list: ReplacementList,
    used_list: ReplacementList,
    free_policy: Box<dyn ReplacementPolicy>,
    used_policy: Box<dyn ReplacementPolicy>,
    /// Image most recently passed to `notify_image_access`; cleared on
    /// every list mutation.
    last_accessed: Option<ImageId>,
    #[cfg(feature = "metrics")]
    metrics: ImageCacheMetrics,
}

impl<B: GraphicsBackend> ImageCache<B> {
    /// Creates a cache with the given size limit and built-in policies.
    pub fn new(
        backend: B,
        size_limit: usize,
        used: ReplacementPolicyKind,
        free: ReplacementPolicyKind,
    ) -> Self {
        Self::with_policies(backend, size_limit, create_policy(used), create_policy(free))
    }

    /// Creates a cache of [`DEFAULT_CACHE_SIZE`] with LRU on both lists.
    pub fn with_defaults(backend: B) -> Self {
        Self::new(
            backend,
            DEFAULT_CACHE_SIZE,
            ReplacementPolicyKind::Lru,
            ReplacementPolicyKind::Lru,
        )
    }

    /// Creates a cache with custom policy objects.
    pub fn with_policies(
        backend: B,
        size_limit: usize,
        used: Box<dyn ReplacementPolicy>,
        free: Box<dyn ReplacementPolicy>,
    ) -> Self {
        debug!(
            size_limit,
            used = %used.kind(),
            free = %free.kind(),
            "image cache created"
        );
        Self {
            backend,
            size_limit,
            free_list: ReplacementList::new(),
            used_list: ReplacementList::new(),
            free_policy: free,
            used_policy: used,
            last_accessed: None,
            #[cfg(feature = "metrics")]
            metrics: ImageCacheMetrics::default(),
        }
    }

    /// Wraps the cache for use from several threads.
    pub fn into_shared(self) -> SharedImageCache<B> {
        Arc::new(Mutex::new(self))
    }

    // -- queries ----------------------------------------------------------

    pub fn cache_size_limit(&self) -> usize {
        self.size_limit
    }

    /// Bytes held by the free and used lists together.
    pub fn current_memory_usage(&self) -> usize {
        self.free_list.size() + self.used_list.size()
    }

    pub fn free_list_size(&self) -> usize {
        self.free_list.size()
    }

    pub fn used_list_size(&self) -> usize {
        self.used_list.size()
    }

    /// Bytes that can be loaded without evicting anything.
    pub fn available_space(&self) -> usize {
        self.size_limit.saturating_sub(self.current_memory_usage())
    }

    /// Recorded decoded size of a resident image.
    pub fn image_size(&self, id: ImageId) -> Option<usize> {
        self.used_list
            .bytes_of(id)
            .or_else(|| self.free_list.bytes_of(id))
    }

    pub fn contains(&self, id: ImageId) -> bool {
        self.used_list.contains(id) || self.free_list.contains(id)
    }

    pub fn is_used(&self, id: ImageId) -> bool {
        self.used_list.contains(id)
    }

    pub fn is_free(&self, id: ImageId) -> bool {
        self.free_list.contains(id)
    }

    pub fn len(&self) -> usize {
        self.free_list.quantity() + self.used_list.quantity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Free list ids, most valuable first, next eviction candidate last.
    pub fn free_ids(&self) -> Vec<ImageId> {
        self.free_list.ids()
    }

    /// Used list ids in policy order.
    pub fn used_ids(&self) -> Vec<ImageId> {
        self.used_list.ids()
    }

    pub fn free_policy_kind(&self) -> ReplacementPolicyKind {
        self.free_policy.kind()
    }

    pub fn used_policy_kind(&self) -> ReplacementPolicyKind {
        self.used_policy.kind()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    // -- budget -----------------------------------------------------------

    /// Sets the size limit.
    ///
    /// Shrinking below the current usage evicts free images. If the target
    /// cannot be reached the limit is clamped to the lowest achievable
    /// value (the usage after maximal eviction) and `false` is returned.
    pub fn set_cache_size_limit(&mut self, limit: usize) -> bool {
        let usage = self.current_memory_usage();
        if limit >= usage {
            self.size_limit = limit;
            #[cfg(feature = "metrics")]
            self.metrics.record_limit_change(false);
            debug!(limit, usage, "cache size limit set");
            return true;
        }

        if self.free_space(usage - limit) {
            self.size_limit = limit;
            #[cfg(feature = "metrics")]
            self.metrics.record_limit_change(false);
            debug!(limit, usage = self.current_memory_usage(), "cache size limit reduced");
            true
        } else {
            self.size_limit = self.current_memory_usage();
            #[cfg(feature = "metrics")]
            self.metrics.record_limit_change(true);
            warn!(
                requested = limit,
                applied = self.size_limit,
                "cache size limit clamped; remaining images are in use"
            );
            false
        }
    }

    /// Evicts free images until `bytes` have been released.
    ///
    /// Returns `false` if the free list ran dry first. Evictions already
    /// done are kept.
    pub fn free_space(&mut self, bytes: usize) -> bool {
        let mut freed = 0usize;
        while freed < bytes {
            match self.evict_one() {
                Some(released) => freed += released,
                None => break,
            }
        }
        if freed < bytes {
            debug!(requested = bytes, freed, "free list exhausted");
        }
        freed >= bytes
    }

    fn evict_one(&mut self) -> Option<usize> {
        let id = self.free_policy.select_eviction_candidate(&self.free_list)?;
        let bytes = self.free_list.remove(id)?;
        self.backend.unload_image(id);
        self.last_accessed = None;
        #[cfg(feature = "metrics")]
        self.metrics.record_eviction(bytes);
        debug!(id = %id, bytes, "evicted image from free list");
        Some(bytes)
    }

    // -- loading ----------------------------------------------------------

    /// Loads an image into the used list, evicting free images as needed.
    ///
    /// An image that is already used is left alone; one that is free is
    /// moved to the used list without reloading.
    pub fn load_img(&mut self, path: &str, id: ImageId) -> Result<(), CacheError> {
        if self.used_list.contains(id) {
            return Ok(());
        }
        if self.free_list.contains(id) {
            return self.mark_as_used(id);
        }
        if path.is_empty() {
            return Err(CacheError::NoPath(id));
        }

        let required = match self.backend.probe(path) {
            Ok(info) => info.byte_size(),
            Err(err) => {
                #[cfg(feature = "metrics")]
                self.metrics.record_load_failure();
                warn!(id = %id, error = %err, "image probe failed");
                return Err(err.into());
            },
        };
        self.reserve(id, required)?;

        let bytes = match self.backend.load_image(path, id) {
            Ok(info) => info.byte_size(),
            Err(err) => {
                #[cfg(feature = "metrics")]
                self.metrics.record_load_failure();
                warn!(id = %id, error = %err, "image load failed");
                return Err(err.into());
            },
        };
        if bytes > required {
            // Decoded size disagrees with the probe; the budget still holds.
            if let Err(err) = self.reserve(id, bytes) {
                self.backend.unload_image(id);
                return Err(err);
            }
        }

        self.used_policy
            .order_on_insert(&mut self.used_list, id, bytes);
        self.last_accessed = None;
        #[cfg(feature = "metrics")]
        self.metrics.record_load(bytes);
        debug!(id = %id, bytes, path, "image loaded");
        Ok(())
    }

    /// Makes sure `bytes` fit, evicting free images if necessary.
    fn reserve(&mut self, id: ImageId, bytes: usize) -> Result<(), CacheError> {
        let available = self.available_space();
        if bytes <= available || self.free_space(bytes - available) {
            return Ok(());
        }
        #[cfg(feature = "metrics")]
        self.metrics.record_load_failure();
        let available = self.available_space();
        warn!(id = %id, required = bytes, available, "image does not fit into cache");
        Err(CacheError::BudgetExceeded {
            id,
            required: bytes,
            available,
        })
    }

    /// Loads an image into the free list without evicting anything.
    ///
    /// Used to warm images ahead of their first request. Fails once the
    /// cache is full, so earlier preloads are never displaced by later ones.
    pub fn preload_img(&mut self, path: &str, id: ImageId) -> Result<(), CacheError> {
        if self.contains(id) {
            return Ok(());
        }
        if path.is_empty() {
            return Err(CacheError::NoPath(id));
        }

        let required = self.backend.probe(path)?.byte_size();
        let available = self.available_space();
        if required > available {
            #[cfg(feature = "metrics")]
            self.metrics.record_preload_rejected();
            debug!(id = %id, required, available, "preload skipped, cache full");
            return Err(CacheError::BudgetExceeded {
                id,
                required,
                available,
            });
        }

        let bytes = self.backend.load_image(path, id)?.byte_size();
        let available = self.available_space();
        if bytes > available {
            self.backend.unload_image(id);
            #[cfg(feature = "metrics")]
            self.metrics.record_preload_rejected();
            return Err(CacheError::BudgetExceeded {
                id,
                required: bytes,
                available,
            });
        }

        self.free_policy
            .order_on_insert(&mut self.free_list, id, bytes);
        self.last_accessed = None;
        #[cfg(feature = "metrics")]
        self.metrics.record_preload(bytes);
        debug!(id = %id, bytes, path, "image preloaded");
        Ok(())
    }

    /// Adds an image the backend already holds, without reloading it.
    ///
    /// Used when a cache is attached to a resource manager that has been
    /// loading directly. The limit grows if the adopted images overflow it.
    pub(crate) fn adopt_loaded(&mut self, id: ImageId, bytes: usize, in_use: bool) {
        if self.contains(id) {
            return;
        }
        if in_use {
            self.used_policy
                .order_on_insert(&mut self.used_list, id, bytes);
        } else {
            self.free_policy
                .order_on_insert(&mut self.free_list, id, bytes);
        }
        self.last_accessed = None;
        let usage = self.current_memory_usage();
        if usage > self.size_limit && !self.free_space(usage - self.size_limit) {
            self.size_limit = self.current_memory_usage();
            warn!(limit = self.size_limit, "cache size limit raised to fit adopted images");
        }
    }

    // -- list transitions -------------------------------------------------

    /// Moves a free image to the used list.
    pub fn mark_as_used(&mut self, id: ImageId) -> Result<(), CacheError> {
        if self.used_list.contains(id) {
            return Ok(());
        }
        let Some(bytes) = self.free_list.remove(id) else {
            warn!(id = %id, "mark_as_used on an image that is not resident");
            return Err(CacheError::NotResident(id));
        };
        self.used_policy
            .order_on_insert(&mut self.used_list, id, bytes);
        self.last_accessed = None;
        #[cfg(feature = "metrics")]
        self.metrics.record_mark_used();
        trace!(id = %id, "image marked as used");
        Ok(())
    }

    /// Moves a used image to the free list, making it evictable.
    pub fn mark_as_free(&mut self, id: ImageId) -> Result<(), CacheError> {
        if self.free_list.contains(id) {
            return Ok(());
        }
        let Some(bytes) = self.used_list.remove(id) else {
            warn!(id = %id, "mark_as_free on an image that is not resident");
            return Err(CacheError::NotResident(id));
        };
        self.free_policy
            .order_on_insert(&mut self.free_list, id, bytes);
        self.last_accessed = None;
        #[cfg(feature = "metrics")]
        self.metrics.record_mark_free();
        trace!(id = %id, "image marked as free");
        Ok(())
    }

    /// Unloads an image regardless of policy order.
    ///
    /// Returns `false` if the image was not resident.
    pub fn unload_specific_image(&mut self, id: ImageId) -> bool {
        let Some(bytes) = self
            .free_list
            .remove(id)
            .or_else(|| self.used_list.remove(id))
        else {
            return false;
        };
        self.backend.unload_image(id);
        self.last_accessed = None;
        #[cfg(feature = "metrics")]
        self.metrics.record_unload(bytes);
        debug!(id = %id, bytes, "image unloaded");
        true
    }

    /// Unloads every resident image.
    pub fn unload_all(&mut self) {
        while let Some((id, _)) = self.free_list.remove_from_end() {
            self.backend.unload_image(id);
        }
        while let Some((id, _)) = self.used_list.remove_from_end() {
            self.backend.unload_image(id);
        }
        self.last_accessed = None;
    }

    // -- access notification ----------------------------------------------

    /// Records a draw-time access so recency policies can reorder.
    pub fn notify_image_access(&mut self, id: ImageId) {
        #[cfg(feature = "metrics")]
        self.metrics.record_access();
        if self.last_accessed == Some(id) {
            #[cfg(feature = "metrics")]
            self.metrics.record_access_fast_path();
            return;
        }

        let resident = if self.used_list.contains(id) {
            self.used_policy.order_on_access(&mut self.used_list, id);
            true
        } else if self.free_list.contains(id) {
            self.free_policy.order_on_access(&mut self.free_list, id);
            true
        } else {
            false
        };

        if resident {
            self.last_accessed = Some(id);
            trace!(id = %id, "image access");
        }
    }

    // -- reconfiguration --------------------------------------------------

    /// Replaces the free list's policy and re-sorts its contents.
    ///
    /// Intended for start-up; swapping on a populated cache is allowed but
    /// logged.
    pub fn set_free_replacement_policy(&mut self, kind: ReplacementPolicyKind) {
        self.set_free_replacement_policy_with(create_policy(kind));
    }

    pub fn set_free_replacement_policy_with(&mut self, policy: Box<dyn ReplacementPolicy>) {
        if !self.free_list.is_empty() {
            warn!(
                entries = self.free_list.quantity(),
                "replacing free list policy on a populated cache"
            );
        }
        let old = std::mem::replace(&mut self.free_policy, policy);
        copy_cache_contents(&mut self.free_list, old.as_ref(), self.free_policy.as_ref());
        self.last_accessed = None;
        #[cfg(feature = "metrics")]
        self.metrics.record_policy_swap();
    }

    /// Replaces the used list's policy and re-sorts its contents.
    pub fn set_used_replacement_policy(&mut self, kind: ReplacementPolicyKind) {
        self.set_used_replacement_policy_with(create_policy(kind));
    }

    pub fn set_used_replacement_policy_with(&mut self, policy: Box<dyn ReplacementPolicy>) {
        if !self.used_list.is_empty() {
            warn!(
                entries = self.used_list.quantity(),
                "replacing used list policy on a populated cache"
            );
        }
        let old = std::mem::replace(&mut self.used_policy, policy);
        copy_cache_contents(&mut self.used_list, old.as_ref(), self.used_policy.as_ref());
        self.last_accessed = None;
        #[cfg(feature = "metrics")]
        self.metrics.record_policy_swap();
    }

    /// Applies parsed configuration: both policies, then the size limit.
    ///
    /// Returns the result of [`set_cache_size_limit`](Self::set_cache_size_limit).
    pub fn apply_settings(&mut self, settings: &CacheSettings) -> bool {
        if self.used_policy.kind() != settings.used_policy {
            self.set_used_replacement_policy(settings.used_policy);
        }
        if self.free_policy.kind() != settings.free_policy {
            self.set_free_replacement_policy(settings.free_policy);
        }
        self.set_cache_size_limit(settings.size_limit)
    }

    // -- diagnostics ------------------------------------------------------

    /// Verifies list disjointness and the byte budget.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        for (id, _) in self.free_list.iter() {
            if self.used_list.contains(id) {
                return Err(InvariantError::new(format!(
                    "image {id} is in both the free and the used list"
                )));
            }
        }
        for (name, list) in [("free", &self.free_list), ("used", &self.used_list)] {
            let (count, bytes) = list
                .iter()
                .fold((0usize, 0usize), |(c, b), (_, size)| (c + 1, b + size));
            if count != list.quantity() {
                return Err(InvariantError::new(format!(
                    "{name} list holds {count} entries but reports {}",
                    list.quantity()
                )));
            }
            if bytes != list.size() {
                return Err(InvariantError::new(format!(
                    "{name} list holds {bytes} bytes but reports {}",
                    list.size()
                )));
            }
        }
        if self.current_memory_usage() > self.size_limit {
            return Err(InvariantError::new(format!(
                "usage {} exceeds limit {}",
                self.current_memory_usage(),
                self.size_limit
            )));
        }
        Ok(())
    }

    #[cfg(feature = "metrics")]
    pub fn metrics_snapshot(&self) -> ImageCacheMetricsSnapshot {
        let mut snap = self.metrics.snapshot();
        snap.free_entries = self.free_list.quantity();
        snap.used_entries = self.used_list.quantity();
        snap.memory_usage = self.current_memory_usage();
        snap.size_limit = self.size_limit;
        snap
    }
}

/// Re-inserts every entry of `list` under `to`'s ordering rule.
///
/// Entries are replayed from the end to the front so that front-inserting
/// policies keep the existing relative order.
fn copy_cache_contents(
    list: &mut ReplacementList,
    from: &dyn ReplacementPolicy,
    to: &dyn ReplacementPolicy,
) {
    let entries: Vec<_> = list.iter().collect();
    list.clear();
    for &(id, bytes) in entries.iter().rev() {
        to.order_on_insert(list, id, bytes);
    }
    debug!(
        from = %from.kind(),
        to = %to.kind(),
        entries = entries.len(),
        "replacement policy swapped"
    );
}

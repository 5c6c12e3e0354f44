//! Builder for [`ImageCache`] instances.
//!
//! Collects the size limit and both replacement policies, then binds them to
//! a backend in one step.
//!
//! ## Example
//!
//! ```rust
//! use imgcache::backend::MemoryBackend;
//! use imgcache::builder::ImageCacheBuilder;
//! use imgcache::policy::ReplacementPolicyKind;
//!
//! let cache = ImageCacheBuilder::new(4 * 1024 * 1024)
//!     .free_policy(ReplacementPolicyKind::Greedy)
//!     .build(MemoryBackend::new());
//! assert_eq!(cache.cache_size_limit(), 4 * 1024 * 1024);
//! assert_eq!(cache.used_policy_kind(), ReplacementPolicyKind::Lru);
//! assert_eq!(cache.free_policy_kind(), ReplacementPolicyKind::Greedy);
//! ```

use crate::backend::GraphicsBackend;
use crate::cache::{ImageCache, SharedImageCache};
use crate::config::CacheSettings;
use crate::policy::{ReplacementPolicy, ReplacementPolicyKind, create_policy};

/// Builder for creating image caches.
#[derive(Debug)]
pub struct ImageCacheBuilder {
    size_limit: usize,
    used: Box<dyn ReplacementPolicy>,
    free: Box<dyn ReplacementPolicy>,
}

impl ImageCacheBuilder {
    /// Create a new builder with the given size limit and LRU on both lists.
    pub fn new(size_limit: usize) -> Self {
        Self {
            size_limit,
            used: create_policy(ReplacementPolicyKind::Lru),
            free: create_policy(ReplacementPolicyKind::Lru),
        }
    }

    /// Start from parsed configuration.
    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::new(settings.size_limit).settings(settings)
    }

    pub fn size_limit(mut self, size_limit: usize) -> Self {
        self.size_limit = size_limit;
        self
    }

    pub fn used_policy(mut self, kind: ReplacementPolicyKind) -> Self {
        self.used = create_policy(kind);
        self
    }

    pub fn free_policy(mut self, kind: ReplacementPolicyKind) -> Self {
        self.free = create_policy(kind);
        self
    }

    /// Use a custom policy object for the used list.
    pub fn used_policy_with(mut self, policy: Box<dyn ReplacementPolicy>) -> Self {
        self.used = policy;
        self
    }

    /// Use a custom policy object for the free list.
    pub fn free_policy_with(mut self, policy: Box<dyn ReplacementPolicy>) -> Self {
        self.free = policy;
        self
    }

    /// Overwrite limit and both policies.
    pub fn settings(self, settings: &CacheSettings) -> Self {
        self.size_limit(settings.size_limit)
            .used_policy(settings.used_policy)
            .free_policy(settings.free_policy)
    }

    pub fn build<B: GraphicsBackend>(self, backend: B) -> ImageCache<B> {
        ImageCache::with_policies(backend, self.size_limit, self.used, self.free)
    }

    pub fn build_shared<B: GraphicsBackend>(self, backend: B) -> SharedImageCache<B> {
        self.build(backend).into_shared()
    }
}

impl Default for ImageCacheBuilder {
    fn default() -> Self {
        Self::from_settings(&CacheSettings::default())
    }
}

//! # Resource Manager
//!
//! Maps image ids to source paths and owns each image's request count. It
//! is the only component that drives the cache's load and residency
//! operations; widgets only ever request and free ids.
//!
//! ```text
//!   request_image_resource(id)                 free_image_resource(id)
//!            │                                          │
//!            ▼                                          ▼
//!     count 0 → 1 ?                              count 1 → 0 ?
//!      │ resident: mark_as_used                   │ permanent:     mark_as_free
//!      │ else:     load_img                       │ non-permanent: unload_specific_image
//!      ▼                                          ▼ dynamic, not kept: id recycled
//!   ┌──────────────────────────── ImageLoader ────────────────────────────┐
//!   │  Direct(B)           backend called directly, no budget             │
//!   │  Cached(ImageCache)  budgeted, free/used lists, eviction            │
//!   └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Prefetching
//!
//! [`add_to_prefetch_queue`](ResourceManager::add_to_prefetch_queue) queues
//! an id for warming without requesting it. Each
//! [`prefetch_now`](ResourceManager::prefetch_now) first unloads images whose
//! prefetch was cancelled after they had already been loaded, then preloads
//! one queued id. The [`BackgroundImageLoader`](crate::loader::BackgroundImageLoader)
//! calls it from its worker thread; tests and single-threaded hosts call it
//! directly.
//!
//! ## Dynamic ids
//!
//! [`register_dynamic_image`](ResourceManager::register_dynamic_image) hands
//! out ids from `first_dynamic_id` upward, reusing released ids first. A
//! dynamic, non-permanent image is unregistered as soon as its request count
//! drops to zero, unless [`keep_dynamic_images`](ResourceManager::keep_dynamic_images)
//! is enabled.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::backend::GraphicsBackend;
use crate::cache::ImageCache;
use crate::config::CacheSettings;
use crate::error::ResourceError;
use crate::image::ImageId;
use crate::loader::Signal;
use crate::policy::ReplacementPolicyKind;

/// Default pause between two prefetch steps.
pub const DEFAULT_PREFETCH_DELAY: Duration = Duration::from_millis(50);

/// Default lowest id handed out by `register_dynamic_image`.
pub const DEFAULT_FIRST_DYNAMIC_ID: u32 = 0x0001_0000;

/// Registration record of one image id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry {
    pub path: String,
    pub permanent: bool,
    pub dynamic: bool,
    pub request_count: u32,
}

impl ImageEntry {
    fn new(path: String, permanent: bool, dynamic: bool) -> Self {
        Self {
            path,
            permanent,
            dynamic,
            request_count: 0,
        }
    }
}

/// Where loads go: straight to the backend, or through the cache.
#[derive(Debug)]
enum ImageLoader<B> {
    Direct(B),
    Cached(ImageCache<B>),
}

/// What a single queued prefetch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchStep {
    /// The image was loaded into the free list (or directly).
    Loaded(ImageId),
    /// Nothing to do, the image was already resident.
    AlreadyResident(ImageId),
    /// Not loaded: unknown id, no path, full cache or backend failure.
    Skipped(ImageId),
}

/// Result of one [`ResourceManager::prefetch_now`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrefetchOutcome {
    /// Images unloaded because their prefetch was cancelled.
    pub released: usize,
    /// The queued id processed in this step, if any.
    pub step: Option<PrefetchStep>,
    /// Ids still waiting in the queue.
    pub remaining: usize,
}

impl PrefetchOutcome {
    pub fn is_idle(&self) -> bool {
        self.released == 0 && self.step.is_none()
    }
}

/// Image registry and request counter in front of the cache.
#[derive(Debug)]
pub struct ResourceManager<B> {
    /// `None` only while `create_image_cache` moves the backend.
    loader: Option<ImageLoader<B>>,
    images: FxHashMap<ImageId, ImageEntry>,
    first_dynamic_id: u32,
    next_dynamic_id: u32,
    recycled_ids: Vec<ImageId>,
    keep_dynamic: bool,
    preload_permanent: bool,
    prefetch_queue: VecDeque<ImageId>,
    pending_releases: Vec<ImageId>,
    prefetch_delay: Duration,
    prefetch_signal: Option<Arc<Signal>>,
}

impl<B: GraphicsBackend> ResourceManager<B> {
    /// Manager without a cache: every load and unload goes to `backend`.
    pub fn new(backend: B) -> Self {
        Self::with_loader(ImageLoader::Direct(backend))
    }

    /// Manager that loads through `cache`.
    pub fn with_cache(cache: ImageCache<B>) -> Self {
        Self::with_loader(ImageLoader::Cached(cache))
    }

    fn with_loader(loader: ImageLoader<B>) -> Self {
        Self {
            loader: Some(loader),
            images: FxHashMap::default(),
            first_dynamic_id: DEFAULT_FIRST_DYNAMIC_ID,
            next_dynamic_id: DEFAULT_FIRST_DYNAMIC_ID,
            recycled_ids: Vec::new(),
            keep_dynamic: false,
            preload_permanent: false,
            prefetch_queue: VecDeque::new(),
            pending_releases: Vec::new(),
            prefetch_delay: DEFAULT_PREFETCH_DELAY,
            prefetch_signal: None,
        }
    }

    /// Sets the lowest dynamic id. Call before registering dynamic images.
    pub fn with_first_dynamic_id(mut self, first: u32) -> Self {
        self.first_dynamic_id = first;
        self.next_dynamic_id = first;
        self
    }

    pub fn first_dynamic_id(&self) -> u32 {
        self.first_dynamic_id
    }

    // -- cache attachment -------------------------------------------------

    /// Switches from direct loading to a cache with the given settings.
    ///
    /// Returns `false` without changing anything if a cache already exists.
    /// Images the backend already holds are adopted into the cache.
    pub fn create_image_cache(
        &mut self,
        size_limit: usize,
        used: ReplacementPolicyKind,
        free: ReplacementPolicyKind,
    ) -> bool {
        let backend = match self.loader.take() {
            Some(ImageLoader::Direct(backend)) => backend,
            other => {
                self.loader = other;
                warn!("image cache already exists");
                return false;
            },
        };

        let mut cache = ImageCache::new(backend, size_limit, used, free);
        for (&id, entry) in &self.images {
            if entry.path.is_empty() {
                continue;
            }
            if let Some(bytes) = cache.backend().image_size(id) {
                cache.adopt_loaded(id, bytes, entry.request_count > 0);
            }
        }
        debug!(size_limit, adopted = cache.len(), "image cache attached");
        self.loader = Some(ImageLoader::Cached(cache));
        true
    }

    pub fn has_image_cache(&self) -> bool {
        self.image_cache().is_some()
    }

    /// Read access to the cache. Residency changes go through the manager
    /// so request counts and list membership stay in step.
    pub fn image_cache(&self) -> Option<&ImageCache<B>> {
        match &self.loader {
            Some(ImageLoader::Cached(cache)) => Some(cache),
            _ => None,
        }
    }

    fn image_cache_mut(&mut self) -> Option<&mut ImageCache<B>> {
        match &mut self.loader {
            Some(ImageLoader::Cached(cache)) => Some(cache),
            _ => None,
        }
    }

    pub fn backend(&self) -> Option<&B> {
        match self.loader.as_ref()? {
            ImageLoader::Direct(backend) => Some(backend),
            ImageLoader::Cached(cache) => Some(cache.backend()),
        }
    }

    /// Forwards a draw-time access to the cache, if there is one.
    pub fn notify_image_access(&mut self, id: ImageId) {
        if let Some(cache) = self.image_cache_mut() {
            cache.notify_image_access(id);
        }
    }

    /// Changes the cache budget. `None` without a cache.
    ///
    /// See [`ImageCache::set_cache_size_limit`] for the clamping rule.
    pub fn set_cache_size_limit(&mut self, limit: usize) -> Option<bool> {
        self.image_cache_mut().map(|cache| cache.set_cache_size_limit(limit))
    }

    /// Applies policies and budget from a configuration entry. `None`
    /// without a cache.
    pub fn apply_cache_settings(&mut self, settings: &CacheSettings) -> Option<bool> {
        self.image_cache_mut().map(|cache| cache.apply_settings(settings))
    }

    // -- registration -----------------------------------------------------

    /// Binds `id` to `path`.
    ///
    /// Re-registering a loaded id unloads the old image first; if the id is
    /// currently requested the new path is loaded straight away.
    pub fn register_image_resource(
        &mut self,
        path: impl Into<String>,
        id: ImageId,
        permanent: bool,
    ) {
        let path = path.into();
        let mut request_count = 0;
        if let Some(old) = self.images.get(&id) {
            if old.path == path {
                if let Some(entry) = self.images.get_mut(&id) {
                    entry.permanent = permanent;
                }
                return;
            }
            request_count = old.request_count;
            if self.is_loaded(id) {
                warn!(id = %id, old = %old.path, new = %path, "re-registering a loaded image");
                self.unload(id);
            }
        }

        debug!(id = %id, path = %path, permanent, "image registered");
        let mut entry = ImageEntry::new(path, permanent, false);
        entry.request_count = request_count;
        self.images.insert(id, entry);

        if request_count > 0 {
            if let Err(err) = self.load_requested(id) {
                warn!(id = %id, error = %err, "reloading re-registered image failed");
            }
        } else if permanent && self.preload_permanent {
            self.preload(id);
        }
    }

    /// Registers `path` under a freshly allocated dynamic id.
    pub fn register_dynamic_image(&mut self, path: impl Into<String>, permanent: bool) -> ImageId {
        let id = self.allocate_dynamic_id();
        let path = path.into();
        debug!(id = %id, path = %path, permanent, "dynamic image registered");
        self.images.insert(id, ImageEntry::new(path, permanent, true));
        if permanent && self.preload_permanent {
            self.preload(id);
        }
        id
    }

    fn allocate_dynamic_id(&mut self) -> ImageId {
        while let Some(id) = self.recycled_ids.pop() {
            if !self.images.contains_key(&id) {
                return id;
            }
        }
        loop {
            let id = ImageId(self.next_dynamic_id);
            self.next_dynamic_id = self.next_dynamic_id.wrapping_add(1).max(self.first_dynamic_id);
            if !self.images.contains_key(&id) && !id.is_dummy() {
                return id;
            }
        }
    }

    fn release_dynamic_id(&mut self, id: ImageId) {
        if self.is_loaded(id) {
            self.unload(id);
        }
        self.images.remove(&id);
        self.prefetch_queue.retain(|&queued| queued != id);
        self.pending_releases.retain(|&pending| pending != id);
        self.recycled_ids.push(id);
        debug!(id = %id, "dynamic image id released");
    }

    /// Enables or disables keeping unreferenced dynamic images registered.
    ///
    /// Disabling releases every dynamic id whose request count is zero.
    pub fn keep_dynamic_images(&mut self, keep: bool) {
        self.keep_dynamic = keep;
        if keep {
            return;
        }
        let idle: Vec<ImageId> = self
            .images
            .iter()
            .filter(|(_, entry)| entry.dynamic && entry.request_count == 0)
            .map(|(&id, _)| id)
            .collect();
        for id in idle {
            self.release_dynamic_id(id);
        }
    }

    /// Preload permanent images as they are registered.
    ///
    /// Images registered before enabling are not preloaded.
    pub fn enable_preloading(&mut self, enabled: bool) {
        self.preload_permanent = enabled;
    }

    // -- request / free ---------------------------------------------------

    /// Takes a reference to an image, loading it on the first request.
    ///
    /// The count is incremented even if loading fails, so the matching
    /// `free_image_resource` stays balanced.
    pub fn request_image_resource(&mut self, id: ImageId) -> Result<(), ResourceError> {
        let Some(entry) = self.images.get_mut(&id) else {
            warn!(id = %id, "request for unregistered image");
            return Err(ResourceError::UnknownImage(id));
        };
        entry.request_count += 1;
        if entry.request_count > 1 {
            return Ok(());
        }
        self.pending_releases.retain(|&pending| pending != id);
        self.load_requested(id).inspect_err(|err| {
            warn!(id = %id, error = %err, "image load failed");
        })
    }

    /// Drops a reference; on the last one the image is freed or unloaded.
    pub fn free_image_resource(&mut self, id: ImageId) -> Result<(), ResourceError> {
        let Some(entry) = self.images.get_mut(&id) else {
            warn!(id = %id, "free of unregistered image");
            return Err(ResourceError::UnknownImage(id));
        };
        if entry.request_count == 0 {
            warn!(id = %id, "free without matching request");
            return Err(ResourceError::NotRequested(id));
        }
        entry.request_count -= 1;
        if entry.request_count > 0 {
            return Ok(());
        }

        let permanent = entry.permanent;
        let dynamic = entry.dynamic;
        let has_path = !entry.path.is_empty();
        if has_path {
            match &mut self.loader {
                Some(ImageLoader::Cached(cache)) if permanent => {
                    if cache.mark_as_free(id).is_err() {
                        debug!(id = %id, "freed permanent image was never loaded");
                    }
                },
                Some(ImageLoader::Cached(cache)) => {
                    cache.unload_specific_image(id);
                },
                Some(ImageLoader::Direct(backend)) if !permanent => backend.unload_image(id),
                _ => {},
            }
        }

        if dynamic && !permanent && !self.keep_dynamic {
            self.release_dynamic_id(id);
        }
        Ok(())
    }

    fn load_requested(&mut self, id: ImageId) -> Result<(), ResourceError> {
        let Some(path) = self.images.get(&id).map(|entry| entry.path.as_str()) else {
            return Err(ResourceError::UnknownImage(id));
        };
        if path.is_empty() {
            return Ok(());
        }
        match &mut self.loader {
            Some(ImageLoader::Cached(cache)) if cache.contains(id) => cache.mark_as_used(id)?,
            Some(ImageLoader::Cached(cache)) => cache.load_img(path, id)?,
            Some(ImageLoader::Direct(backend)) if backend.image_info(id).is_none() => {
                backend.load_image(path, id)?;
            },
            _ => {},
        }
        Ok(())
    }

    /// Loads an unreferenced image; failures are logged and dropped.
    fn preload(&mut self, id: ImageId) -> PrefetchStep {
        let Some(path) = self
            .images
            .get(&id)
            .map(|entry| entry.path.as_str())
            .filter(|path| !path.is_empty())
        else {
            return PrefetchStep::Skipped(id);
        };
        let Some(loader) = &mut self.loader else {
            return PrefetchStep::Skipped(id);
        };
        let result = match loader {
            ImageLoader::Cached(cache) if cache.contains(id) => {
                return PrefetchStep::AlreadyResident(id);
            },
            ImageLoader::Cached(cache) => cache.preload_img(path, id).map_err(ResourceError::from),
            ImageLoader::Direct(backend) if backend.image_info(id).is_some() => {
                return PrefetchStep::AlreadyResident(id);
            },
            ImageLoader::Direct(backend) => backend
                .load_image(path, id)
                .map(|_| ())
                .map_err(ResourceError::from),
        };
        match result {
            Ok(()) => PrefetchStep::Loaded(id),
            Err(err) => {
                debug!(id = %id, error = %err, "preload skipped");
                PrefetchStep::Skipped(id)
            },
        }
    }

    fn unload(&mut self, id: ImageId) {
        match &mut self.loader {
            Some(ImageLoader::Cached(cache)) => {
                cache.unload_specific_image(id);
            },
            Some(ImageLoader::Direct(backend)) => backend.unload_image(id),
            None => {},
        }
    }

    // -- prefetch queue ---------------------------------------------------

    /// Queues an image for background loading without requesting it.
    ///
    /// Wakes an attached [`BackgroundImageLoader`](crate::loader::BackgroundImageLoader).
    /// Returns `false` for unknown or already queued ids.
    pub fn add_to_prefetch_queue(&mut self, id: ImageId) -> bool {
        if !self.images.contains_key(&id) {
            warn!(id = %id, "prefetch of unregistered image");
            return false;
        }
        self.pending_releases.retain(|&pending| pending != id);
        if self.prefetch_queue.contains(&id) {
            return false;
        }
        self.prefetch_queue.push_back(id);
        self.wake_prefetcher();
        true
    }

    /// Cancels a prefetch.
    ///
    /// A queued id is simply dropped. An id that was already prefetched and
    /// is still unreferenced is scheduled for unloading on the next
    /// `prefetch_now`. Returns `false` if neither applies.
    pub fn remove_from_prefetch_queue(&mut self, id: ImageId) -> bool {
        if let Some(pos) = self.prefetch_queue.iter().position(|&queued| queued == id) {
            self.prefetch_queue.remove(pos);
            return true;
        }
        let unreferenced = self
            .images
            .get(&id)
            .is_some_and(|entry| entry.request_count == 0);
        if unreferenced && self.is_loaded(id) {
            if !self.pending_releases.contains(&id) {
                self.pending_releases.push(id);
                self.wake_prefetcher();
            }
            return true;
        }
        false
    }

    pub fn set_prefetch_delay(&mut self, delay: Duration) {
        self.prefetch_delay = delay;
    }

    pub fn prefetch_delay(&self) -> Duration {
        self.prefetch_delay
    }

    pub fn prefetch_queue_len(&self) -> usize {
        self.prefetch_queue.len()
    }

    /// Whether `prefetch_now` would do anything.
    pub fn has_prefetch_work(&self) -> bool {
        !self.prefetch_queue.is_empty() || !self.pending_releases.is_empty()
    }

    /// Runs pending releases, then prefetches one queued image.
    pub fn prefetch_now(&mut self) -> PrefetchOutcome {
        let mut outcome = PrefetchOutcome::default();

        for id in std::mem::take(&mut self.pending_releases) {
            let unreferenced = self
                .images
                .get(&id)
                .is_some_and(|entry| entry.request_count == 0);
            if unreferenced && self.is_loaded(id) {
                self.unload(id);
                outcome.released += 1;
            }
        }

        if let Some(id) = self.prefetch_queue.pop_front() {
            outcome.step = Some(self.preload(id));
        }
        outcome.remaining = self.prefetch_queue.len();
        outcome
    }

    // -- queries ----------------------------------------------------------

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn image_entry(&self, id: ImageId) -> Option<&ImageEntry> {
        self.images.get(&id)
    }

    pub fn image_path(&self, id: ImageId) -> Option<&str> {
        self.images.get(&id).map(|entry| entry.path.as_str())
    }

    pub fn image_request_count(&self, id: ImageId) -> Option<u32> {
        self.images.get(&id).map(|entry| entry.request_count)
    }

    pub fn is_dynamic_image(&self, id: ImageId) -> bool {
        self.images.get(&id).is_some_and(|entry| entry.dynamic)
    }

    pub fn is_image_permanent(&self, id: ImageId) -> bool {
        self.images.get(&id).is_some_and(|entry| entry.permanent)
    }

    /// Decoded size of a loaded image.
    pub fn image_size(&self, id: ImageId) -> Option<usize> {
        match self.loader.as_ref()? {
            ImageLoader::Cached(cache) => cache.image_size(id),
            ImageLoader::Direct(backend) => backend.image_size(id),
        }
    }

    pub fn is_loaded(&self, id: ImageId) -> bool {
        self.image_size(id).is_some()
    }
}

impl<B> ResourceManager<B> {
    /// Hooks a loader's semaphore to the queue. One permit is released per
    /// queued id, plus one if releases are pending.
    pub(crate) fn attach_prefetch_signal(&mut self, signal: Arc<Signal>) {
        if self.prefetch_signal.is_some() {
            warn!("replacing the background loader of this resource manager");
        }
        let pending = self.prefetch_queue.len() + usize::from(!self.pending_releases.is_empty());
        for _ in 0..pending {
            signal.release();
        }
        self.prefetch_signal = Some(signal);
    }

    pub(crate) fn detach_prefetch_signal(&mut self, signal: &Arc<Signal>) {
        if self
            .prefetch_signal
            .as_ref()
            .is_some_and(|attached| Arc::ptr_eq(attached, signal))
        {
            self.prefetch_signal = None;
        }
    }

    fn wake_prefetcher(&self) {
        if let Some(signal) = &self.prefetch_signal {
            signal.release();
        }
    }
}

//! Error types for the imgcache library.
//!
//! ## Key Components
//!
//! - [`CacheError`]: Returned by cache operations that cannot complete
//!   (budget exhausted, image not resident, backend failure).
//! - [`BackendError`]: Returned by [`GraphicsBackend`](crate::backend::GraphicsBackend)
//!   implementations when probing or decoding an image fails.
//! - [`ResourceError`]: Returned by the resource manager for unknown ids
//!   and unbalanced request/free calls.
//! - [`ConfigError`]: Returned when cache configuration is malformed.
//! - [`InvariantError`]: Returned by `check_invariants` when internal
//!   bookkeeping is inconsistent.
//!
//! None of these are raised as panics. A failed image load is an accepted
//! degraded mode: the caller logs it and draws without the image.
//!
//! ## Example Usage
//!
//! ```
//! use imgcache::backend::MemoryBackend;
//! use imgcache::cache::ImageCache;
//! use imgcache::error::CacheError;
//! use imgcache::image::{ImageId, ImageInfo, PixelFormat};
//! use imgcache::policy::ReplacementPolicyKind;
//!
//! let mut backend = MemoryBackend::new();
//! backend.add_image("big.png", ImageInfo::new(100, 100, PixelFormat::Argb8888));
//!
//! let mut cache = ImageCache::new(
//!     backend,
//!     1024,
//!     ReplacementPolicyKind::Lru,
//!     ReplacementPolicyKind::Lru,
//! );
//! let err = cache.load_img("big.png", ImageId(1)).unwrap_err();
//! assert!(matches!(err, CacheError::BudgetExceeded { .. }));
//! ```

use std::fmt;

use crate::image::ImageId;

// ---------------------------------------------------------------------------
// CacheError
// ---------------------------------------------------------------------------

/// Error returned by [`ImageCache`](crate::cache::ImageCache) operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The image does not fit even after evicting every free image (or,
    /// for preloading, without evicting anything).
    BudgetExceeded {
        id: ImageId,
        required: usize,
        available: usize,
    },
    /// The image is in neither the free nor the used list.
    NotResident(ImageId),
    /// The image has no source path, so it cannot be (re)loaded.
    NoPath(ImageId),
    /// The graphics backend failed to probe or decode the image.
    Backend(BackendError),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::BudgetExceeded {
                id,
                required,
                available,
            } => write!(
                f,
                "image {id} needs {required} bytes but only {available} bytes can be made available"
            ),
            CacheError::NotResident(id) => write!(f, "image {id} is not resident in the cache"),
            CacheError::NoPath(id) => write!(f, "image {id} has no source path"),
            CacheError::Backend(err) => write!(f, "graphics backend: {err}"),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Backend(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BackendError> for CacheError {
    fn from(err: BackendError) -> Self {
        CacheError::Backend(err)
    }
}

// ---------------------------------------------------------------------------
// BackendError
// ---------------------------------------------------------------------------

/// Error reported by a graphics backend for a specific image path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    path: String,
    message: String,
}

impl BackendError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl std::error::Error for BackendError {}

// ---------------------------------------------------------------------------
// ResourceError
// ---------------------------------------------------------------------------

/// Error returned by [`ResourceManager`](crate::resource::ResourceManager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// No image is registered under this id.
    UnknownImage(ImageId),
    /// `free_image_resource` was called more often than `request_image_resource`.
    NotRequested(ImageId),
    /// The cache rejected the operation.
    Cache(CacheError),
    /// Direct (uncached) loading failed.
    Backend(BackendError),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::UnknownImage(id) => write!(f, "image {id} is not registered"),
            ResourceError::NotRequested(id) => {
                write!(f, "image {id} was freed more often than requested")
            },
            ResourceError::Cache(err) => write!(f, "image cache: {err}"),
            ResourceError::Backend(err) => write!(f, "graphics backend: {err}"),
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Cache(err) => Some(err),
            ResourceError::Backend(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CacheError> for ResourceError {
    fn from(err: CacheError) -> Self {
        ResourceError::Cache(err)
    }
}

impl From<BackendError> for ResourceError {
    fn from(err: BackendError) -> Self {
        ResourceError::Backend(err)
    }
}

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// Error returned when internal cache invariants are violated.
///
/// Produced by [`ImageCache::check_invariants`](crate::cache::ImageCache::check_invariants).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantError(String);

impl InvariantError {
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InvariantError {}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when cache configuration is invalid.
///
/// Produced by [`CacheConfigFile::parse`](crate::config::CacheConfigFile::parse)
/// and by the policy ordinal conversion. The cache itself never sees a
/// partially parsed configuration.
///
/// # Example
///
/// ```
/// use imgcache::config::CacheConfigFile;
///
/// let err = CacheConfigFile::parse("<CacheConfig><FileVersion>2</FileVersion></CacheConfig>")
///     .unwrap_err();
/// assert!(err.to_string().contains("FileVersion"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

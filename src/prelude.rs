pub use crate::backend::{GraphicsBackend, MemoryBackend};
pub use crate::builder::ImageCacheBuilder;
pub use crate::cache::{DEFAULT_CACHE_SIZE, ImageCache, SharedImageCache};
pub use crate::config::{CacheConfigFile, CacheSettings, Resolution};
pub use crate::error::{BackendError, CacheError, ConfigError, InvariantError, ResourceError};
pub use crate::image::{ImageId, ImageInfo, PixelFormat};
pub use crate::list::ReplacementList;
pub use crate::loader::{BackgroundImageLoader, SharedResourceManager};
#[cfg(feature = "metrics")]
pub use crate::metrics::ImageCacheMetricsSnapshot;
pub use crate::policy::{ReplacementPolicy, ReplacementPolicyKind, create_policy};
pub use crate::resource::{PrefetchOutcome, PrefetchStep, ResourceManager};

//! Graphics backend seam.
//!
//! The cache never decodes pixels itself. It asks a [`GraphicsBackend`] to
//! probe an image's decoded size, to load it, and to unload it again; the
//! backend owns the pixel memory. In the other direction, the backend's
//! draw path calls [`ImageCache::notify_image_access`] so recency-based
//! policies see every blit.
//!
//! [`MemoryBackend`] is a headless implementation that "decodes" from a
//! table of registered paths. It records every call and can be told to fail
//! specific paths, which makes it the backend used throughout the tests.
//!
//! [`ImageCache::notify_image_access`]: crate::cache::ImageCache::notify_image_access

use rustc_hash::FxHashMap;

use crate::error::BackendError;
use crate::image::{ImageId, ImageInfo};

/// Operations the cache and resource manager issue to the renderer.
pub trait GraphicsBackend {
    /// Reads the dimensions and pixel format of the image at `path` without
    /// decoding it.
    fn probe(&self, path: &str) -> Result<ImageInfo, BackendError>;

    /// Decodes/uploads the image at `path` and binds it to `id`.
    fn load_image(&mut self, path: &str, id: ImageId) -> Result<ImageInfo, BackendError>;

    /// Releases the pixel data bound to `id`. Unknown ids are ignored.
    fn unload_image(&mut self, id: ImageId);

    /// Info for a currently loaded image.
    fn image_info(&self, id: ImageId) -> Option<ImageInfo>;

    /// Decoded size in bytes of a loaded image.
    fn image_size(&self, id: ImageId) -> Option<usize> {
        self.image_info(id).map(|info| info.byte_size())
    }
}

impl<B: GraphicsBackend + ?Sized> GraphicsBackend for Box<B> {
    fn probe(&self, path: &str) -> Result<ImageInfo, BackendError> {
        (**self).probe(path)
    }

    fn load_image(&mut self, path: &str, id: ImageId) -> Result<ImageInfo, BackendError> {
        (**self).load_image(path, id)
    }

    fn unload_image(&mut self, id: ImageId) {
        (**self).unload_image(id)
    }

    fn image_info(&self, id: ImageId) -> Option<ImageInfo> {
        (**self).image_info(id)
    }
}

/// A single call observed by [`MemoryBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Load(ImageId),
    Unload(ImageId),
}

/// Headless backend backed by an in-memory path table.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    images: FxHashMap<String, ImageInfo>,
    failing: FxHashMap<String, String>,
    loaded: FxHashMap<ImageId, ImageInfo>,
    calls: Vec<BackendCall>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `path` loadable with the given dimensions.
    pub fn add_image(&mut self, path: impl Into<String>, info: ImageInfo) -> &mut Self {
        self.images.insert(path.into(), info);
        self
    }

    /// Builder-style variant of [`add_image`](Self::add_image).
    pub fn with_image(mut self, path: impl Into<String>, info: ImageInfo) -> Self {
        self.add_image(path, info);
        self
    }

    /// Makes every probe and load of `path` fail with `message`.
    pub fn fail_path(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.failing.insert(path.into(), message.into());
    }

    pub fn is_loaded(&self, id: ImageId) -> bool {
        self.loaded.contains_key(&id)
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    /// Sum of decoded bytes currently held.
    pub fn loaded_bytes(&self) -> usize {
        self.loaded.values().map(ImageInfo::byte_size).sum()
    }

    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn load_calls(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, BackendCall::Load(_)))
            .count()
    }

    pub fn unloaded_ids(&self) -> Vec<ImageId> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::Unload(id) => Some(*id),
                BackendCall::Load(_) => None,
            })
            .collect()
    }
}

impl GraphicsBackend for MemoryBackend {
    fn probe(&self, path: &str) -> Result<ImageInfo, BackendError> {
        if let Some(message) = self.failing.get(path) {
            return Err(BackendError::new(path, message.clone()));
        }
        self.images
            .get(path)
            .copied()
            .ok_or_else(|| BackendError::new(path, "file not found"))
    }

    fn load_image(&mut self, path: &str, id: ImageId) -> Result<ImageInfo, BackendError> {
        let info = self.probe(path)?;
        self.calls.push(BackendCall::Load(id));
        self.loaded.insert(id, info);
        Ok(info)
    }

    fn unload_image(&mut self, id: ImageId) {
        if self.loaded.remove(&id).is_some() {
            self.calls.push(BackendCall::Unload(id));
        }
    }

    fn image_info(&self, id: ImageId) -> Option<ImageInfo> {
        self.loaded.get(&id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::PixelFormat;

    #[test]
    fn load_and_unload_are_recorded() {
        let mut backend =
            MemoryBackend::new().with_image("a.png", ImageInfo::new(4, 4, PixelFormat::Rgb565));
        let info = backend.load_image("a.png", ImageId(1)).unwrap();
        assert_eq!(info.byte_size(), 32);
        assert!(backend.is_loaded(ImageId(1)));
        assert_eq!(backend.image_size(ImageId(1)), Some(32));
        assert_eq!(backend.loaded_bytes(), 32);

        backend.unload_image(ImageId(1));
        backend.unload_image(ImageId(1));
        assert_eq!(
            backend.calls(),
            &[BackendCall::Load(ImageId(1)), BackendCall::Unload(ImageId(1))]
        );
        assert_eq!(backend.unloaded_ids(), vec![ImageId(1)]);
    }

    #[test]
    fn unknown_and_failing_paths_error() {
        let mut backend = MemoryBackend::new();
        backend.add_image("b.png", ImageInfo::new(1, 1, PixelFormat::A8));
        backend.fail_path("b.png", "corrupt header");

        assert_eq!(
            backend.probe("missing.png").unwrap_err().message(),
            "file not found"
        );
        let err = backend.load_image("b.png", ImageId(2)).unwrap_err();
        assert_eq!(err.path(), "b.png");
        assert_eq!(err.message(), "corrupt header");
        assert_eq!(backend.load_calls(), 0);
    }
}

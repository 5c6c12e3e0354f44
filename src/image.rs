//! Image identifiers and decoded-image descriptions.

use std::fmt;

/// Opaque image resource identifier.
///
/// Static ids are chosen by the application; dynamic ids are handed out by
/// [`ResourceManager::register_dynamic_image`].
///
/// [`ResourceManager::register_dynamic_image`]: crate::resource::ResourceManager::register_dynamic_image
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageId(pub u32);

impl ImageId {
    /// Placeholder id meaning "no image".
    pub const DUMMY: ImageId = ImageId(u32::MAX);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_dummy(self) -> bool {
        self.0 == u32::MAX
    }
}

impl From<u32> for ImageId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dummy() {
            f.write_str("DUMMY_IMAGE")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

/// Pixel layout of a decoded image buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    /// 8-bit alpha mask.
    A8,
    /// 16-bit RGB, 5-6-5.
    Rgb565,
    /// 24-bit packed RGB.
    Rgb888,
    /// 32-bit ARGB.
    #[default]
    Argb8888,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::A8 => 1,
            PixelFormat::Rgb565 => 2,
            PixelFormat::Rgb888 => 3,
            PixelFormat::Argb8888 => 4,
        }
    }
}

/// Dimensions and format of an image as reported by the graphics backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl ImageInfo {
    pub const fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
        }
    }

    /// Size of the decoded pixel buffer in bytes.
    pub const fn byte_size(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_size_follows_format() {
        assert_eq!(ImageInfo::new(10, 10, PixelFormat::A8).byte_size(), 100);
        assert_eq!(ImageInfo::new(10, 10, PixelFormat::Rgb565).byte_size(), 200);
        assert_eq!(ImageInfo::new(10, 10, PixelFormat::Rgb888).byte_size(), 300);
        assert_eq!(ImageInfo::new(10, 10, PixelFormat::Argb8888).byte_size(), 400);
        assert_eq!(ImageInfo::new(0, 10, PixelFormat::Argb8888).byte_size(), 0);
    }

    #[test]
    fn dummy_id_display() {
        assert_eq!(ImageId::DUMMY.to_string(), "DUMMY_IMAGE");
        assert_eq!(ImageId::new(7).to_string(), "#7");
        assert!(ImageId::DUMMY.is_dummy());
        assert!(!ImageId::from(3).is_dummy());
    }
}

//! Cache configuration.
//!
//! [`CacheSettings`] is the already-parsed form the cache consumes through
//! [`ImageCache::apply_settings`](crate::cache::ImageCache::apply_settings).
//! [`CacheConfigFile`] reads the per-resolution XML file shipped with an
//! application and picks the settings for the running display:
//!
//! ```xml
//! <CacheConfig>
//!     <FileVersion>1</FileVersion>
//!     <Entries>2</Entries>
//!     <ImageCacheConfig>
//!         <Resolution>240x320</Resolution>
//!         <CacheSize>65535</CacheSize>
//!         <ReplacementFree>3</ReplacementFree>
//!         <ReplacementUsed>3</ReplacementUsed>
//!     </ImageCacheConfig>
//!     <ImageCacheConfig>
//!         <Resolution>480x640_portrait</Resolution>
//!         <CacheSize>1048576</CacheSize>
//!         <ReplacementFree>2</ReplacementFree>
//!         <ReplacementUsed>1</ReplacementUsed>
//!     </ImageCacheConfig>
//! </CacheConfig>
//! ```
//!
//! Policy values are the persisted ordinals of
//! [`ReplacementPolicyKind`]. Any structural problem rejects the whole
//! file; nothing is applied from a partially valid configuration.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use roxmltree::{Document, Node};
use tracing::debug;

use crate::cache::DEFAULT_CACHE_SIZE;
use crate::error::ConfigError;
use crate::policy::ReplacementPolicyKind;

/// The only configuration file version understood.
pub const CONFIG_FILE_VERSION: u32 = 1;

/// Size limit and policies for one cache instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub size_limit: usize,
    pub used_policy: ReplacementPolicyKind,
    pub free_policy: ReplacementPolicyKind,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            size_limit: DEFAULT_CACHE_SIZE,
            used_policy: ReplacementPolicyKind::Lru,
            free_policy: ReplacementPolicyKind::Lru,
        }
    }
}

/// Display resolution key, `"WxH"` or `"WxH_Appendix"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
    pub appendix: Option<String>,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            appendix: None,
        }
    }

    pub fn with_appendix(mut self, appendix: impl Into<String>) -> Self {
        self.appendix = Some(appendix.into());
        self
    }

    pub fn matches(&self, width: u32, height: u32, appendix: Option<&str>) -> bool {
        self.width == width && self.height == height && self.appendix.as_deref() == appendix
    }
}

impl FromStr for Resolution {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid =
            || ConfigError::new(format!("invalid resolution {s:?}, expected WxH[_Appendix]"));

        let (dims, appendix) = match s.split_once('_') {
            Some((_, "")) => return Err(invalid()),
            Some((dims, appendix)) => (dims, Some(appendix.to_string())),
            None => (s, None),
        };
        let (w, h) = dims.split_once('x').ok_or_else(invalid)?;
        let width = w.parse().map_err(|_| invalid())?;
        let height = h.parse().map_err(|_| invalid())?;
        Ok(Self {
            width,
            height,
            appendix,
        })
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)?;
        if let Some(appendix) = &self.appendix {
            write!(f, "_{appendix}")?;
        }
        Ok(())
    }
}

/// One `<ImageCacheConfig>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfigEntry {
    pub resolution: Resolution,
    pub settings: CacheSettings,
}

/// Parsed `<CacheConfig>` document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheConfigFile {
    entries: Vec<CacheConfigEntry>,
}

impl CacheConfigFile {
    /// Parses a configuration document.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let doc = Document::parse(text)
            .map_err(|err| ConfigError::new(format!("malformed cache configuration: {err}")))?;
        let root = doc.root_element();
        if !root.has_tag_name("CacheConfig") {
            return Err(ConfigError::new(format!(
                "expected <CacheConfig> root element, found <{}>",
                root.tag_name().name()
            )));
        }

        let version: u32 = parse_field(root, "FileVersion")?;
        if version != CONFIG_FILE_VERSION {
            return Err(ConfigError::new(format!(
                "unsupported FileVersion {version}, expected {CONFIG_FILE_VERSION}"
            )));
        }
        let expected: usize = parse_field(root, "Entries")?;

        let entries = root
            .children()
            .filter(|node| node.has_tag_name("ImageCacheConfig"))
            .map(parse_entry)
            .collect::<Result<Vec<_>, _>>()?;
        if entries.len() != expected {
            return Err(ConfigError::new(format!(
                "Entries is {expected} but {} <ImageCacheConfig> elements were found",
                entries.len()
            )));
        }

        debug!(entries = entries.len(), "cache configuration parsed");
        Ok(Self { entries })
    }

    /// Reads and parses a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|err| ConfigError::new(format!("{}: {err}", path.display())))?;
        Self::parse(&text)
    }

    pub fn entries(&self) -> &[CacheConfigEntry] {
        &self.entries
    }

    /// Settings for the given display resolution and appendix, if listed.
    pub fn select(
        &self,
        width: u32,
        height: u32,
        appendix: Option<&str>,
    ) -> Option<&CacheSettings> {
        self.entries
            .iter()
            .find(|entry| entry.resolution.matches(width, height, appendix))
            .map(|entry| &entry.settings)
    }
}

fn parse_entry(node: Node<'_, '_>) -> Result<CacheConfigEntry, ConfigError> {
    let resolution: Resolution = required_text(node, "Resolution")?.parse()?;
    let size_limit = parse_field(node, "CacheSize")?;
    let free_raw: u32 = parse_field(node, "ReplacementFree")?;
    let used_raw: u32 = parse_field(node, "ReplacementUsed")?;
    let free_policy = ReplacementPolicyKind::try_from(free_raw)?;
    let used_policy = ReplacementPolicyKind::try_from(used_raw)?;
    Ok(CacheConfigEntry {
        resolution,
        settings: CacheSettings {
            size_limit,
            used_policy,
            free_policy,
        },
    })
}

fn required_text<'a>(node: Node<'a, '_>, name: &str) -> Result<&'a str, ConfigError> {
    node.children()
        .find(|child| child.has_tag_name(name))
        .ok_or_else(|| {
            ConfigError::new(format!(
                "<{}> is missing <{name}>",
                node.tag_name().name()
            ))
        })
        .map(|child| child.text().unwrap_or_default().trim())
}

fn parse_field<T: FromStr>(node: Node<'_, '_>, name: &str) -> Result<T, ConfigError> {
    let text = required_text(node, name)?;
    text.parse()
        .map_err(|_| ConfigError::new(format!("<{name}> has invalid value {text:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        <CacheConfig>
            <FileVersion>1</FileVersion>
            <Entries>2</Entries>
            <ImageCacheConfig>
                <Resolution>240x320</Resolution>
                <CacheSize>65535</CacheSize>
                <ReplacementFree>3</ReplacementFree>
                <ReplacementUsed>3</ReplacementUsed>
            </ImageCacheConfig>
            <ImageCacheConfig>
                <Resolution>480x640_portrait</Resolution>
                <CacheSize>1048576</CacheSize>
                <ReplacementFree>2</ReplacementFree>
                <ReplacementUsed>1</ReplacementUsed>
            </ImageCacheConfig>
        </CacheConfig>
    "#;

    #[test]
    fn default_settings() {
        let settings = CacheSettings::default();
        assert_eq!(settings.size_limit, 100 * 1024 * 1024);
        assert_eq!(settings.used_policy, ReplacementPolicyKind::Lru);
        assert_eq!(settings.free_policy, ReplacementPolicyKind::Lru);
    }

    #[test]
    fn resolution_parsing() {
        assert_eq!("240x320".parse::<Resolution>().unwrap(), Resolution::new(240, 320));
        let r: Resolution = " 480x640_portrait ".parse().unwrap();
        assert_eq!(r, Resolution::new(480, 640).with_appendix("portrait"));
        assert_eq!(r.to_string(), "480x640_portrait");

        for bad in ["", "240", "240x", "x320", "240x320_", "axb"] {
            assert!(bad.parse::<Resolution>().is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn parses_sample_and_selects_by_resolution() {
        let config = CacheConfigFile::parse(SAMPLE).unwrap();
        assert_eq!(config.entries().len(), 2);

        let plain = config.select(240, 320, None).unwrap();
        assert_eq!(plain.size_limit, 65535);
        assert_eq!(plain.free_policy, ReplacementPolicyKind::Lru);
        assert_eq!(plain.used_policy, ReplacementPolicyKind::Lru);

        let portrait = config.select(480, 640, Some("portrait")).unwrap();
        assert_eq!(portrait.size_limit, 1_048_576);
        assert_eq!(portrait.free_policy, ReplacementPolicyKind::Fifo);
        assert_eq!(portrait.used_policy, ReplacementPolicyKind::Greedy);

        assert!(config.select(480, 640, None).is_none());
        assert!(config.select(800, 480, None).is_none());
    }

    #[test]
    fn rejects_wrong_version_first() {
        let err = CacheConfigFile::parse("<CacheConfig><FileVersion>2</FileVersion></CacheConfig>")
            .unwrap_err();
        assert!(err.message().contains("FileVersion"));
    }

    #[test]
    fn rejects_entry_count_mismatch() {
        let text = SAMPLE.replace("<Entries>2</Entries>", "<Entries>3</Entries>");
        let err = CacheConfigFile::parse(&text).unwrap_err();
        assert!(err.message().contains("Entries"));
    }

    #[test]
    fn rejects_missing_child_and_bad_policy() {
        let text = SAMPLE.replace("<CacheSize>65535</CacheSize>", "");
        assert!(CacheConfigFile::parse(&text).unwrap_err().message().contains("CacheSize"));

        let text = SAMPLE.replace(
            "<ReplacementUsed>1</ReplacementUsed>",
            "<ReplacementUsed>9</ReplacementUsed>",
        );
        assert!(CacheConfigFile::parse(&text).is_err());
    }

    #[test]
    fn rejects_malformed_xml_and_wrong_root() {
        assert!(CacheConfigFile::parse("<CacheConfig>").is_err());
        assert!(CacheConfigFile::parse("<Other/>").unwrap_err().message().contains("CacheConfig"));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = CacheConfigFile::load("/nonexistent/imgcache.xml").unwrap_err();
        assert!(err.message().contains("imgcache.xml"));
    }
}

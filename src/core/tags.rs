//! Filename tag sources used by the resolver fallback
//!
//! The tag grammar itself belongs to an external parser. This module only
//! defines what the resolver needs from it, plus two small sources: a map
//! backed one and a reader for the legacy poster file names.

use crate::core::error::{Result, RtimgError};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Tag keys for the synthesized leaf
pub const SIZE_TAG: &str = "sizetag";
pub const ALIGN_TAG: &str = "aligntag";
pub const EXT_TAG: &str = "ext";

/// Tag keys that make up a project name, in concatenation order:
/// name, season number, subname, episode number, episode name, comment,
/// year, format quality.
pub const NAME_TAGS: [&str; 8] = [
    "name", "sxx", "sname", "exx", "ename", "comment", "year", "sdhd",
];

/// Named tag lookups over one file name
pub trait TagSource: Send + Sync {
    /// Value of `name`, or `TagMissing`
    fn get_tag(&self, name: &str) -> Result<String>;

    /// Path the tags were read from
    fn source(&self) -> &Path;
}

/// Whether a tag source can back the resolver fallback
pub enum FallbackTags {
    /// No tag source was built for this path
    Absent,
    /// The tag parser rejected the file name
    Invalid { reason: String },
    /// A usable tag source
    Present(Box<dyn TagSource>),
}

impl FallbackTags {
    pub fn present(source: impl TagSource + 'static) -> Self {
        FallbackTags::Present(Box::new(source))
    }

    /// The usable source, or the reason there is none
    pub fn source(&self) -> Result<&dyn TagSource> {
        match self {
            FallbackTags::Present(source) => Ok(source.as_ref()),
            FallbackTags::Absent => Err(RtimgError::NoFallbackSource {
                reason: "tag source is absent".to_string(),
            }),
            FallbackTags::Invalid { reason } => Err(RtimgError::NoFallbackSource {
                reason: reason.clone(),
            }),
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, FallbackTags::Present(_))
    }
}

impl std::fmt::Debug for FallbackTags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackTags::Absent => write!(f, "Absent"),
            FallbackTags::Invalid { reason } => write!(f, "Invalid({})", reason),
            FallbackTags::Present(source) => write!(f, "Present({})", source.source().display()),
        }
    }
}

/// Builds the fallback tag source for a path.
///
/// Construction is not assumed to be thread-safe; the dispatcher serializes
/// calls to `build`.
pub trait TagSourceFactory: Send {
    fn build(&mut self, path: &Path) -> FallbackTags;
}

/// Factory that never offers a fallback
#[derive(Debug, Default)]
pub struct NoTags;

impl TagSourceFactory for NoTags {
    fn build(&mut self, _path: &Path) -> FallbackTags {
        FallbackTags::Absent
    }
}

// =============================================================================
// StaticTags
// =============================================================================

/// Tag source backed by a plain map
#[derive(Debug, Clone, Default)]
pub struct StaticTags {
    source: PathBuf,
    tags: HashMap<String, String>,
}

impl StaticTags {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            tags: HashMap::new(),
        }
    }

    /// Add a tag (builder style)
    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.tags.insert(name.to_string(), value.to_string());
        self
    }
}

impl TagSource for StaticTags {
    fn get_tag(&self, name: &str) -> Result<String> {
        self.tags
            .get(name)
            .cloned()
            .ok_or_else(|| RtimgError::TagMissing {
                name: name.to_string(),
            })
    }

    fn source(&self) -> &Path {
        &self.source
    }
}

// =============================================================================
// Legacy poster names
// =============================================================================

lazy_static! {
    /// `sd_2018_sobibor__12_q0w2_ar2_poster525x300.jpg`
    static ref LEGACY_POSTER: Regex = Regex::new(
        r"^(?P<sdhd>sd|hd)_(?P<year>\d{4})(?:_3d)?_(?P<name>\w+?)__(?:\w+_)*poster(?P<sizetag>\d+x\d+)(?:_(?P<aligntag>left|center))?(?P<ext>\.(?:jpg|png|psd))$"
    ).unwrap();
}

/// Tags read from a legacy poster file name
#[derive(Debug, Clone)]
pub struct LegacyPosterTags {
    inner: StaticTags,
}

impl LegacyPosterTags {
    /// Parse the file name of `path`; `None` if it is not a legacy poster name
    pub fn parse(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?;
        let caps = LEGACY_POSTER.captures(file_name)?;

        let mut inner = StaticTags::new(path);
        for tag in ["sdhd", "year", "name", SIZE_TAG, ALIGN_TAG, EXT_TAG] {
            if let Some(m) = caps.name(tag) {
                inner = inner.with(tag, m.as_str());
            }
        }
        Some(Self { inner })
    }
}

impl TagSource for LegacyPosterTags {
    fn get_tag(&self, name: &str) -> Result<String> {
        self.inner.get_tag(name)
    }

    fn source(&self) -> &Path {
        self.inner.source()
    }
}

/// Factory producing [`LegacyPosterTags`]
#[derive(Debug, Default)]
pub struct LegacyPosterFactory;

impl TagSourceFactory for LegacyPosterFactory {
    fn build(&mut self, path: &Path) -> FallbackTags {
        match LegacyPosterTags::parse(path) {
            Some(tags) => FallbackTags::present(tags),
            None => FallbackTags::Invalid {
                reason: format!("{} is not a legacy poster name", path.display()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_tags_lookup() {
        let tags = StaticTags::new("x/y.jpg").with(SIZE_TAG, "600x600");
        assert_eq!(tags.get_tag(SIZE_TAG).unwrap(), "600x600");
        assert!(matches!(
            tags.get_tag(ALIGN_TAG),
            Err(RtimgError::TagMissing { .. })
        ));
        assert_eq!(tags.source(), Path::new("x/y.jpg"));
    }

    #[test]
    fn test_fallback_source_variants() {
        assert!(matches!(
            FallbackTags::Absent.source(),
            Err(RtimgError::NoFallbackSource { .. })
        ));
        let invalid = FallbackTags::Invalid {
            reason: "parser said no".to_string(),
        };
        let err = invalid.source().err().unwrap();
        assert!(err.to_string().contains("parser said no"));

        let present = FallbackTags::present(StaticTags::new("a.jpg"));
        assert!(present.is_present());
        assert_eq!(present.source().unwrap().source(), Path::new("a.jpg"));
    }

    #[test]
    fn test_legacy_poster_parse() {
        let tags =
            LegacyPosterTags::parse(Path::new("in/sd_2018_sobibor__12_q0w2_ar2_poster525x300.jpg"))
                .unwrap();
        assert_eq!(tags.get_tag("sdhd").unwrap(), "sd");
        assert_eq!(tags.get_tag("year").unwrap(), "2018");
        assert_eq!(tags.get_tag("name").unwrap(), "sobibor");
        assert_eq!(tags.get_tag(SIZE_TAG).unwrap(), "525x300");
        assert_eq!(tags.get_tag(EXT_TAG).unwrap(), ".jpg");
        assert!(tags.get_tag(ALIGN_TAG).is_err());
    }

    #[test]
    fn test_legacy_poster_align_and_3d() {
        let tags = LegacyPosterTags::parse(Path::new("hd_2020_3d_the_movie__poster1920x1080_left.jpg"))
            .unwrap();
        assert_eq!(tags.get_tag("name").unwrap(), "the_movie");
        assert_eq!(tags.get_tag(ALIGN_TAG).unwrap(), "left");
    }

    #[test]
    fn test_legacy_factory_rejects_other_names() {
        let mut factory = LegacyPosterFactory;
        assert!(matches!(
            factory.build(Path::new("P/600x600.jpg")),
            FallbackTags::Invalid { .. }
        ));
        assert!(matches!(NoTags.build(Path::new("x.jpg")), FallbackTags::Absent));
    }
}

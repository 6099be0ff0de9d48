//! Poster naming registry
//!
//! A fixed, hand-maintained table mapping canonical relative suffixes to
//! the policy that governs files placed there. Two conventions live here:
//!
//! - `rt`: flat, one directory, size-tagged leaves plus a logo
//! - `gp`: nested, under `для сервиса/` and the `google_apple_feed/{jpg,psd}/`
//!   sub-tree
//!
//! Keys always start with `./` and use `/` separators. They are compared
//! byte-for-byte against the suffix window of a [`PathKey`](super::pathkey::PathKey).

use crate::core::error::{Result, ResultExt};
use crate::core::limits::{parse_size_limit, NO_LIMIT};
use lazy_static::lazy_static;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// Policy attached to a recognized suffix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRecord {
    /// Convention family tag ("rt", "gp")
    pub family: String,
    /// Maximum file size in bytes, `-1` when unconstrained
    pub byte_limit: i64,
}

impl PolicyRecord {
    pub fn new(family: impl Into<String>, byte_limit: i64) -> Self {
        Self {
            family: family.into(),
            byte_limit,
        }
    }

    /// Whether the record imposes a byte budget
    pub fn is_constrained(&self) -> bool {
        self.byte_limit >= 0
    }

    /// The budget as an unsigned byte count, if any
    pub fn budget(&self) -> Option<u64> {
        u64::try_from(self.byte_limit).ok()
    }
}

/// Built-in table: (suffix, family, limit)
const POSTER_TABLE: &[(&str, &str, &str)] = &[
    ("./350x500.jpg", "rt", ""),
    ("./525x300.jpg", "rt", ""),
    ("./810x498.jpg", "rt", ""),
    ("./270x390.jpg", "rt", ""),
    ("./1620x996.jpg", "rt", ""),
    ("./503x726.jpg", "rt", ""),
    ("./logo.png", "rt", "1M"),

    ("./для сервиса/600x600.jpg", "gp", "700k"),
    ("./для сервиса/600x600.psd", "gp", ""),
    ("./для сервиса/600x840.jpg", "gp", "700k"),
    ("./для сервиса/600x840.psd", "gp", ""),
    ("./для сервиса/1920x1080.jpg", "gp", "700k"),
    ("./для сервиса/1920x1080.psd", "gp", ""),
    ("./для сервиса/1920x1080_left.jpg", "gp", "700k"),
    ("./для сервиса/1920x1080_left.psd", "gp", ""),
    ("./для сервиса/1920x1080_center.jpg", "gp", "700k"),
    ("./для сервиса/1920x1080_center.psd", "gp", ""),
    ("./для сервиса/1260x400.jpg", "gp", "700k"),
    ("./для сервиса/1260x400.psd", "gp", ""),
    ("./для сервиса/1080x540.jpg", "gp", "700k"),
    ("./для сервиса/1080x540.psd", "gp", ""),

    ("./google_apple_feed/jpg/g_hasLogo_600x800.png", "gp", "2M"),
    ("./google_apple_feed/psd/g_hasLogo_600x800.psd", "gp", ""),
    ("./google_apple_feed/jpg/g_hasTitleLogo_1800x1000.png", "gp", ""),
    ("./google_apple_feed/psd/g_hasTitleLogo_1800x1000.psd", "gp", ""),

    ("./google_apple_feed/jpg/g_iconic_poster_600x600.jpg", "gp", "2M"),
    ("./google_apple_feed/psd/g_iconic_poster_600x600.psd", "gp", ""),
    ("./google_apple_feed/jpg/g_iconic_poster_600x800.jpg", "gp", "2M"),
    ("./google_apple_feed/psd/g_iconic_poster_600x800.psd", "gp", ""),
    ("./google_apple_feed/jpg/g_iconic_poster_800x600.jpg", "gp", "2M"),
    ("./google_apple_feed/psd/g_iconic_poster_800x600.psd", "gp", ""),
    ("./google_apple_feed/jpg/g_iconic_poster_1000x1500.jpg", "gp", "2M"),
    ("./google_apple_feed/psd/g_iconic_poster_1000x1500.psd", "gp", ""),
    ("./google_apple_feed/jpg/g_iconic_poster_3840x2160.jpg", "gp", "2M"),
    ("./google_apple_feed/psd/g_iconic_poster_3840x2160.psd", "gp", ""),
    ("./google_apple_feed/jpg/g_iconic_background_1000x1500.jpg", "gp", "2M"),
    ("./google_apple_feed/psd/g_iconic_background_1000x1500.psd", "gp", ""),
    ("./google_apple_feed/jpg/g_iconic_background_3840x2160.jpg", "gp", "2M"),
    ("./google_apple_feed/psd/g_iconic_background_3840x2160.psd", "gp", ""),
];

lazy_static! {
    static ref BUILTIN: Registry =
        Registry::from_table(POSTER_TABLE).expect("built-in poster table has valid limits");
}

/// Read-only suffix → policy mapping
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: HashMap<String, PolicyRecord>,
    extensions: BTreeSet<String>,
}

impl Registry {
    /// The process-wide built-in registry
    pub fn builtin() -> &'static Registry {
        &BUILTIN
    }

    /// Build a registry from `(suffix, family, limit string)` rows
    pub fn from_table(table: &[(&str, &str, &str)]) -> Result<Self> {
        let mut records = Vec::with_capacity(table.len());
        for (suffix, family, limit) in table {
            let byte_limit = parse_size_limit(limit).context(format!("registry entry {}", suffix))?;
            records.push((suffix.to_string(), PolicyRecord::new(*family, byte_limit)));
        }
        Ok(Self::from_records(records))
    }

    /// Build a registry from already-parsed records
    pub fn from_records<I, S>(records: I) -> Self
    where
        I: IntoIterator<Item = (S, PolicyRecord)>,
        S: Into<String>,
    {
        let mut registry = Self::default();
        for (suffix, record) in records {
            let suffix = suffix.into();
            if let Some(ext) = extension_of(&suffix) {
                registry.extensions.insert(ext);
            }
            registry.entries.insert(suffix, record);
        }
        registry
    }

    /// Look up the policy for an exact suffix
    pub fn lookup(&self, suffix: &str) -> Option<&PolicyRecord> {
        self.entries.get(suffix)
    }

    /// Extensions (lower-case, with leading dot) of every registered suffix
    pub fn extensions(&self) -> &BTreeSet<String> {
        &self.extensions
    }

    /// Whether traversal should pick up this file
    pub fn recognizes(&self, path: &Path) -> bool {
        extension_of(&path.to_string_lossy())
            .map_or(false, |ext| self.extensions.contains(&ext))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(suffix, record)` pairs in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PolicyRecord)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Lower-cased extension of the last path segment, dot included
fn extension_of(path: &str) -> Option<String> {
    let leaf = path.rsplit('/').next().unwrap_or(path);
    let dot = leaf.rfind('.')?;
    if dot + 1 == leaf.len() {
        return None;
    }
    Some(leaf[dot..].to_lowercase())
}

/// Record with no byte budget
pub fn unconstrained(family: impl Into<String>) -> PolicyRecord {
    PolicyRecord::new(family, NO_LIMIT)
}

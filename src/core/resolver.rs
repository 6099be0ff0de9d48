//! Path → policy resolution
//!
//! The resolver walks the suffix window of a [`PathKey`] outward from the
//! leaf and stops at the first registry hit. The shallowest matching suffix
//! always wins: conventions are expected to have disjoint minimal suffixes,
//! and a longer match elsewhere in the table is never considered.
//!
//! When the literal path does not resolve, a tag source can supply the
//! canonical leaf and the project name, and resolution is retried once on
//! that synthetic path.

use crate::core::error::{Result, RtimgError};
use crate::core::pathkey::PathKey;
use crate::core::registry::{PolicyRecord, Registry};
use crate::core::tags::{FallbackTags, TagSource, ALIGN_TAG, EXT_TAG, NAME_TAGS, SIZE_TAG};
use std::path::{Path, PathBuf};

/// A resolved path: the matched window plus its policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    key: PathKey,
    policy: PolicyRecord,
    via_fallback: bool,
}

impl Resolution {
    pub fn policy(&self) -> &PolicyRecord {
        &self.policy
    }

    pub fn key(&self) -> &PathKey {
        &self.key
    }

    /// The registry suffix that matched
    pub fn suffix(&self) -> String {
        self.key.suffix()
    }

    /// Window level at which the registry matched
    pub fn level(&self) -> usize {
        self.key.level()
    }

    pub fn project_directory(&self) -> String {
        self.key.project_directory()
    }

    pub fn project_name(&self) -> Option<&str> {
        self.key.project_name()
    }

    /// Whether the match came from a synthesized path
    pub fn used_fallback(&self) -> bool {
        self.via_fallback
    }
}

/// Resolves asset paths against a registry
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'r> {
    registry: &'r Registry,
}

impl Resolver<'static> {
    /// Resolver over the built-in registry
    pub fn builtin() -> Self {
        Self::new(Registry::builtin())
    }
}

impl<'r> Resolver<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Resolve the literal path only, shortest suffix first
    pub fn try_resolve(&self, path: &str, name: Option<String>) -> Result<Resolution> {
        let mut key = PathKey::new(path, name)?;
        loop {
            let suffix = key.suffix();
            if let Some(policy) = self.registry.lookup(&suffix) {
                tracing::debug!(level = key.level(), %suffix, "registry hit");
                return Ok(Resolution {
                    policy: policy.clone(),
                    key,
                    via_fallback: false,
                });
            }
            tracing::debug!(level = key.level(), %suffix, "registry miss");
            if !key.next_level() {
                return Err(RtimgError::PolicyNotFound {
                    path: path.to_string(),
                });
            }
        }
    }

    /// Resolve `path`, falling back to tag metadata when the literal path fails.
    ///
    /// The fallback only runs when `tags` is usable; otherwise the literal
    /// failure is returned as is.
    pub fn resolve(&self, path: &Path, tags: &FallbackTags) -> Result<Resolution> {
        let literal = path.to_string_lossy();
        let err = match self.try_resolve(&literal, None) {
            Ok(resolution) => return Ok(resolution),
            Err(err) if err.is_unresolved() => err,
            Err(err) => return Err(err),
        };

        let source = match tags {
            FallbackTags::Present(source) => source.as_ref(),
            FallbackTags::Absent | FallbackTags::Invalid { .. } => return Err(err),
        };

        let synthetic = synthesize_path(source)?;
        let name = synthesize_name(source)?;
        tracing::debug!(
            path = %literal,
            synthetic = %synthetic.display(),
            %name,
            "retrying with tag fallback"
        );

        let mut resolution = self.try_resolve(&synthetic.to_string_lossy(), Some(name))?;
        resolution.via_fallback = true;
        Ok(resolution)
    }
}

/// Canonical path for a tag source: same directory, leaf
/// `{sizetag}[_{aligntag}]{ext}`.
///
/// `ext` falls back to the extension of the source path when the tag is
/// missing.
pub fn synthesize_path(tags: &dyn TagSource) -> Result<PathBuf> {
    let mut leaf = tags
        .get_tag(SIZE_TAG)
        .ok()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| RtimgError::NoFallbackSource {
            reason: format!("{} has no {}", tags.source().display(), SIZE_TAG),
        })?;

    if let Some(align) = non_empty_tag(tags, ALIGN_TAG) {
        leaf.push('_');
        leaf.push_str(&align);
    }

    let ext = non_empty_tag(tags, EXT_TAG).or_else(|| {
        tags.source()
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
    });
    if let Some(ext) = ext {
        leaf.push_str(&ext);
    }

    let dir = tags.source().parent().unwrap_or_else(|| Path::new(""));
    Ok(dir.join(leaf))
}

/// Project name from the naming tags present, joined with `_`
pub fn synthesize_name(tags: &dyn TagSource) -> Result<String> {
    let parts: Vec<String> = NAME_TAGS
        .iter()
        .filter_map(|tag| non_empty_tag(tags, tag))
        .collect();

    if parts.is_empty() {
        return Err(RtimgError::InsufficientTags {
            source_path: tags.source().display().to_string(),
        });
    }
    Ok(parts.join("_"))
}

fn non_empty_tag(tags: &dyn TagSource, name: &str) -> Option<String> {
    tags.get_tag(name).ok().filter(|v| !v.is_empty())
}

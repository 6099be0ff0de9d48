//! Input expansion for rtimg
//!
//! Turns the paths given on the command line into the list of asset files
//! to check. Directories are walked recursively and only files whose
//! extension appears in the registry are kept.

use crate::core::error::{Result, RtimgError};
use crate::core::registry::Registry;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Marker embedded in temp artifact names by the encoder
pub const TEMP_MARKER: &str = "####";

/// Normalize path separators for cross-platform compatibility.
/// - Converts Windows backslashes to forward slashes
/// - Strips Windows UNC prefix `\\?\` if present
pub fn normalize_path_separators(path: &str) -> String {
    let mut normalized = path.to_string();

    // Strip Windows UNC prefix (\\?\ or \\.\)
    if normalized.starts_with(r"\\?\") || normalized.starts_with(r"\\.\") {
        normalized = normalized[4..].to_string();
    }

    normalized.replace('\\', "/")
}

/// Configuration for input expansion
#[derive(Debug, Clone, Default)]
pub struct WalkConfig {
    /// Glob patterns to exclude
    pub exclude_patterns: Vec<String>,
    /// Follow symlinks while walking directories
    pub follow_symlinks: bool,
}

/// Expands files and directories into candidate asset paths
#[derive(Debug)]
pub struct AssetWalker<'r> {
    registry: &'r Registry,
    config: WalkConfig,
    exclude: Option<GlobSet>,
}

impl<'r> AssetWalker<'r> {
    pub fn new(registry: &'r Registry, config: WalkConfig) -> Result<Self> {
        let exclude = Self::build_globset(&config.exclude_patterns)?;
        Ok(Self {
            registry,
            config,
            exclude,
        })
    }

    /// Build a GlobSet from patterns
    fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>> {
        if patterns.is_empty() {
            return Ok(None);
        }

        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|e| {
                RtimgError::invalid_config(format!("bad exclude pattern {:?}: {}", pattern, e))
            })?;
            builder.add(glob);
        }
        builder
            .build()
            .map(Some)
            .map_err(|e| RtimgError::invalid_config(e.to_string()))
    }

    /// Whether a path is excluded by pattern or is one of our temp artifacts
    pub fn is_excluded(&self, path: &Path) -> bool {
        let normalized = normalize_path_separators(&path.to_string_lossy());
        if normalized.contains(TEMP_MARKER) {
            return true;
        }
        self.exclude
            .as_ref()
            .map_or(false, |set| set.is_match(&normalized))
    }

    /// Expand inputs into a sorted, de-duplicated list of files.
    ///
    /// Overlapping inputs (`./posters` and `posters/rt`) yield each file once;
    /// identity is the canonical path. Explicit file arguments are kept as given, even when the registry does
    /// not know their extension, so they are reported instead of silently
    /// dropped.
    pub fn collect(&self, inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for input in inputs {
            if input.is_file() {
                files.push(input.clone());
                continue;
            }
            if !input.is_dir() {
                return Err(RtimgError::FileNotFound {
                    path: input.clone(),
                });
            }

            for entry in walkdir::WalkDir::new(input)
                .follow_links(self.config.follow_symlinks)
                .into_iter()
            {
                let entry = match entry {
                    Ok(e) => e,
                    Err(e) => {
                        tracing::warn!("walk error: {}", e);
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                let path = entry.path();
                if !self.registry.recognizes(path) || self.is_excluded(path) {
                    continue;
                }
                files.push(path.to_path_buf());
            }
        }

        let mut files: Vec<PathBuf> = files.into_iter().map(|p| without_cur_dir(&p)).collect();
        files.sort();

        let mut seen = HashSet::new();
        files.retain(|file| {
            let key = fs::canonicalize(file).unwrap_or_else(|_| file.clone());
            seen.insert(key)
        });
        Ok(files)
    }
}

/// Drop `.` components so `./a/b` and `a/b` print alike
fn without_cur_dir(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_normalize_path_separators_backslashes() {
        assert_eq!(normalize_path_separators(r"src\600x600.jpg"), "src/600x600.jpg");
        assert_eq!(normalize_path_separators(r"a\b\c\d"), "a/b/c/d");
    }

    #[test]
    fn test_normalize_path_separators_unc() {
        assert_eq!(normalize_path_separators(r"\\?\C:\p\logo.png"), "C:/p/logo.png");
        assert_eq!(normalize_path_separators("already/fine"), "already/fine");
    }

    #[test]
    fn test_collect_filters_by_registry_extension() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "P/для сервиса/600x600.jpg");
        touch(dir.path(), "P/для сервиса/600x600.psd");
        touch(dir.path(), "P/logo.png");
        touch(dir.path(), "P/notes.txt");
        touch(dir.path(), "P/600x600.jpg####.jpg");

        let walker = AssetWalker::new(Registry::builtin(), WalkConfig::default()).unwrap();
        let files = walker.collect(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(files.len(), 3);
        assert!(names.contains(&"logo.png".to_string()));
        assert!(!names.iter().any(|n| n.ends_with(".txt")));
        assert!(!names.iter().any(|n| n.contains(TEMP_MARKER)));
    }

    #[test]
    fn test_collect_honors_excludes() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "P/google_apple_feed/psd/g_iconic_poster_600x800.psd");
        touch(dir.path(), "P/google_apple_feed/jpg/g_iconic_poster_600x800.jpg");

        let config = WalkConfig {
            exclude_patterns: vec!["**/psd/**".to_string()],
            ..Default::default()
        };
        let walker = AssetWalker::new(Registry::builtin(), config).unwrap();
        let files = walker.collect(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].to_string_lossy().ends_with(".jpg"));
    }

    #[test]
    fn test_explicit_files_pass_through_and_dedup() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "notes.txt");
        let file = dir.path().join("notes.txt");

        let walker = AssetWalker::new(Registry::builtin(), WalkConfig::default()).unwrap();
        let files = walker.collect(&[file.clone(), file.clone()]).unwrap();
        assert_eq!(files, vec![file]);
    }

    #[test]
    fn test_overlapping_inputs_yield_each_file_once() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "posters/rt/350x500.jpg");

        let walker = AssetWalker::new(Registry::builtin(), WalkConfig::default()).unwrap();
        let files = walker
            .collect(&[
                dir.path().join(".").join("posters"),
                dir.path().join("posters/rt"),
                dir.path().join("posters/rt/350x500.jpg"),
            ])
            .unwrap();
        assert_eq!(files, vec![dir.path().join("posters/rt/350x500.jpg")]);
    }

    #[test]
    fn test_missing_input_is_an_error() {
        let walker = AssetWalker::new(Registry::builtin(), WalkConfig::default()).unwrap();
        let err = walker
            .collect(&[PathBuf::from("/definitely/not/here")])
            .unwrap_err();
        assert!(matches!(err, RtimgError::FileNotFound { .. }));
    }

    #[test]
    fn test_bad_glob_is_config_error() {
        let config = WalkConfig {
            exclude_patterns: vec!["[".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            AssetWalker::new(Registry::builtin(), config),
            Err(RtimgError::InvalidConfig { .. })
        ));
    }
}

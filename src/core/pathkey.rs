//! Decomposed asset paths and the suffix window used to probe the registry
//!
//! A [`PathKey`] splits a path into segments once and then exposes a trailing
//! window that grows one segment at a time toward the root. At window level
//! `n` the suffix is `"./"` followed by the last `n + 1` segments joined with
//! `/`.

use crate::core::error::{Result, RtimgError};
use crate::core::walker::normalize_path_separators;
use lazy_static::lazy_static;
use regex::Regex;

/// Size tag of logo leaves, which carry no pixel dimensions
pub const LOGO_TAG: &str = "logo";

lazy_static! {
    /// Size or logo tag in a leaf: `600x800.jpg`, `g_iconic_poster_600x800.jpg`,
    /// `1920x1080_left.jpg`, `logo.png`
    static ref LEAF_TAG: Regex = Regex::new(r"^(?:.*_)?(\d+x\d+|logo)[._].*$").unwrap();
}

/// A path split into segments plus the current suffix window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathKey {
    segments: Vec<String>,
    level: usize,
    size_tag: String,
    name_override: Option<String>,
}

impl PathKey {
    /// Decompose `path` and classify its leaf.
    ///
    /// Fails with `MalformedLeaf` unless the leaf carries exactly one size
    /// or logo tag.
    pub fn new(path: &str, name_override: Option<String>) -> Result<Self> {
        let segments = clean_segments(path);
        let leaf = segments.last().map(String::as_str).unwrap_or("");

        let matches = LEAF_TAG.find_iter(leaf).count();
        if matches != 1 {
            return Err(RtimgError::MalformedLeaf {
                leaf: leaf.to_string(),
                matches,
            });
        }
        let size_tag = LEAF_TAG
            .captures(leaf)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();

        Ok(Self {
            segments,
            level: 0,
            size_tag,
            name_override: name_override.filter(|n| !n.is_empty()),
        })
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn segment(&self, n: usize) -> Option<&str> {
        self.segments.get(n).map(String::as_str)
    }

    /// The last segment (file name)
    pub fn leaf(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    /// Size tag from the leaf ("800x600", "logo")
    pub fn size_tag(&self) -> &str {
        &self.size_tag
    }

    /// Current window depth, 0 = leaf only
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn name_override(&self) -> Option<&str> {
        self.name_override.as_deref()
    }

    /// Registry probe key for the current window
    pub fn suffix(&self) -> String {
        format!("./{}", self.window().join("/"))
    }

    /// Extend the window by one segment toward the root.
    ///
    /// Returns false, leaving the window unchanged, when no segment remains.
    pub fn next_level(&mut self) -> bool {
        if self.level + 1 >= self.segments.len() {
            return false;
        }
        self.level += 1;
        true
    }

    /// Segments strictly above the window, joined; empty if the window covers the path
    pub fn project_directory(&self) -> String {
        let head = &self.segments[..self.window_start()];
        match head {
            [root] if root.is_empty() => "/".to_string(),
            _ => head.join("/"),
        }
    }

    /// Override name if set, else the segment right above the window
    pub fn project_name(&self) -> Option<&str> {
        if let Some(name) = self.name_override.as_deref() {
            return Some(name);
        }
        self.window_start()
            .checked_sub(1)
            .and_then(|idx| self.segment(idx))
            .filter(|s| !s.is_empty())
    }

    fn window_start(&self) -> usize {
        self.segments.len().saturating_sub(1 + self.level)
    }

    fn window(&self) -> &[String] {
        &self.segments[self.window_start()..]
    }
}

/// Split a path into cleaned segments.
///
/// Empty and `.` components are dropped and `..` consumes its parent where
/// one exists. Absolute paths keep an empty first segment so that joining the
/// segments restores the leading `/`.
fn clean_segments(path: &str) -> Vec<String> {
    let normalized = normalize_path_separators(path);
    let absolute = normalized.starts_with('/');

    let mut segments: Vec<String> = Vec::new();
    for part in normalized.split('/') {
        match part {
            "" | "." => {}
            ".." => match segments.last() {
                Some(last) if last != ".." => {
                    segments.pop();
                }
                _ if absolute => {}
                _ => segments.push(part.to_string()),
            },
            _ => segments.push(part.to_string()),
        }
    }

    if absolute {
        segments.insert(0, String::new());
    }
    segments
}

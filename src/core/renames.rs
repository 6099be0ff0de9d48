//! Project directory renames
//!
//! Files resolved through tag fallback carry a project name that the
//! directory on disk may not have yet. Workers record the wanted name here
//! while the pool runs; [`RenamePlan::apply`] renames afterwards, one
//! directory at a time.

use crate::core::error::{Result, RtimgError};
use crate::core::walker::normalize_path_separators;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A second, different name offered for an already-planned directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameConflict {
    pub directory: String,
    pub kept: String,
    pub rejected: String,
}

/// Outcome of [`RenamePlan::apply`]
#[derive(Debug, Default)]
pub struct RenameReport {
    pub renamed: Vec<(PathBuf, PathBuf)>,
    /// Directories already carrying their project name
    pub unchanged: Vec<PathBuf>,
    pub errors: Vec<(PathBuf, RtimgError)>,
}

#[derive(Debug, Default)]
struct PlanState {
    targets: BTreeMap<String, String>,
    conflicts: Vec<RenameConflict>,
}

/// Thread-safe collector of `project directory -> project name`
#[derive(Debug, Default)]
pub struct RenamePlan {
    state: Mutex<PlanState>,
}

impl RenamePlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a wanted rename. The first name for a directory wins.
    pub fn record(&self, directory: &str, name: &str) {
        let directory = normalize_path_separators(directory);
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match state.targets.get(&directory) {
            None => {
                state.targets.insert(directory, name.to_string());
            }
            Some(kept) if kept == name => {}
            Some(kept) => {
                let conflict = RenameConflict {
                    directory: directory.clone(),
                    kept: kept.clone(),
                    rejected: name.to_string(),
                };
                tracing::warn!(
                    directory = %conflict.directory,
                    kept = %conflict.kept,
                    rejected = %conflict.rejected,
                    "duplicate project name"
                );
                state.conflicts.push(conflict);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn target(&self, directory: &str) -> Option<String> {
        self.snapshot()
            .get(&normalize_path_separators(directory))
            .cloned()
    }

    pub fn conflicts(&self) -> Vec<RenameConflict> {
        match self.state.lock() {
            Ok(guard) => guard.conflicts.clone(),
            Err(poisoned) => poisoned.into_inner().conflicts.clone(),
        }
    }

    fn snapshot(&self) -> BTreeMap<String, String> {
        match self.state.lock() {
            Ok(guard) => guard.targets.clone(),
            Err(poisoned) => poisoned.into_inner().targets.clone(),
        }
    }

    /// Rename every planned directory to a sibling named after its project.
    ///
    /// Deepest directories go first so a parent rename never invalidates a
    /// planned child path. A failure is recorded for that directory and the
    /// rest still run.
    pub fn apply(&self) -> RenameReport {
        let mut report = RenameReport::default();
        // a descendant's path extends its ancestor's, so it sorts after it
        for (directory, name) in self.snapshot().into_iter().rev() {
            let from = PathBuf::from(&directory);
            match rename_directory(&from, &name) {
                Ok(Some(to)) => {
                    tracing::info!(from = %from.display(), to = %to.display(), "renamed project");
                    report.renamed.push((from, to));
                }
                Ok(None) => report.unchanged.push(from),
                Err(err) => {
                    tracing::error!(directory = %from.display(), error = %err, "rename failed");
                    report.errors.push((from, err));
                }
            }
        }
        report
    }
}

fn rename_directory(from: &Path, name: &str) -> Result<Option<PathBuf>> {
    if from.file_name().map(|n| n == name).unwrap_or(false) {
        return Ok(None);
    }
    if !from.is_dir() {
        return Err(RtimgError::FileNotFound {
            path: from.to_path_buf(),
        });
    }
    let to = from
        .parent()
        .map(|p| p.join(name))
        .unwrap_or_else(|| PathBuf::from(name));
    if to.exists() {
        return Err(RtimgError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} already exists", to.display()),
        )));
    }
    fs::rename(from, &to)?;
    Ok(Some(to))
}

//! Core data models for rtimg
//!
//! Run configuration (loaded from `.rtimg_config.json`), the per-file
//! report the dispatcher emits, and the summary aggregated from reports.

use crate::core::encoder::{CodecFamily, Effort};
use crate::core::error::{Result, RtimgError};
use crate::core::limits::format_kb;
use crate::core::registry::PolicyRecord;
use crate::core::tools::ToolsConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file looked up in the working directory
pub const CONFIG_FILE_NAME: &str = ".rtimg_config.json";

/// Which codec families a run processes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatFilter {
    Jpg,
    Png,
    #[default]
    All,
}

impl FormatFilter {
    /// Parse filter from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(FormatFilter::Jpg),
            "png" => Some(FormatFilter::Png),
            "all" => Some(FormatFilter::All),
            _ => None,
        }
    }

    /// Whether a file of this path's type should be processed
    pub fn accepts(&self, path: &Path) -> bool {
        match self {
            FormatFilter::All => true,
            FormatFilter::Jpg => CodecFamily::of(path) == Some(CodecFamily::Jpeg),
            FormatFilter::Png => CodecFamily::of(path) == Some(CodecFamily::Png),
        }
    }
}

/// Configuration loaded from .rtimg_config.json
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RtimgConfig {
    /// Worker threads (0 = one per CPU)
    pub threads: usize,
    pub format: FormatFilter,
    /// Compare sizes only, never modify a file
    pub check_only: bool,
    /// Skip the ffprobe codec and dimension check
    pub skip_probe: bool,
    /// Glob patterns excluded from directory walks
    pub exclude: Vec<String>,
    pub tools: ToolsConfig,
}

impl RtimgConfig {
    /// Read a config file; any read or parse problem is `InvalidConfig`
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            RtimgError::invalid_config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            RtimgError::invalid_config(format!("cannot parse {}: {}", path.display(), e))
        })?;
        config.tools.validate()?;
        Ok(config)
    }

    /// Load `explicit` if given, else `cwd/.rtimg_config.json` if it exists,
    /// else defaults.
    pub fn load(explicit: Option<&Path>, cwd: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        let default = cwd.join(CONFIG_FILE_NAME);
        if default.is_file() {
            tracing::debug!(path = %default.display(), "loading config");
            Self::from_file(&default)
        } else {
            Ok(Self::default())
        }
    }

    /// Effective worker count, never below one
    pub fn worker_count(&self) -> usize {
        if self.threads > 0 {
            return self.threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

/// Final state of one asset
#[derive(Debug)]
pub enum AssetOutcome {
    /// Already within budget (or unconstrained)
    Compliant,
    /// Re-encoded under budget
    Reduced,
    /// Check-only run found the file over budget
    OverBudget,
    /// Filtered out by format
    Skipped,
    Failed(RtimgError),
}

impl AssetOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            AssetOutcome::Compliant => "ok",
            AssetOutcome::Reduced => "reduced",
            AssetOutcome::OverBudget => "over budget",
            AssetOutcome::Skipped => "skipped",
            AssetOutcome::Failed(_) => "failed",
        }
    }
}

/// One report per processed path
#[derive(Debug)]
pub struct AssetReport {
    pub path: PathBuf,
    pub policy: Option<PolicyRecord>,
    pub project_directory: Option<String>,
    pub project_name: Option<String>,
    pub original_size: u64,
    pub achieved_size: u64,
    pub effort: Effort,
    pub outcome: AssetOutcome,
}

impl AssetReport {
    /// Report for a path that carries no size information
    pub fn bare(path: impl Into<PathBuf>, outcome: AssetOutcome) -> Self {
        Self {
            path: path.into(),
            policy: None,
            project_directory: None,
            project_name: None,
            original_size: 0,
            achieved_size: 0,
            effort: Effort::NotApplicable,
            outcome,
        }
    }

    pub fn failed(path: impl Into<PathBuf>, err: RtimgError) -> Self {
        Self::bare(path, AssetOutcome::Failed(err))
    }

    /// Failed or found over budget
    pub fn is_failure(&self) -> bool {
        matches!(
            self.outcome,
            AssetOutcome::Failed(_) | AssetOutcome::OverBudget
        )
    }

    /// Human-readable status for progress output
    pub fn message(&self) -> String {
        match &self.outcome {
            AssetOutcome::Failed(err) => err.to_string(),
            AssetOutcome::Skipped => "skipped".to_string(),
            AssetOutcome::Reduced => format!(
                "{} -> {} ({})",
                format_kb(self.original_size),
                format_kb(self.achieved_size),
                self.effort
            ),
            AssetOutcome::OverBudget => match self.policy.as_ref().and_then(|p| p.budget()) {
                Some(limit) => format!(
                    "over budget ({} > {})",
                    format_kb(self.original_size),
                    format_kb(limit)
                ),
                None => "over budget".to_string(),
            },
            AssetOutcome::Compliant => format!("ok {}", format_kb(self.achieved_size)),
        }
    }
}

/// Aggregate of a whole run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub compliant: usize,
    pub reduced: usize,
    pub over_budget: usize,
    pub skipped: usize,
    pub failed: usize,
    /// `(path, message)` for every failed or over-budget file
    pub failures: Vec<(PathBuf, String)>,
}

impl RunSummary {
    pub fn record(&mut self, report: &AssetReport) {
        self.total += 1;
        match report.outcome {
            AssetOutcome::Compliant => self.compliant += 1,
            AssetOutcome::Reduced => self.reduced += 1,
            AssetOutcome::OverBudget => self.over_budget += 1,
            AssetOutcome::Skipped => self.skipped += 1,
            AssetOutcome::Failed(_) => self.failed += 1,
        }
        if report.is_failure() {
            self.failures.push((report.path.clone(), report.message()));
        }
    }

    /// Any file failed or was over budget
    pub fn has_problems(&self) -> bool {
        self.failed > 0 || self.over_budget > 0
    }
}

//! Error types for rtimg
//!
//! This module provides structured error handling using thiserror.
//! Every per-file failure kind is a variant here so the dispatcher can
//! record it against the file and carry on with the rest of the batch.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for rtimg operations
pub type Result<T> = std::result::Result<T, RtimgError>;

/// Errors that can occur while resolving or re-encoding an asset
#[derive(Error, Debug)]
pub enum RtimgError {
    /// Leaf segment has zero or several size/logo tags
    #[error("malformed leaf {leaf:?}: expected exactly one size tag, found {matches}")]
    MalformedLeaf { leaf: String, matches: usize },

    /// No registry suffix matches the path at any depth
    #[error("no naming policy found for {path}")]
    PolicyNotFound { path: String },

    /// Fallback attempted but none of the naming tags are present
    #[error("{source_path} does not have enough tags to construct a project name")]
    InsufficientTags { source_path: String },

    /// Fallback attempted but the tag source is missing or unusable
    #[error("no fallback tag source: {reason}")]
    NoFallbackSource { reason: String },

    /// A tag lookup found nothing
    #[error("tag {name:?} not found")]
    TagMissing { name: String },

    /// The encoder search ran out of options above the limit
    #[error("cannot reduce file size ({achieved} > {limit})")]
    BudgetUnreachable { achieved: u64, limit: u64 },

    /// An external tool failed, printed diagnostics, or timed out
    #[error("{tool} failed: {reason}")]
    ExternalToolFailure { tool: String, reason: String },

    /// Byte-limit string could not be parsed
    #[error("invalid size limit {value:?}")]
    InvalidLimit { value: String },

    /// Probed content disagrees with the file name
    #[error("content mismatch: expected {expected}, found {found}")]
    ContentMismatch { expected: String, found: String },

    /// The file is over budget but has no codec family
    #[error("unsupported extension {extension:?} to process file")]
    UnsupportedFormat { extension: String },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// IO error during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Path is not valid for the operation
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<RtimgError>,
    },
}

impl RtimgError {
    /// Wrap an error with additional context
    pub fn with_context(self, context: impl Into<String>) -> Self {
        RtimgError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        RtimgError::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an external tool failure
    pub fn tool_failure(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        RtimgError::ExternalToolFailure {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Strip any context wrappers and return the underlying error
    pub fn root(&self) -> &RtimgError {
        match self {
            RtimgError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the literal path failed to resolve, so a tag fallback may help
    pub fn is_unresolved(&self) -> bool {
        matches!(
            self.root(),
            RtimgError::PolicyNotFound { .. } | RtimgError::MalformedLeaf { .. }
        )
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(ctx))
    }
}

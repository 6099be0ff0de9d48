//! rtimg - naming-policy resolution and byte-budget re-encoding for image assets
//!
//! Asset files are classified by where they sit in a project tree and what
//! their leaf name says. The classification yields a byte limit, and files
//! over it are re-encoded with external tools until they fit.
//!
//! # Architecture
//!
//! This crate follows the "Library-First" pattern:
//! - **lib.rs** (this file): Pure logic, no CLI concerns
//! - **bin/rtimg.rs**: Thin wrapper that calls the library
//!
//! ```
//! use rtimg::Resolver;
//!
//! let resolution = Resolver::builtin()
//!     .try_resolve("some/path/PROJECT/для сервиса/600x600.jpg", None)
//!     .unwrap();
//! assert_eq!(resolution.policy().family, "gp");
//! assert_eq!(resolution.project_name(), Some("PROJECT"));
//! ```

pub mod core;

pub use crate::core::{
    parse_size_limit, AdaptiveEncoder, AssetOutcome, AssetReport, AssetWalker, DispatchOptions,
    Dispatcher, Effort, ExternalTools, FallbackTags, FormatFilter, ImageInfo, ImageTools,
    LegacyPosterFactory, NoTags, PathKey, PolicyRecord, Reduction, Registry, RenamePlan,
    RenameReport, Resolution, Resolver, Result, RtimgConfig, RtimgError, RunSummary, TagSource,
    TagSourceFactory, ToolsConfig, WalkConfig,
};

/// Crate version, shared by the library and the CLI
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the version of the rtimg library
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(version(), "0.3.0");
    }
}

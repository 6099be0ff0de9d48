//! Core module for rtimg
//!
//! # Architecture
//!
//! - `error`: Error types using thiserror
//! - `limits`: Byte-limit strings (`700k`, `2M`)
//! - `registry`: Suffix → policy table
//! - `pathkey`: Path segments and the suffix window
//! - `tags`: Fallback tag sources
//! - `resolver`: Shortest-suffix-first policy lookup
//! - `tools`: External encoder processes
//! - `encoder`: Budget-driven re-encoding
//! - `models`: Config, reports, run summary
//! - `walker`: Input expansion
//! - `renames`: Project directory renames
//! - `dispatcher`: Worker pool

pub mod error;
pub mod limits;
pub mod registry;
pub mod pathkey;
pub mod tags;
pub mod resolver;
pub mod tools;
pub mod encoder;
pub mod models;
pub mod walker;
pub mod renames;
pub mod dispatcher;

// Re-export commonly used types
pub use error::{Result, ResultExt, RtimgError};
pub use limits::{parse_size_limit, NO_LIMIT};
pub use registry::{PolicyRecord, Registry};
pub use pathkey::PathKey;
pub use tags::{FallbackTags, LegacyPosterFactory, NoTags, StaticTags, TagSource, TagSourceFactory};
pub use resolver::{Resolution, Resolver};
pub use tools::{ExternalTools, ImageInfo, ImageTools, ToolsConfig};
pub use encoder::{AdaptiveEncoder, Effort, Outcome, Reduction};
pub use models::{AssetOutcome, AssetReport, FormatFilter, RtimgConfig, RunSummary};
pub use walker::{AssetWalker, WalkConfig};
pub use renames::{RenamePlan, RenameReport};
pub use dispatcher::{DispatchOptions, Dispatcher};

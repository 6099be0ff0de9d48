//! Budget-constrained re-encoding
//!
//! [`AdaptiveEncoder::reduce_to_budget`] brings a file under its byte limit
//! by driving the [`ImageTools`] black boxes. Each step runs in a fixed order:
//! metadata strip, compliance check, encode/quantize, rename.
//!
//! - JPEG: linear sweep of the quality parameter from 0 (best) to 31, taking
//!   the first setting whose output fits. Output size is not assumed to be
//!   monotonic in `q`.
//! - PNG: quantize; if that fails, re-encode and quantize the re-encode.
//!
//! Output goes to a sibling temp artifact and only a successful result is
//! renamed over the original.

use crate::core::error::{Result, ResultExt, RtimgError};
use crate::core::tools::ImageTools;
use crate::core::walker::TEMP_MARKER;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Highest (worst) JPEG quality setting tried
pub const MAX_JPEG_QUALITY: u8 = 31;

/// How hard the encoder had to work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effort {
    /// No scalar quality knob was involved
    NotApplicable,
    /// JPEG quality setting that met the budget
    Quality(u8),
}

impl fmt::Display for Effort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effort::NotApplicable => write!(f, "n/a"),
            Effort::Quality(q) => write!(f, "q{}", q),
        }
    }
}

/// What happened to the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Already within budget, left alone
    Compliant,
    /// Replaced with a smaller encode
    Reduced,
}

/// Result of one `reduce_to_budget` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduction {
    pub original_size: u64,
    pub achieved_size: u64,
    pub effort: Effort,
    pub outcome: Outcome,
}

/// Codec families with a reduction strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecFamily {
    Jpeg,
    Png,
}

impl CodecFamily {
    /// Family for a path, by lower-cased extension
    pub fn of(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(CodecFamily::Jpeg),
            "png" => Some(CodecFamily::Png),
            _ => None,
        }
    }

    /// Codec name ffprobe reports for this family
    pub fn probe_codec(&self) -> &'static str {
        match self {
            CodecFamily::Jpeg => "mjpeg",
            CodecFamily::Png => "png",
        }
    }
}

/// Sibling temp artifact: `<file>####.<ext>`
pub fn temp_path(path: &Path) -> PathBuf {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_default();
    let mut name = path.as_os_str().to_os_string();
    name.push(format!("{}.{}", TEMP_MARKER, ext));
    PathBuf::from(name)
}

pub fn file_size(path: &Path) -> Result<u64> {
    Ok(fs::metadata(path)?.len())
}

/// Drives the tools toward a byte budget
pub struct AdaptiveEncoder<T: ImageTools> {
    tools: T,
}

impl<T: ImageTools> AdaptiveEncoder<T> {
    pub fn new(tools: T) -> Self {
        Self { tools }
    }

    pub fn tools(&self) -> &T {
        &self.tools
    }

    /// Make `path` fit in `byte_limit` bytes (`< 0` = unconstrained).
    ///
    /// A file already within budget is left as the metadata strip produced
    /// it and no encoder runs. Any failure is final for this file.
    pub fn reduce_to_budget(&self, path: &Path, byte_limit: i64) -> Result<Reduction> {
        self.tools.strip_metadata(path)?;
        let original_size = file_size(path)?;

        let limit = match u64::try_from(byte_limit) {
            Ok(limit) if original_size > limit => limit,
            _ => {
                return Ok(Reduction {
                    original_size,
                    achieved_size: original_size,
                    effort: Effort::NotApplicable,
                    outcome: Outcome::Compliant,
                })
            }
        };

        let family = CodecFamily::of(path).ok_or_else(|| RtimgError::UnsupportedFormat {
            extension: path
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default(),
        })?;

        let temp = temp_path(path);
        let attempt = match family {
            CodecFamily::Jpeg => self.reduce_jpeg(path, &temp, limit),
            CodecFamily::Png => self.reduce_png(path, &temp, limit),
        };

        let (achieved_size, effort) = match attempt {
            Ok(result) => result,
            Err(err) => {
                discard(&temp);
                return Err(err);
            }
        };

        let replaced = fs::rename(&temp, path)
            .map_err(RtimgError::from)
            .context(format!("cannot replace {}", path.display()));
        if let Err(err) = replaced {
            discard(&temp);
            return Err(err);
        }

        Ok(Reduction {
            original_size,
            achieved_size,
            effort,
            outcome: Outcome::Reduced,
        })
    }

    fn reduce_jpeg(&self, input: &Path, temp: &Path, limit: u64) -> Result<(u64, Effort)> {
        let mut last_size = 0;
        for q in 0..=MAX_JPEG_QUALITY {
            self.tools.encode_jpeg(input, temp, q)?;
            last_size = file_size(temp)?;
            tracing::trace!(q, size = last_size, limit, "jpeg attempt");
            if last_size <= limit {
                return Ok((last_size, Effort::Quality(q)));
            }
        }
        Err(RtimgError::BudgetUnreachable {
            achieved: last_size,
            limit,
        })
    }

    fn reduce_png(&self, input: &Path, temp: &Path, limit: u64) -> Result<(u64, Effort)> {
        if let Err(err) = self.tools.quantize_png(input, temp) {
            tracing::debug!(file = %input.display(), %err, "quantize failed, re-encoding first");
            self.tools.reencode_png(input, temp)?;
            self.tools.quantize_png(temp, temp)?;
        }
        let size = file_size(temp)?;
        if size > limit {
            return Err(RtimgError::BudgetUnreachable {
                achieved: size,
                limit,
            });
        }
        Ok((size, Effort::NotApplicable))
    }
}

/// Best-effort removal of a temp artifact
fn discard(temp: &Path) {
    match fs::remove_file(temp) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(file = %temp.display(), error = %e, "could not remove temp artifact"),
    }
}

//! External image tools
//!
//! The encoder treats the tools as opaque black boxes behind [`ImageTools`].
//! [`ExternalTools`] is the production implementation: `exiftool` strips
//! metadata, `ffmpeg` re-encodes, `pngquant` quantizes and `ffprobe` reports
//! what a file really contains. Every invocation is bounded by a timeout.

use crate::core::error::{Result, RtimgError};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use wait_timeout::ChildExt;

#[cfg(test)]
use mockall::automock;

/// Operations the adaptive encoder needs from the outside world.
///
/// Each call either produces its output file or fails; none of them are
/// retried by the caller.
#[cfg_attr(test, automock)]
pub trait ImageTools: Send + Sync {
    /// Remove metadata in place. Must be idempotent.
    fn strip_metadata(&self, path: &Path) -> Result<()>;

    /// Encode `input` as JPEG at `quality` (0 = best, 31 = worst) into `output`
    fn encode_jpeg(&self, input: &Path, output: &Path, quality: u8) -> Result<()>;

    /// Lossy palette quantization of a PNG
    fn quantize_png(&self, input: &Path, output: &Path) -> Result<()>;

    /// Plain metadata-free PNG re-encode
    fn reencode_png(&self, input: &Path, output: &Path) -> Result<()>;

    /// Codec and pixel dimensions of the first video stream
    fn probe(&self, path: &Path) -> Result<ImageInfo>;
}

/// What a probe found inside a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    /// ffprobe codec name (`mjpeg`, `png`, ...)
    pub codec: String,
    pub width: u32,
    pub height: u32,
}

impl ImageInfo {
    pub fn new(codec: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            codec: codec.into(),
            width,
            height,
        }
    }

    /// `WxH`, the same shape as a leaf size tag
    pub fn dimensions(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Tool locations and limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg: PathBuf,
    pub pngquant: PathBuf,
    pub exiftool: PathBuf,
    pub ffprobe: PathBuf,
    /// Per-invocation timeout in seconds; must be at least 1
    pub timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            pngquant: PathBuf::from("pngquant"),
            exiftool: PathBuf::from("exiftool"),
            ffprobe: PathBuf::from("ffprobe"),
            timeout_secs: 120,
        }
    }
}

impl ToolsConfig {
    /// Reject settings no invocation could honour
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(RtimgError::invalid_config(
                "tools.timeout_secs must be at least 1",
            ));
        }
        Ok(())
    }
}

/// How to treat anything a tool prints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Diagnostics {
    /// Any output means failure (ffmpeg with `-loglevel error`, pngquant)
    Fatal,
    /// Output is informational (exiftool prints a summary line)
    Tolerated,
    /// Stdout is the result; anything on stderr means failure (ffprobe)
    Captured,
}

/// Runs the real binaries
#[derive(Debug, Clone, Default)]
pub struct ExternalTools {
    config: ToolsConfig,
}

impl ExternalTools {
    pub fn new(config: ToolsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ToolsConfig {
        &self.config
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }
}

impl ImageTools for ExternalTools {
    fn strip_metadata(&self, path: &Path) -> Result<()> {
        let args: Vec<OsString> = vec![
            "-overwrite_original".into(),
            "-all=".into(),
            path.into(),
        ];
        run_tool("exiftool", &self.config.exiftool, &args, Diagnostics::Tolerated, self.timeout())?;
        Ok(())
    }

    fn encode_jpeg(&self, input: &Path, output: &Path, quality: u8) -> Result<()> {
        let args: Vec<OsString> = vec![
            "-i".into(),
            input.into(),
            "-q:v".into(),
            quality.to_string().into(),
            "-pix_fmt".into(),
            "rgb24".into(),
            "-map_metadata".into(),
            "-1".into(),
            "-loglevel".into(),
            "error".into(),
            "-y".into(),
            output.into(),
        ];
        run_tool("ffmpeg", &self.config.ffmpeg, &args, Diagnostics::Fatal, self.timeout())?;
        Ok(())
    }

    fn quantize_png(&self, input: &Path, output: &Path) -> Result<()> {
        let args: Vec<OsString> = vec![
            "--force".into(),
            "--skip-if-larger".into(),
            "--output".into(),
            output.into(),
            "--quality=0-100".into(),
            "--speed".into(),
            "1".into(),
            "--strip".into(),
            "--".into(),
            input.into(),
        ];
        run_tool("pngquant", &self.config.pngquant, &args, Diagnostics::Fatal, self.timeout())?;
        Ok(())
    }

    fn reencode_png(&self, input: &Path, output: &Path) -> Result<()> {
        let args: Vec<OsString> = vec![
            "-i".into(),
            input.into(),
            "-q:v".into(),
            "0".into(),
            "-map_metadata".into(),
            "-1".into(),
            "-loglevel".into(),
            "error".into(),
            "-y".into(),
            output.into(),
        ];
        run_tool("ffmpeg", &self.config.ffmpeg, &args, Diagnostics::Fatal, self.timeout())?;
        Ok(())
    }

    fn probe(&self, path: &Path) -> Result<ImageInfo> {
        let args: Vec<OsString> = vec![
            "-v".into(),
            "error".into(),
            "-select_streams".into(),
            "v:0".into(),
            "-show_entries".into(),
            "stream=codec_name,width,height".into(),
            "-of".into(),
            "json".into(),
            path.into(),
        ];
        let stdout = run_tool(
            "ffprobe",
            &self.config.ffprobe,
            &args,
            Diagnostics::Captured,
            self.timeout(),
        )?;
        parse_probe(&stdout)
    }
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_name: String,
    width: u32,
    height: u32,
}

/// Read ffprobe's `-of json` stream listing
pub(crate) fn parse_probe(stdout: &[u8]) -> Result<ImageInfo> {
    let output: ProbeOutput = serde_json::from_slice(stdout)
        .map_err(|e| RtimgError::tool_failure("ffprobe", format!("unreadable output: {}", e)))?;
    let stream = output
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| RtimgError::tool_failure("ffprobe", "no image stream"))?;
    Ok(ImageInfo::new(
        stream.codec_name.to_lowercase(),
        stream.width,
        stream.height,
    ))
}

/// Run one tool to completion or until `timeout` and return its stdout.
pub(crate) fn run_tool(
    tool: &str,
    program: &Path,
    args: &[OsString],
    diagnostics: Diagnostics,
    timeout: Duration,
) -> Result<Vec<u8>> {
    tracing::trace!(tool, program = %program.display(), ?args, "spawning");

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| RtimgError::tool_failure(tool, format!("cannot start {}: {}", program.display(), e)))?;

    // Drain both pipes while waiting so a chatty tool cannot block on a full pipe
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let out_reader = thread::spawn(move || drain(stdout));
    let err_reader = thread::spawn(move || drain(stderr));

    let status = match child
        .wait_timeout(timeout)
        .map_err(|e| RtimgError::tool_failure(tool, e.to_string()))?
    {
        Some(status) => status,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(RtimgError::tool_failure(
                tool,
                format!("timed out after {}s", timeout.as_secs()),
            ));
        }
    };

    let stdout = out_reader.join().unwrap_or_default();
    let stderr = err_reader.join().unwrap_or_default();

    if !status.success() {
        let mut output = stdout;
        output.extend(stderr);
        return Err(RtimgError::tool_failure(
            tool,
            format!("{}: {}", status, String::from_utf8_lossy(&output).trim()),
        ));
    }

    let unexpected = match diagnostics {
        Diagnostics::Fatal => [stdout.as_slice(), stderr.as_slice()].concat(),
        Diagnostics::Captured => stderr,
        Diagnostics::Tolerated => Vec::new(),
    };
    if !unexpected.is_empty() {
        return Err(RtimgError::tool_failure(
            tool,
            format!(
                "unexpected output: {:?}",
                String::from_utf8_lossy(&unexpected).trim()
            ),
        ));
    }
    Ok(stdout)
}

fn drain<R: Read>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    buf
}

//! Worker pool over asset paths
//!
//! Paths go into one MPMC channel and a fixed number of workers pull from it.
//! Each worker resolves the policy, checks that the content matches the name,
//! then reduces the file to budget (or only compares sizes in check mode), and
//! sends exactly one [`AssetReport`] back.
//! The calling thread drains the reports into a [`RunSummary`] and hands each
//! one to the caller's sink as it arrives.

use crate::core::encoder::{file_size, AdaptiveEncoder, CodecFamily, Outcome};
use crate::core::error::{Result, RtimgError};
use crate::core::models::{AssetOutcome, AssetReport, FormatFilter, RtimgConfig, RunSummary};
use crate::core::pathkey::LOGO_TAG;
use crate::core::renames::RenamePlan;
use crate::core::resolver::{Resolution, Resolver};
use crate::core::tags::{FallbackTags, NoTags, TagSourceFactory};
use crate::core::tools::ImageTools;
use crossbeam::channel;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;

/// Knobs for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOptions {
    pub threads: usize,
    pub format: FormatFilter,
    pub check_only: bool,
    /// Trust names without probing the content
    pub skip_probe: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            threads: 1,
            format: FormatFilter::All,
            check_only: false,
            skip_probe: false,
        }
    }
}

impl From<&RtimgConfig> for DispatchOptions {
    fn from(config: &RtimgConfig) -> Self {
        Self {
            threads: config.worker_count(),
            format: config.format,
            check_only: config.check_only,
            skip_probe: config.skip_probe,
        }
    }
}

pub struct Dispatcher<'r, T: ImageTools> {
    resolver: Resolver<'r>,
    encoder: AdaptiveEncoder<T>,
    /// Tag sources are only ever built under this lock
    tags: Mutex<Box<dyn TagSourceFactory>>,
    options: DispatchOptions,
    renames: Option<Arc<RenamePlan>>,
}

impl<'r, T: ImageTools> Dispatcher<'r, T> {
    pub fn new(resolver: Resolver<'r>, tools: T, options: DispatchOptions) -> Self {
        Self {
            resolver,
            encoder: AdaptiveEncoder::new(tools),
            tags: Mutex::new(Box::new(NoTags) as Box<dyn TagSourceFactory>),
            options,
            renames: None,
        }
    }

    /// Use `factory` for the resolver's tag fallback
    pub fn with_tags(mut self, factory: impl TagSourceFactory + 'static) -> Self {
        self.tags = Mutex::new(Box::new(factory) as Box<dyn TagSourceFactory>);
        self
    }

    /// Collect project renames into `plan`
    pub fn with_renames(mut self, plan: Arc<RenamePlan>) -> Self {
        self.renames = Some(plan);
        self
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// Process every path and return the aggregate.
    ///
    /// `on_report` runs on the calling thread, once per path, in completion
    /// order.
    pub fn run<F>(&self, paths: Vec<PathBuf>, mut on_report: F) -> RunSummary
    where
        F: FnMut(&AssetReport),
    {
        let mut summary = RunSummary::default();
        if paths.is_empty() {
            return summary;
        }
        let workers = self.options.threads.clamp(1, paths.len());
        tracing::debug!(files = paths.len(), workers, "starting run");

        let (job_tx, job_rx) = channel::unbounded::<PathBuf>();
        for path in paths {
            // receiver is alive until the scope below ends
            let _ = job_tx.send(path);
        }
        drop(job_tx);

        let (report_tx, report_rx) = channel::unbounded::<AssetReport>();
        thread::scope(|scope| {
            for _ in 0..workers {
                let jobs = job_rx.clone();
                let reports = report_tx.clone();
                scope.spawn(move || {
                    for path in jobs.iter() {
                        if reports.send(self.process(&path)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(report_tx);

            for report in report_rx.iter() {
                summary.record(&report);
                on_report(&report);
            }
        });

        summary
    }

    /// Handle a single path; never fails, errors land in the report
    pub fn process(&self, path: &Path) -> AssetReport {
        if !self.options.format.accepts(path) {
            return AssetReport::bare(path, AssetOutcome::Skipped);
        }

        let tags = self.build_tags(path);
        let resolution = match self.resolver.resolve(path, &tags) {
            Ok(resolution) => resolution,
            Err(err) => {
                tracing::error!(file = %path.display(), error = %err, "cannot resolve policy");
                return AssetReport::failed(path, err);
            }
        };

        let mut report = AssetReport::bare(path, AssetOutcome::Compliant);
        let directory = resolution.project_directory();
        if directory.is_empty() {
            tracing::warn!(file = %path.display(), "empty project directory");
        }
        report.project_name = resolution.project_name().map(str::to_string);
        report.project_directory = Some(directory);
        report.policy = Some(resolution.policy().clone());
        self.record_rename(&resolution);

        if let Err(err) = self.verify_content(path, &resolution) {
            tracing::error!(file = %path.display(), error = %err, "content check failed");
            report.outcome = AssetOutcome::Failed(err);
            return report;
        }

        let outcome = if self.options.check_only {
            self.check(path, &resolution, &mut report)
        } else {
            self.reduce(path, &resolution, &mut report)
        };
        match outcome {
            Ok(outcome) => {
                report.outcome = outcome;
                tracing::info!(
                    file = %path.display(),
                    family = %resolution.policy().family,
                    outcome = report.outcome.label(),
                    "processed"
                );
            }
            Err(err) => {
                tracing::error!(file = %path.display(), error = %err, "processing failed");
                report.outcome = AssetOutcome::Failed(err);
            }
        }
        report
    }

    fn build_tags(&self, path: &Path) -> FallbackTags {
        let mut factory = match self.tags.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        factory.build(path)
    }

    fn record_rename(&self, resolution: &Resolution) {
        let plan = match &self.renames {
            Some(plan) => plan,
            None => return,
        };
        if let Some(name) = resolution.key().name_override() {
            plan.record(&resolution.project_directory(), name);
        }
    }

    /// Probe JPEG/PNG files and compare codec and pixel size with the name
    fn verify_content(&self, path: &Path, resolution: &Resolution) -> Result<()> {
        if self.options.skip_probe {
            return Ok(());
        }
        let family = match CodecFamily::of(path) {
            Some(family) => family,
            None => return Ok(()),
        };

        let info = self.encoder.tools().probe(path)?;
        if info.codec != family.probe_codec() {
            return Err(RtimgError::ContentMismatch {
                expected: family.probe_codec().to_string(),
                found: info.codec,
            });
        }

        let size_tag = resolution.key().size_tag();
        if size_tag != LOGO_TAG && info.dimensions() != size_tag {
            return Err(RtimgError::ContentMismatch {
                expected: size_tag.to_string(),
                found: info.dimensions(),
            });
        }
        Ok(())
    }

    fn check(
        &self,
        path: &Path,
        resolution: &Resolution,
        report: &mut AssetReport,
    ) -> Result<AssetOutcome> {
        let size = file_size(path)?;
        report.original_size = size;
        report.achieved_size = size;
        Ok(match resolution.policy().budget() {
            Some(limit) if size > limit => AssetOutcome::OverBudget,
            _ => AssetOutcome::Compliant,
        })
    }

    fn reduce(
        &self,
        path: &Path,
        resolution: &Resolution,
        report: &mut AssetReport,
    ) -> Result<AssetOutcome> {
        let reduction = self
            .encoder
            .reduce_to_budget(path, resolution.policy().byte_limit)?;
        report.original_size = reduction.original_size;
        report.achieved_size = reduction.achieved_size;
        report.effort = reduction.effort;
        Ok(match reduction.outcome {
            Outcome::Compliant => AssetOutcome::Compliant,
            Outcome::Reduced => AssetOutcome::Reduced,
        })
    }
}

impl<'r, T: ImageTools> std::fmt::Debug for Dispatcher<'r, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("options", &self.options)
            .field("renames", &self.renames.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::encoder::Effort;
    use crate::core::registry::Registry;
    use crate::core::tags::LegacyPosterFactory;
    use crate::core::tools::{ImageInfo, MockImageTools};
    use std::fs;
    use tempfile::TempDir;

    fn registry() -> Registry {
        Registry::from_table(&[
            ("./350x500.jpg", "t", ""),
            ("./600x600.jpg", "t", "1k"),
            ("./logo.png", "t", "1k"),
        ])
        .unwrap()
    }

    /// What a correctly named file would probe as
    fn named_info(path: &Path) -> ImageInfo {
        let codec = CodecFamily::of(path).map_or("psd", |f| f.probe_codec());
        let stem = path.file_stem().unwrap().to_string_lossy().to_string();
        let tag = stem.rsplit('_').next().unwrap_or_default();
        let tag = tag.trim_start_matches(|c: char| !c.is_ascii_digit());
        let (w, h) = tag.split_once('x').unwrap_or(("0", "0"));
        ImageInfo::new(codec, w.parse().unwrap_or(0), h.parse().unwrap_or(0))
    }

    fn probing_tools() -> MockImageTools {
        let mut tools = MockImageTools::new();
        tools.expect_probe().returning(|p| Ok(named_info(p)));
        tools
    }

    fn write(dir: &Path, rel: &str, size: usize) -> PathBuf {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, vec![0u8; size]).unwrap();
        path
    }

    #[test]
    fn test_check_only_never_modifies() {
        let dir = TempDir::new().unwrap();
        let big = write(dir.path(), "p/600x600.jpg", 2000);
        let small = write(dir.path(), "q/600x600.jpg", 500);

        let registry = registry();
        let mut tools = probing_tools();
        tools.expect_strip_metadata().never();
        tools.expect_encode_jpeg().never();

        let options = DispatchOptions {
            threads: 2,
            check_only: true,
            ..Default::default()
        };
        let dispatcher = Dispatcher::new(Resolver::new(&registry), tools, options);
        let mut seen = 0;
        let summary = dispatcher.run(vec![big.clone(), small], |_| seen += 1);

        assert_eq!(seen, 2);
        assert_eq!(summary.over_budget, 1);
        assert_eq!(summary.compliant, 1);
        assert_eq!(summary.failures[0].0, big);
        assert_eq!(fs::metadata(&big).unwrap().len(), 2000);
    }

    #[test]
    fn test_one_failure_does_not_stop_the_run() {
        let dir = TempDir::new().unwrap();
        let good = write(dir.path(), "p/350x500.jpg", 100);
        let bad = write(dir.path(), "p/999x999.jpg", 100);

        let registry = registry();
        let mut tools = probing_tools();
        tools.expect_strip_metadata().returning(|_| Ok(()));

        let dispatcher = Dispatcher::new(
            Resolver::new(&registry),
            tools,
            DispatchOptions {
                threads: 4,
                ..Default::default()
            },
        );
        let summary = dispatcher.run(vec![good, bad.clone()], |_| {});

        assert_eq!(summary.total, 2);
        assert_eq!(summary.compliant, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures[0].0, bad);
    }

    #[test]
    fn test_format_filter_skips() {
        let dir = TempDir::new().unwrap();
        let logo = write(dir.path(), "p/logo.png", 100);

        let registry = registry();
        let tools = MockImageTools::new();
        let dispatcher = Dispatcher::new(
            Resolver::new(&registry),
            tools,
            DispatchOptions {
                format: FormatFilter::Jpg,
                ..Default::default()
            },
        );
        let report = dispatcher.process(&logo);
        assert!(matches!(report.outcome, AssetOutcome::Skipped));
    }

    #[test]
    fn test_reduce_fills_report() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "p/600x600.jpg", 3000);

        let registry = registry();
        let mut tools = probing_tools();
        tools.expect_strip_metadata().returning(|_| Ok(()));
        tools
            .expect_encode_jpeg()
            .returning(|_, out, q| Ok(fs::write(out, vec![0u8; 1500 - q as usize * 100])?));

        let dispatcher = Dispatcher::new(Resolver::new(&registry), tools, Default::default());
        let report = dispatcher.process(&path);

        assert!(matches!(report.outcome, AssetOutcome::Reduced));
        assert_eq!(report.effort, Effort::Quality(5));
        assert_eq!(report.achieved_size, 1000);
        assert_eq!(report.original_size, 3000);
        assert_eq!(
            report.project_directory.as_deref(),
            Some(dir.path().join("p").to_string_lossy().as_ref())
        );
    }

    #[test]
    fn test_fallback_records_rename() {
        let dir = TempDir::new().unwrap();
        let legacy = write(
            dir.path(),
            "x123/sd_2018_sobibor__12_q0w2_ar2_poster525x300.jpg",
            10,
        );
        let registry = Registry::from_table(&[("./525x300.jpg", "rt", "")]).unwrap();
        let mut tools = probing_tools();
        tools.expect_strip_metadata().returning(|_| Ok(()));

        let plan = Arc::new(RenamePlan::new());
        let dispatcher = Dispatcher::new(Resolver::new(&registry), tools, Default::default())
            .with_tags(LegacyPosterFactory)
            .with_renames(Arc::clone(&plan));
        let report = dispatcher.process(&legacy);

        assert!(matches!(report.outcome, AssetOutcome::Compliant));
        assert_eq!(report.project_name.as_deref(), Some("sobibor_2018_sd"));
        assert_eq!(
            plan.target(&dir.path().join("x123").to_string_lossy()).as_deref(),
            Some("sobibor_2018_sd")
        );
    }

    #[test]
    fn test_unresolved_without_tags_fails() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "p/readme_600x600.txt", 10);
        let registry = registry();
        let dispatcher =
            Dispatcher::new(Resolver::new(&registry), MockImageTools::new(), Default::default());
        let report = dispatcher.process(&path);
        assert!(matches!(
            report.outcome,
            AssetOutcome::Failed(RtimgError::PolicyNotFound { .. })
        ));
    }

    #[test]
    fn test_dimension_mismatch_fails_before_encoding() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "p/600x600.jpg", 3000);

        let registry = registry();
        let mut tools = MockImageTools::new();
        tools
            .expect_probe()
            .times(1)
            .returning(|_| Ok(ImageInfo::new("mjpeg", 600, 840)));
        tools.expect_strip_metadata().never();
        tools.expect_encode_jpeg().never();

        let dispatcher = Dispatcher::new(Resolver::new(&registry), tools, Default::default());
        let report = dispatcher.process(&path);
        match report.outcome {
            AssetOutcome::Failed(RtimgError::ContentMismatch { expected, found }) => {
                assert_eq!(expected, "600x600");
                assert_eq!(found, "600x840");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(fs::metadata(&path).unwrap().len(), 3000);
    }

    #[test]
    fn test_codec_mismatch_fails() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "p/600x600.jpg", 500);

        let registry = registry();
        let mut tools = MockImageTools::new();
        tools
            .expect_probe()
            .returning(|_| Ok(ImageInfo::new("png", 600, 600)));

        let options = DispatchOptions {
            check_only: true,
            ..Default::default()
        };
        let dispatcher = Dispatcher::new(Resolver::new(&registry), tools, options);
        let report = dispatcher.process(&path);
        assert!(matches!(
            report.outcome,
            AssetOutcome::Failed(RtimgError::ContentMismatch { ref found, .. }) if found == "png"
        ));
    }

    #[test]
    fn test_matching_content_and_logo_pass() {
        let dir = TempDir::new().unwrap();
        let sized = write(dir.path(), "p/600x600.jpg", 500);
        let logo = write(dir.path(), "p/logo.png", 500);

        let registry = registry();
        let mut tools = MockImageTools::new();
        tools
            .expect_probe()
            .returning(|p| {
                Ok(if p.extension().map_or(false, |e| e == "png") {
                    ImageInfo::new("png", 1234, 321)
                } else {
                    ImageInfo::new("mjpeg", 600, 600)
                })
            });

        let options = DispatchOptions {
            check_only: true,
            ..Default::default()
        };
        let dispatcher = Dispatcher::new(Resolver::new(&registry), tools, options);
        assert!(matches!(dispatcher.process(&sized).outcome, AssetOutcome::Compliant));
        assert!(matches!(dispatcher.process(&logo).outcome, AssetOutcome::Compliant));
    }

    #[test]
    fn test_content_check_can_be_disabled() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "p/600x600.jpg", 500);

        let registry = registry();
        let mut tools = MockImageTools::new();
        tools.expect_probe().never();

        let options = DispatchOptions {
            check_only: true,
            skip_probe: true,
            ..Default::default()
        };
        let dispatcher = Dispatcher::new(Resolver::new(&registry), tools, options);
        assert!(matches!(dispatcher.process(&path).outcome, AssetOutcome::Compliant));
    }
}

//! rtimg CLI
//!
//! Thin wrapper over the library: parse flags, merge them into the loaded
//! config, expand inputs, run the dispatcher and print progress.

use anyhow::Context;
use clap::{ArgAction, Parser, ValueEnum};
use rtimg::core::limits::format_kb;
use rtimg::{
    AssetOutcome, AssetReport, AssetWalker, DispatchOptions, Dispatcher, ExternalTools,
    FormatFilter, LegacyPosterFactory, Registry, RenamePlan, Resolver, RtimgConfig, RunSummary,
    WalkConfig,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Check image assets against their naming policy and re-encode them under budget.
#[derive(Parser, Debug)]
#[command(name = "rtimg")]
#[command(version = rtimg::VERSION)]
#[command(after_help = "Examples:
  # Report files over budget without touching them
  rtimg --check posters/

  # Re-encode only JPEGs with 8 workers
  rtimg -f jpg -t 8 posters/
")]
struct Cli {
    /// Files or directories to process
    #[arg(value_name = "PATH", required = true)]
    paths: Vec<PathBuf>,

    /// Number of worker threads. Defaults to one per CPU.
    #[arg(short = 't', long = "threads", value_name = "N")]
    threads: Option<usize>,

    /// Formats to process
    #[arg(short = 'f', long = "format", value_enum)]
    format: Option<FormatArg>,

    /// Only compare sizes against the limits, never modify files
    #[arg(long = "check")]
    check: bool,

    /// Trust file names; skip the ffprobe codec and dimension check
    #[arg(long = "no-probe")]
    no_probe: bool,

    /// Path to a JSON configuration file. Defaults to ./.rtimg_config.json
    #[arg(short = 'c', long = "config", value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Glob patterns excluded from directory walks. Adds to config excludes.
    #[arg(long = "exclude", value_name = "PATTERN", num_args = 1..)]
    exclude: Vec<String>,

    /// Rename project directories after names recovered from legacy file names
    #[arg(long = "rename-projects")]
    rename_projects: bool,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace). RTIMG_LOG overrides.
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Jpg,
    Png,
    All,
}

impl From<FormatArg> for FormatFilter {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Jpg => FormatFilter::Jpg,
            FormatArg::Png => FormatFilter::Png,
            FormatArg::All => FormatFilter::All,
        }
    }
}

fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_env("RTIMG_LOG").unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .init();
}

/// Config file plus CLI overrides
fn load_config(cli: &Cli) -> anyhow::Result<RtimgConfig> {
    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let mut config = RtimgConfig::load(cli.config.as_deref(), &cwd)?;
    if let Some(threads) = cli.threads {
        config.threads = threads;
    }
    if let Some(format) = cli.format {
        config.format = format.into();
    }
    config.check_only |= cli.check;
    config.skip_probe |= cli.no_probe;
    config.exclude.extend(cli.exclude.iter().cloned());
    Ok(config)
}

/// Width of the file name column in progress lines
const NAME_COLUMN: usize = 50;

/// Right-aligns `name` in `width` columns, cutting long names to end in `...`
fn fit_column(name: &str, width: usize) -> String {
    if name.chars().count() > width {
        let kept: String = name.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        format!("{:>width$}", name, width = width)
    }
}

/// Prints `+ NN/TT name message` (or `-` for problems) as reports arrive
struct Progress {
    done: usize,
    total: usize,
    width: usize,
}

impl Progress {
    fn new(total: usize) -> Self {
        Self {
            done: 0,
            total,
            width: total.to_string().len(),
        }
    }

    fn report(&mut self, report: &AssetReport) {
        self.done += 1;
        let marker = if report.is_failure() { '-' } else { '+' };
        let name = report
            .path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| report.path.to_string_lossy());
        eprintln!(
            "{} {:0width$}/{} {} {}",
            marker,
            self.done,
            self.total,
            fit_column(&name, NAME_COLUMN),
            report.message(),
            width = self.width
        );
    }
}

fn print_summary(summary: &RunSummary) {
    if !summary.failures.is_empty() {
        eprintln!();
        eprintln!("ERRORS");
        eprintln!("========");
        for (path, message) in &summary.failures {
            eprintln!("{} {}", message, path.display());
        }
        eprintln!("========");
    }
    eprintln!(
        "{} files: {} ok, {} reduced, {} over budget, {} skipped, {} failed",
        summary.total,
        summary.compliant,
        summary.reduced,
        summary.over_budget,
        summary.skipped,
        summary.failed
    );
}

fn run(cli: &Cli, config: RtimgConfig, files: Vec<PathBuf>) -> RunSummary {
    let options = DispatchOptions::from(&config);
    let tools = ExternalTools::new(config.tools.clone());
    let plan = Arc::new(RenamePlan::new());

    let mut dispatcher = Dispatcher::new(Resolver::builtin(), tools, options)
        .with_tags(LegacyPosterFactory);
    if cli.rename_projects {
        dispatcher = dispatcher.with_renames(Arc::clone(&plan));
    }

    let mut progress = Progress::new(files.len());
    let mut saved = 0u64;
    let summary = dispatcher.run(files, |report| {
        if let AssetOutcome::Reduced = report.outcome {
            saved += report.original_size.saturating_sub(report.achieved_size);
        }
        progress.report(report);
    });
    if saved > 0 {
        tracing::info!(saved = %format_kb(saved), "run finished");
    }

    if cli.rename_projects && !options.check_only {
        for conflict in plan.conflicts() {
            eprintln!(
                "duplicate project name for {}: kept {}, ignored {}",
                conflict.directory, conflict.kept, conflict.rejected
            );
        }
        let renames = plan.apply();
        for (from, to) in &renames.renamed {
            eprintln!("renamed {} -> {}", from.display(), to.display());
        }
        for (dir, err) in &renames.errors {
            eprintln!("cannot rename {}: {}", dir.display(), err);
        }
    }

    summary
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(2);
        }
    };

    let registry = Registry::builtin();
    let walk = WalkConfig {
        exclude_patterns: config.exclude.clone(),
        ..Default::default()
    };
    let files = match AssetWalker::new(registry, walk).and_then(|w| w.collect(&cli.paths)) {
        Ok(files) => files,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };
    if files.is_empty() {
        eprintln!("No asset files found");
        return ExitCode::SUCCESS;
    }

    let summary = run(&cli, config, files);
    print_summary(&summary);
    if summary.has_problems() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

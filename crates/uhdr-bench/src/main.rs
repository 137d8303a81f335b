//! uhdr-bench: CLI tool for applying edit pipelines and collecting diagnostics.
//!
//! Loads an image, applies an edit pipeline to it and prints per-node
//! timing diagnostics. Useful for:
//!
//! - Measuring which operators dominate evaluation time
//! - Checking how much the incremental executor reuses across runs
//! - Applying a stored sidecar pipeline (or a JSON one) from the shell
//! - Exporting an edited image
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin uhdr-bench -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use log::{LevelFilter, Log, Metadata, Record, info, warn};
use uhdr_io::{IoConfig, MetadataStore, ThumbnailCache, read_image, write_image};
use uhdr_pipeline::diagnostics::EvaluationDiagnostics;
use uhdr_pipeline::operators::{ContrastParams, ExposureParams, SaturationParams};
use uhdr_pipeline::{
    Clock, ColorImage, IncrementalExecutor, OperatorParams, PipelineDescriptor, ProcessPipe,
    evaluate_with_diagnostics,
};

/// Apply uhdr edit pipelines to an image and report per-node diagnostics.
#[derive(Parser)]
#[command(name = "uhdr-bench", version)]
struct Cli {
    /// Path to the input image (JPEG, PNG, Radiance HDR, OpenEXR).
    image_path: PathBuf,

    /// Exposure change in stops.
    #[arg(long, default_value_t = ExposureParams::DEFAULT_EV, allow_negative_numbers = true)]
    exposure: f32,

    /// Contrast amount (-100 to 100).
    #[arg(long, default_value_t = ContrastParams::DEFAULT_CONTRAST, allow_negative_numbers = true)]
    contrast: f32,

    /// Saturation amount (-100 to 100).
    #[arg(long, default_value_t = SaturationParams::DEFAULT_SATURATION, allow_negative_numbers = true)]
    saturation: f32,

    /// Saturation remapping method.
    #[arg(long, value_enum, default_value_t = Method::Gamma)]
    saturation_method: Method,

    /// Full pipeline descriptor as a JSON string.
    ///
    /// When provided, all individual operator flags are ignored.
    #[arg(long, conflicts_with = "load_sidecar")]
    pipe_json: Option<String>,

    /// Use the pipeline stored in the image's sidecar.
    ///
    /// All individual operator flags are ignored; the default pipeline
    /// is used when the image has no sidecar.
    #[arg(long)]
    load_sidecar: bool,

    /// Store the applied pipeline in the image's sidecar.
    #[arg(long)]
    save_sidecar: bool,

    /// Write the edited image to this file (format by extension).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Edit the cached thumbnail instead of the full image, building it
    /// if needed.
    #[arg(long)]
    thumbnail: bool,

    /// Reuse unchanged node results between runs.
    #[arg(long)]
    incremental: bool,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Increase log output (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// I/O configuration as a JSON string (sidecar and thumbnail layout).
    #[arg(long)]
    config_json: Option<String>,
}

/// Saturation method selection.
#[derive(Clone, Copy, ValueEnum)]
enum Method {
    /// Gamma curve on HSV saturation.
    Gamma,
    /// Linear scaling of HSV saturation.
    Linear,
}

impl From<Method> for uhdr_pipeline::operators::SaturationMethod {
    fn from(method: Method) -> Self {
        match method {
            Method::Gamma => Self::Gamma,
            Method::Linear => Self::Linear,
        }
    }
}

/// Minimal `log` backend writing to stderr.
struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5}] {}: {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

/// Parse `--config-json`, falling back to the defaults.
fn io_config_from_cli(cli: &Cli) -> Result<IoConfig, String> {
    let config = match cli.config_json {
        Some(ref json) => serde_json::from_str::<IoConfig>(json)
            .map_err(|e| format!("Error parsing --config-json: {e}"))?,
        None => IoConfig::default(),
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

/// Directory holding `image_path`, for sidecar and thumbnail lookup.
fn image_dir(image_path: &Path) -> &Path {
    match image_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

/// Build the pipe to apply from CLI arguments.
///
/// `--pipe-json` wins, then `--load-sidecar`; otherwise the default
/// pipe with the individual operator flags applied.
fn pipe_from_cli(cli: &Cli, sidecars: &MetadataStore) -> Result<ProcessPipe, String> {
    if let Some(ref json) = cli.pipe_json {
        let descriptor: PipelineDescriptor =
            serde_json::from_str(json).map_err(|e| format!("Error parsing --pipe-json: {e}"))?;
        return ProcessPipe::from_descriptor(descriptor).map_err(|e| e.to_string());
    }

    if cli.load_sidecar {
        return match sidecars.load_pipeline_for(&cli.image_path) {
            Ok(Some(descriptor)) => {
                info!("using stored pipeline for {}", cli.image_path.display());
                ProcessPipe::from_descriptor(descriptor).map_err(|e| e.to_string())
            }
            Ok(None) => {
                warn!("{} has no stored pipeline, using defaults", cli.image_path.display());
                Ok(ProcessPipe::default())
            }
            Err(e) => Err(e.to_string()),
        };
    }

    let mut pipe = ProcessPipe::default();
    let edits = [
        (
            "exposure",
            OperatorParams::Exposure(ExposureParams { ev: cli.exposure }),
        ),
        (
            "contrast",
            OperatorParams::Contrast(ContrastParams {
                contrast: cli.contrast,
            }),
        ),
        (
            "saturation",
            OperatorParams::Saturation(SaturationParams {
                saturation: cli.saturation,
                method: cli.saturation_method.into(),
            }),
        ),
    ];
    for (name, params) in edits {
        let index = pipe
            .index_of(name)
            .ok_or_else(|| format!("default pipe has no {name} node"))?;
        pipe.set_parameters(index, params)
            .map_err(|e| format!("--{name}: {e}"))?;
    }
    Ok(pipe)
}

fn load_source(cli: &Cli, config: &IoConfig) -> Result<ColorImage, String> {
    let image = if cli.thumbnail {
        ThumbnailCache::new(image_dir(&cli.image_path), config).load_or_build(&cli.image_path)
    } else {
        read_image(&cli.image_path)
    };
    image.map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match io_config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    let sidecars = MetadataStore::from_config(image_dir(&cli.image_path), &config);

    let mut pipe = match pipe_from_cli(&cli, &sidecars) {
        Ok(p) => p,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let source = match load_source(&cli, &config) {
        Ok(image) => image,
        Err(msg) => {
            eprintln!("Error reading {}: {msg}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    eprintln!("Image: {} ({source})", cli.image_path.display());
    eprintln!("Nodes: {}", pipe.len());
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    pipe.set_image(source);
    let mut executor = IncrementalExecutor::new();
    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        let result = if cli.incremental {
            executor.evaluate_with_diagnostics(&pipe, &StdClock)
        } else {
            evaluate_with_diagnostics(&pipe, &StdClock)
        };

        match result {
            Ok((edited, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                // Write outputs on the first run only.
                if run == 0 {
                    if let Some(ref output) = cli.output {
                        match write_image(&edited, output) {
                            Ok(()) => eprintln!("Image written to {}", output.display()),
                            Err(e) => eprintln!("Error writing {}: {e}", output.display()),
                        }
                    }
                    if cli.save_sidecar {
                        match sidecars.save_pipeline_for(&cli.image_path, &pipe.to_descriptor()) {
                            Ok(()) => eprintln!(
                                "Pipeline saved to {}",
                                sidecars.sidecar_path(&cli.image_path).display()
                            ),
                            Err(e) => eprintln!("Error saving sidecar: {e}"),
                        }
                    }
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[EvaluationDiagnostics]) {
    debug_assert!(!all_diagnostics.is_empty(), "no diagnostics to summarize");

    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    let Some(first) = all_diagnostics.first() else {
        println!("Warning: no diagnostics to summarize");
        return;
    };

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    let reused: usize = all_diagnostics.iter().map(|d| d.summary.reused_count).sum();
    println!("Cached node results reused: {reused}");

    // Per-node means.
    println!();
    println!("{:<16} {:>12} {:>8}", "Node", "Mean (ms)", "Reused");
    println!("{}", "-".repeat(40));

    for (index, node) in first.nodes.iter().enumerate() {
        let node_runs: Vec<_> = all_diagnostics
            .iter()
            .filter_map(|d| d.nodes.get(index))
            .collect();
        let node_mean = node_runs
            .iter()
            .map(|n| n.duration.as_secs_f64() * 1000.0)
            .sum::<f64>()
            / node_runs.len() as f64;
        let node_reused = node_runs.iter().filter(|n| n.reused).count();
        println!("{:<16} {node_mean:>10.3}ms {node_reused:>8}", node.name);
    }
}

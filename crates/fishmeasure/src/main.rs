//! fishmeasure: measure a fish from a segmentation mask.
//!
//! Runs the measurement pipeline on a mask image and prints the fish
//! report together with per-stage diagnostics. World tracking is
//! simulated by an overhead pinhole camera, so a mask and a camera
//! height are enough to get real-world numbers. Useful for:
//!
//! - Comparing ellipse fits (`covariance` vs `minimax`)
//! - Comparing the anchored and bounding-box measurement paths
//! - Tuning threshold, nudges and perspective fudge
//! - Measuring per-stage durations
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin fishmeasure -- [OPTIONS] <MASK_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use fishmeasure_pipeline::diagnostics::{Clock, MeasureMode, MeasurementDiagnostics};
use fishmeasure_pipeline::world::Size;
use fishmeasure_pipeline::{
    BoxDistances, EllipseFitKind, FishReport, MeasurementConfig, OverheadCamera, Species,
    ViewGeometry, WeightModel,
};
use serde::Serialize;

/// Measure a fish from a segmentation mask.
///
/// Thresholds the mask, fits an ellipse to the fish nearest the centre,
/// measures it against a simulated overhead camera and estimates its
/// weight.
#[derive(Parser)]
#[command(name = "fishmeasure", version)]
struct Cli {
    /// Path to the mask image (PNG, JPEG, BMP, WebP).
    mask_path: PathBuf,

    /// Grayscale values strictly above this are foreground.
    #[arg(long, default_value_t = MeasurementConfig::DEFAULT_THRESHOLD)]
    threshold: u8,

    /// Ellipse fitting strategy.
    #[arg(long, value_enum, default_value_t = Fit::Covariance)]
    fit: Fit,

    /// Weight formula family.
    #[arg(long, value_enum, default_value_t = Model::LengthGirth)]
    weight_model: Model,

    /// Fish species.
    #[arg(long, value_enum, default_value_t = SpeciesArg::Unknown)]
    species: SpeciesArg,

    /// Camera height above the ground in metres.
    #[arg(long, default_value_t = 0.6)]
    camera_height: f64,

    /// Fish thickness above the ground in metres.
    #[arg(long, default_value_t = 0.05)]
    fish_height: f64,

    /// Focal length in viewport points. Defaults to the mask width.
    #[arg(long)]
    focal_length: Option<f64>,

    /// Measure the silhouette bounding box instead of world anchors.
    #[arg(long)]
    bbox: bool,

    /// Write an annotated SVG overlay to file.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output report and diagnostics as JSON.
    #[arg(long)]
    json: bool,

    /// Full measurement config as a JSON string.
    ///
    /// When provided, `--threshold`, `--fit` and `--weight-model` are
    /// ignored. The JSON must be a valid `MeasurementConfig`
    /// serialization; missing fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

/// Ellipse fit selection.
#[derive(Clone, Copy, ValueEnum)]
enum Fit {
    /// Second-moment fit with true orientation.
    Covariance,
    /// Axis-aligned bounding-box fit.
    Minimax,
}

/// Weight model selection.
#[derive(Clone, Copy, ValueEnum)]
enum Model {
    /// Species length-girth formulas.
    LengthGirth,
    /// Allometric `a * FL^b` on fork length.
    Allometric,
}

/// Species selection.
#[derive(Clone, Copy, ValueEnum)]
enum SpeciesArg {
    /// Kelp bass.
    CalicoBass,
    /// California halibut.
    Halibut,
    /// Yellowtail amberjack.
    Yellowtail,
    /// Generic formula.
    Unknown,
}

impl From<SpeciesArg> for Species {
    fn from(arg: SpeciesArg) -> Self {
        match arg {
            SpeciesArg::CalicoBass => Self::CalicoBass,
            SpeciesArg::Halibut => Self::Halibut,
            SpeciesArg::Yellowtail => Self::Yellowtail,
            SpeciesArg::Unknown => Self::Unknown,
        }
    }
}

/// JSON output for one run.
#[derive(Serialize)]
struct RunOutput<'a> {
    report: &'a FishReport,
    diagnostics: &'a MeasurementDiagnostics,
}

/// Build a [`MeasurementConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// individual config flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<MeasurementConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(MeasurementConfig {
        threshold: cli.threshold,
        ellipse_fit: match cli.fit {
            Fit::Covariance => EllipseFitKind::Covariance,
            Fit::Minimax => EllipseFitKind::Minimax,
        },
        weight_model: match cli.weight_model {
            Model::LengthGirth => WeightModel::LengthGirth,
            Model::Allometric => WeightModel::Allometric,
        },
        ..MeasurementConfig::default()
    })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let mask_bytes = match std::fs::read(&cli.mask_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.mask_path.display());
            return ExitCode::FAILURE;
        }
    };

    let mask = match fishmeasure_pipeline::grayscale::decode_mask(&mask_bytes) {
        Ok(mask) => mask,
        Err(e) => {
            eprintln!("{}", e.user_message());
            tracing::error!(error = %e, "mask decode failed");
            return ExitCode::FAILURE;
        }
    };

    let (w, h) = (f64::from(mask.width()), f64::from(mask.height()));
    let view = match ViewGeometry::new(Size::new(w, h), Size::new(w, h)) {
        Ok(view) => view,
        Err(e) => {
            eprintln!("{}", e.user_message());
            tracing::error!(error = %e, "bad view geometry");
            return ExitCode::FAILURE;
        }
    };
    let camera = OverheadCamera::new(
        mask.clone(),
        view,
        cli.camera_height,
        cli.fish_height,
        cli.focal_length.unwrap_or(w),
    );
    let species = Species::from(cli.species);

    tracing::info!(
        mask = %cli.mask_path.display(),
        width = mask.width(),
        height = mask.height(),
        runs = cli.runs,
        bbox = cli.bbox,
        "starting measurement"
    );
    tracing::debug!(?config, "measurement config");

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        let mode = if cli.bbox {
            MeasureMode::BoundingBox(BoxDistances {
                distance_to_phone: cli.camera_height - cli.fish_height,
                total_distance: cli.camera_height,
                height: cli.fish_height,
            })
        } else {
            MeasureMode::Anchored {
                tracker: &camera,
                view: &view,
            }
        };

        match fishmeasure_pipeline::measure_with_diagnostics(
            mask.clone(),
            mode,
            species,
            config.clone(),
            &StdClock,
        ) {
            Ok((result, diagnostics)) => {
                if cli.json {
                    let output = RunOutput {
                        report: &result.report,
                        diagnostics: &diagnostics,
                    };
                    match serde_json::to_string_pretty(&output) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing output: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", fishmeasure_export::format_report(&result.report));
                    println!();
                    println!("{}", diagnostics.report());
                }

                // Write SVG on the first run only.
                if run == 0
                    && let Some(ref svg_path) = cli.svg
                {
                    let title = cli
                        .mask_path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .unwrap_or("fish");
                    let config_json = serde_json::to_string(&config).ok();
                    let metadata = fishmeasure_export::SvgMetadata {
                        title: Some(title),
                        description: Some(if cli.bbox {
                            "bounding-box measurement"
                        } else {
                            "anchored measurement"
                        }),
                        config_json: config_json.as_deref(),
                    };
                    let svg = fishmeasure_export::to_result_svg(&result, &metadata);
                    match std::fs::write(svg_path, &svg) {
                        Ok(()) => {
                            eprintln!(
                                "SVG written to {} ({} bytes)",
                                svg_path.display(),
                                svg.len(),
                            );
                        }
                        Err(e) => {
                            eprintln!("Error writing SVG to {}: {e}", svg_path.display());
                        }
                    }
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("{}", e.user_message());
                tracing::error!(error = %e, "measurement failed");
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
fn print_multi_run_summary(all_diagnostics: &[MeasurementDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let names = all_diagnostics[0].stages().map(|(name, _)| name);
    for (index, name) in names.into_iter().enumerate() {
        let total: f64 = all_diagnostics
            .iter()
            .map(|d| d.stages()[index].1.duration.as_secs_f64() * 1000.0)
            .sum();
        let stage_mean = total / all_diagnostics.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}

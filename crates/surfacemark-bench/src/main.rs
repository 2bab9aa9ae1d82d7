//! surfacemark-bench: CLI tool for running a markup session on a photo and
//! collecting diagnostics.
//!
//! Replays an optional recorded segmentation tensor and a stroke script
//! against a photo, finalizes the result, and prints per-stage timing and
//! encoder attempts. Useful for:
//!
//! - Tuning the byte budget and quality ladder against real photos
//! - Checking how detected masks and strokes land on the full-size image
//! - Measuring composite and encode durations
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin surfacemark-bench -- [OPTIONS] <PHOTO_PATH>
//! ```
//!
//! The stroke script is a JSON array of objects:
//!
//! ```text
//! [{"points": [{"x": 10, "y": 10}, {"x": 90, "y": 40}], "tool": "paint", "width": 30}]
//! ```
//!
//! `tool`, `width`, and `color` are optional and fall back to the session
//! defaults.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use surfacemark_pipeline::diagnostics::{Clock, FinalizeDiagnostics};
use surfacemark_pipeline::{
    ClassTensor, Color, Dimensions, DownsampleFilter, EncodeBudget, Finalized, Point, RgbaImage,
    Size, SurfaceKind, Tool,
};
use surfacemark_session::startup::{self, StartupOptions};
use surfacemark_session::{MarkupSession, SessionConfig, StaticSegmenter};
use tracing_subscriber::EnvFilter;

/// Markup session replay and diagnostics for surfacemark.
///
/// Loads a photo, optionally detects a surface from a recorded class
/// tensor, replays a stroke script, and prints finalize diagnostics.
#[derive(Parser)]
#[command(name = "surfacemark-bench", version)]
struct Cli {
    /// Path to the input photo (PNG, JPEG, BMP, WebP).
    photo_path: PathBuf,

    /// Recorded segmentation output as a JSON `{"shape": [...], "data": [...]}`.
    #[arg(long)]
    tensor: Option<PathBuf>,

    /// Surface to detect when `--tensor` is given.
    #[arg(long, value_enum, default_value_t = Surface::Wall)]
    surface: Surface,

    /// Stroke script (JSON array) to replay after detection.
    #[arg(long)]
    strokes: Option<PathBuf>,

    /// Canvas size the strokes were authored against, as `WIDTHxHEIGHT`.
    /// Defaults to the photo's pixel size.
    #[arg(long, value_parser = parse_canvas)]
    canvas: Option<Size>,

    /// Output byte budget.
    #[arg(long, default_value_t = EncodeBudget::DEFAULT_MAX_BYTES)]
    max_bytes: usize,

    /// Longest output side in pixels.
    #[arg(long, default_value_t = EncodeBudget::DEFAULT_MAX_DIMENSION, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    max_dimension: u32,

    /// JPEG quality of the first attempt.
    #[arg(long, default_value_t = EncodeBudget::DEFAULT_INITIAL_QUALITY, value_parser = clap::builder::RangedU64ValueParser::<u8>::new().range(1..=100))]
    quality: u8,

    /// Resampling filter used when shrinking the output.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_FILTER)]
    resize_filter: Filter,

    /// Worker threads for the background pool (default: one per core).
    #[arg(long)]
    threads: Option<usize>,

    /// Write the encoded JPEG to this file.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full session config as a JSON string.
    ///
    /// When provided, the budget flags are ignored. Missing fields take
    /// their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

/// Surface kind selection.
#[derive(Clone, Copy, ValueEnum)]
enum Surface {
    Wall,
    Floor,
    Ceiling,
    Facade,
    Door,
    Window,
}

impl From<Surface> for SurfaceKind {
    fn from(s: Surface) -> Self {
        match s {
            Surface::Wall => Self::Wall,
            Surface::Floor => Self::Floor,
            Surface::Ceiling => Self::Ceiling,
            Surface::Facade => Self::Facade,
            Surface::Door => Self::Door,
            Surface::Window => Self::Window,
        }
    }
}

/// Resampling filter selection.
#[derive(Clone, Copy, ValueEnum)]
enum Filter {
    /// Nearest-neighbor (fastest, blocky).
    Nearest,
    /// Bilinear interpolation (fast, decent quality).
    Triangle,
    /// Bicubic Catmull-Rom (moderate, good quality).
    CatmullRom,
    /// Gaussian (moderate, smooth).
    Gaussian,
    /// Lanczos with 3 lobes (slowest, sharpest).
    Lanczos3,
}

const fn filter_from_pipeline(f: DownsampleFilter) -> Filter {
    match f {
        DownsampleFilter::Nearest => Filter::Nearest,
        DownsampleFilter::Triangle => Filter::Triangle,
        DownsampleFilter::CatmullRom => Filter::CatmullRom,
        DownsampleFilter::Gaussian => Filter::Gaussian,
        DownsampleFilter::Lanczos3 => Filter::Lanczos3,
    }
}

/// Derived from the pipeline default so the two cannot drift.
const CLI_DEFAULT_FILTER: Filter = filter_from_pipeline(EncodeBudget::DEFAULT_RESIZE_FILTER);

/// One entry of the stroke script.
#[derive(Deserialize)]
struct ScriptedStroke {
    points: Vec<Point>,
    #[serde(default)]
    tool: Tool,
    width: Option<f64>,
    color: Option<Color>,
}

fn parse_canvas(s: &str) -> Result<Size, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
    let width: f64 = w.trim().parse().map_err(|e| format!("bad canvas width: {e}"))?;
    let height: f64 = h.trim().parse().map_err(|e| format!("bad canvas height: {e}"))?;
    let size = Size::new(width, height);
    if size.is_empty() {
        return Err(format!("canvas must have positive sides, got {s:?}"));
    }
    Ok(size)
}

/// Build a [`SessionConfig`] from CLI arguments.
fn config_from_cli(cli: &Cli) -> Result<SessionConfig, String> {
    let config = if let Some(ref json) = cli.config_json {
        serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
    } else {
        let mut config = SessionConfig::default();
        let budget = &mut config.markup.budget;
        budget.max_bytes = cli.max_bytes;
        budget.max_dimension = cli.max_dimension;
        budget.initial_quality = cli.quality;
        budget.resize_filter = match cli.resize_filter {
            Filter::Nearest => DownsampleFilter::Nearest,
            Filter::Triangle => DownsampleFilter::Triangle,
            Filter::CatmullRom => DownsampleFilter::CatmullRom,
            Filter::Gaussian => DownsampleFilter::Gaussian,
            Filter::Lanczos3 => DownsampleFilter::Lanczos3,
        };
        config
    };
    config.validate().map_err(|e| format!("Invalid config: {e}"))?;
    Ok(config)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("Error parsing {}: {e}", path.display()))
}

/// Everything a run needs, loaded once.
struct Inputs {
    photo: RgbaImage,
    canvas: Size,
    tensor: Option<ClassTensor>,
    script: Vec<ScriptedStroke>,
}

fn load_inputs(cli: &Cli) -> Result<Inputs, String> {
    let photo = image::open(&cli.photo_path)
        .map_err(|e| format!("Error decoding {}: {e}", cli.photo_path.display()))?
        .to_rgba8();
    let canvas = cli
        .canvas
        .unwrap_or_else(|| Dimensions::of(&photo).to_size());
    let tensor = cli.tensor.as_deref().map(read_json).transpose()?;
    let script = cli
        .strokes
        .as_deref()
        .map(read_json)
        .transpose()?
        .unwrap_or_default();
    Ok(Inputs {
        photo,
        canvas,
        tensor,
        script,
    })
}

/// Run one session from scratch and finalize it.
fn run_once(cli: &Cli, config: &SessionConfig, inputs: &Inputs) -> Result<Finalized, String> {
    let mut session = match inputs.tensor {
        Some(ref tensor) => {
            let kind = SurfaceKind::from(cli.surface);
            let segmenter = Arc::new(StaticSegmenter::new(tensor.clone()));
            MarkupSession::auto_detect(config.clone(), segmenter, &inputs.photo, kind)
        }
        None => MarkupSession::new(config.clone()),
    }
    .map_err(|e| format!("Session error: {e}"))?;
    session.set_canvas_size(inputs.canvas);
    session.settle().map_err(|e| format!("Session error: {e}"))?;
    if let Some(msg) = session.error_message() {
        eprintln!("Detection: {msg}");
    } else if let Some(surface) = session.surface() {
        let swatch = surface.kind().preview_color();
        eprintln!(
            "Detection: {} covers {:.1}% of the photo (#{:02x}{:02x}{:02x})",
            surface.kind(),
            surface.coverage_percent(),
            swatch.r,
            swatch.g,
            swatch.b,
        );
    }

    for (i, stroke) in inputs.script.iter().enumerate() {
        session.select_tool(stroke.tool);
        let width = stroke.width.unwrap_or_else(|| session.current_width());
        let color = stroke.color.unwrap_or(config.brush_color);
        if session
            .add_stroke(stroke.points.clone(), stroke.tool, width, color)
            .is_none()
        {
            eprintln!("Stroke {i}: skipped (needs at least two points)");
        }
    }
    session.settle().map_err(|e| format!("Session error: {e}"))?;
    eprintln!("Has markup: {}", session.has_markup());

    session
        .finalize(&inputs.photo, inputs.canvas, &StdClock)
        .map_err(|e| format!("Finalize error: {e}"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let started = startup::init(StartupOptions {
        worker_threads: cli.threads,
    });
    tracing::debug!(threads = started.worker_threads, "worker pool ready");

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let inputs = match load_inputs(&cli) {
        Ok(inputs) => inputs,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Photo: {} ({}x{})",
        cli.photo_path.display(),
        inputs.photo.width(),
        inputs.photo.height(),
    );
    eprintln!(
        "Canvas: {}x{}, strokes: {}",
        inputs.canvas.width,
        inputs.canvas.height,
        inputs.script.len(),
    );
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        let finalized = match run_once(&cli, &config, &inputs) {
            Ok(f) => f,
            Err(msg) => {
                eprintln!("{msg}");
                return ExitCode::FAILURE;
            }
        };

        if cli.json {
            match serde_json::to_string_pretty(&finalized.diagnostics) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Error serializing diagnostics: {e}");
                    return ExitCode::FAILURE;
                }
            }
        } else {
            println!("{}", finalized.diagnostics.report());
        }

        // Write output on the first run only.
        if run == 0
            && let Some(ref path) = cli.output
        {
            match std::fs::write(path, &finalized.bytes) {
                Ok(()) => eprintln!(
                    "JPEG written to {} ({} bytes)",
                    path.display(),
                    finalized.bytes.len(),
                ),
                Err(e) => eprintln!("Error writing JPEG to {}: {e}", path.display()),
            }
        }

        all_diagnostics.push(finalized.diagnostics);

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

type StageExtractor = fn(&FinalizeDiagnostics) -> Duration;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[FinalizeDiagnostics]) {
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

    let stages: &[(&str, StageExtractor)] = &[
        ("Total", |d| d.total_duration),
        ("Composite", |d| d.composite.duration),
        ("Encode", |d| d.encode.duration),
    ];

    println!("{:<16} {:>12} {:>12} {:>12}", "Stage", "Min (ms)", "Mean (ms)", "Max (ms)");
    println!("{}", "-".repeat(56));
    for (name, extract) in stages {
        let ms: Vec<f64> = all_diagnostics
            .iter()
            .map(|d| extract(d).as_secs_f64() * 1000.0)
            .collect();
        let min = ms.iter().copied().reduce(f64::min).unwrap_or(0.0);
        let max = ms.iter().copied().reduce(f64::max).unwrap_or(0.0);
        let mean = ms.iter().sum::<f64>() / ms.len() as f64;
        println!("{name:<16} {min:>10.3}ms {mean:>10.3}ms {max:>10.3}ms");
    }

    let attempts: Vec<usize> = all_diagnostics.iter().map(|d| d.attempts.len()).collect();
    let over_budget = all_diagnostics
        .iter()
        .filter(|d| !d.summary.within_budget)
        .count();
    println!();
    println!("Encode attempts per run: {attempts:?}");
    if over_budget > 0 {
        println!("Runs over budget: {over_budget}");
    }
}

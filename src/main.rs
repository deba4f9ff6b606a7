//! Sketch Tracer - command-line front end
//!
//! Runs one processing pass per invocation and writes the overlay canvas,
//! or the overlay presented over a backdrop image.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};

use sketch_tracer::capture::{FrameSource, StillFrameSource};
use sketch_tracer::imaging::{working_dimensions, BufferLedger, RasterScope, SourceImage, WorkingImage};
use sketch_tracer::{ComplexityClassifier, RenderMode, TracerConfig, TracerSession};

#[derive(Parser)]
#[command(name = "sketch-tracer")]
#[command(about = "Turn photos into line overlays for tracing", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (JSON)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render an image into an overlay canvas
    Process {
        input: PathBuf,

        /// Output image
        #[arg(long, short)]
        output: PathBuf,

        #[arg(long, value_enum, default_value_t = ModeArg::Auto)]
        mode: ModeArg,

        /// Canvas width (defaults to the working image width)
        #[arg(long, requires = "height")]
        width: Option<u32>,

        /// Canvas height (defaults to the working image height)
        #[arg(long, requires = "width")]
        height: Option<u32>,

        /// Image standing in for the camera feed
        #[arg(long)]
        backdrop: Option<PathBuf>,

        /// Overlay opacity, 0.1 to 1.0
        #[arg(long, value_parser = parse_opacity)]
        opacity: Option<f32>,
    },
    /// Print the mode each image would be rendered in
    Classify {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Print or write the default configuration
    Config {
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Auto,
    Character,
    Scenery,
}

impl ModeArg {
    fn forced(self) -> Option<RenderMode> {
        match self {
            ModeArg::Auto => None,
            ModeArg::Character => Some(RenderMode::Character),
            ModeArg::Scenery => Some(RenderMode::Scenery),
        }
    }
}

fn parse_opacity(value: &str) -> Result<f32, String> {
    let opacity: f32 = value.parse().map_err(|e| format!("{e}"))?;
    if !opacity.is_finite() {
        return Err(format!("opacity must be a finite number, got {value}"));
    }
    Ok(opacity)
}

fn load_config(path: Option<&Path>) -> anyhow::Result<TracerConfig> {
    match path {
        Some(path) => TracerConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(TracerConfig::default()),
    }
}

fn process(
    config: TracerConfig,
    input: &Path,
    output: &Path,
    mode: ModeArg,
    canvas: Option<(u32, u32)>,
    backdrop: Option<&Path>,
    opacity: Option<f32>,
) -> anyhow::Result<()> {
    let source = SourceImage::open(input)
        .with_context(|| format!("failed to open {}", input.display()))?;
    let (width, height) = canvas.unwrap_or_else(|| {
        working_dimensions(source.width(), source.height(), config.working_resolution)
    });

    let capture = config.capture;
    let mut session = TracerSession::new(config, width, height)?;
    if let Some(opacity) = opacity {
        session.set_opacity(opacity);
    }

    let now = Instant::now();
    session.import_image(source, now);
    if let Some(mode) = mode.forced() {
        session.set_mode(mode, now);
    }
    let report = session.process_now(now)?;

    match report.classification {
        Some(classification) => println!(
            "{}: {} (edge density {:.4})",
            input.display(),
            classification.label(),
            classification.density
        ),
        None => println!("{}: {}", input.display(), report.mode.label()),
    }

    let image = match backdrop {
        Some(path) => {
            let source = StillFrameSource::open(path, &capture)?;
            let frame = source
                .latest_frame()
                .context("backdrop produced no frame")?;
            session.present(&frame)?
        }
        None => session.canvas_snapshot().into_pixels(),
    };
    image
        .save(output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    log::info!("Wrote {}x{} overlay to {}", width, height, output.display());
    Ok(())
}

fn classify(config: &TracerConfig, inputs: &[PathBuf]) -> anyhow::Result<()> {
    let classifier = ComplexityClassifier::new(config.classifier);
    let ledger = BufferLedger::new();
    for input in inputs {
        let source = match SourceImage::open(input) {
            Ok(source) => source,
            Err(e) => {
                log::warn!("Skipping {}: {}", input.display(), e);
                continue;
            }
        };
        let scope = RasterScope::new(&ledger, "classify");
        let working = scope.track(WorkingImage::from_source(&source, config.working_resolution)?);
        let classification = classifier.classify(&working, &scope)?;
        println!(
            "{}\t{}\t{:.4}\t{}",
            input.display(),
            classification.mode,
            classification.density,
            classification.label()
        );
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Process {
            input,
            output,
            mode,
            width,
            height,
            backdrop,
            opacity,
        } => process(
            config,
            &input,
            &output,
            mode,
            width.zip(height),
            backdrop.as_deref(),
            opacity,
        ),
        Commands::Classify { inputs } => classify(&config, &inputs),
        Commands::Config { output } => {
            match output {
                Some(path) => {
                    config.save(&path)?;
                    log::info!("Wrote configuration to {}", path.display());
                }
                None => println!("{}", config.to_json()?),
            }
            Ok(())
        }
    }
}

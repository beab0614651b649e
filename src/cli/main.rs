use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::stream::{self, StreamExt};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use asset_enhancer::engine::codec;
use asset_enhancer::types::{Dimensions, OperationRequest, Telemetry};
use asset_enhancer::{EngineConfig, EnhancementEngine, ImageProcessor};

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "bmp"];

#[derive(Parser)]
#[command(name = "asset-enhancer")]
#[command(about = "Product image quality analysis and conditional enhancement")]
struct Cli {
    /// JSON configuration file (defaults to ENHANCE_* environment variables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the defect confidence vector of an image
    Analyze {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Target canvas, e.g. 1000x1000
        #[arg(long = "size")]
        resize: Option<Dimensions>,
    },

    /// Enhance one image and write it as JPEG
    Process {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Operations to force (manual mode); automatic when omitted
        #[arg(long, value_delimiter = ',')]
        ops: Vec<String>,

        /// Target canvas, e.g. 1000x1000
        #[arg(long = "size")]
        resize: Option<Dimensions>,

        /// Write telemetry JSON here instead of stdout
        #[arg(long)]
        telemetry: Option<PathBuf>,
    },

    /// Grade an image for marketplace readiness
    Grade {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Declared width (defaults to the decoded width)
        #[arg(long)]
        width: Option<i64>,

        /// Declared height (defaults to the decoded height)
        #[arg(long)]
        height: Option<i64>,

        /// Declared file size in bytes (defaults to the file length)
        #[arg(long)]
        file_size: Option<u64>,
    },

    /// Process batch of files
    Batch {
        /// Input directory
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Operations to force (manual mode); automatic when omitted
        #[arg(long, value_delimiter = ',')]
        ops: Vec<String>,

        /// Target canvas, e.g. 1000x1000
        #[arg(long = "size")]
        resize: Option<Dimensions>,

        /// Number of parallel processes
        #[arg(short, long, default_value = "4")]
        parallel: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "asset_enhancer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::from_env()?,
    };
    let engine = EnhancementEngine::new(config);

    match cli.command {
        Commands::Analyze { input, resize } => {
            let bytes = read_input(&input).await?;
            let confidence = engine.analyze(&bytes, resize)?;
            println!("{}", serde_json::to_string_pretty(&confidence)?);
            Ok(())
        }

        Commands::Process {
            input,
            output,
            ops,
            resize,
            telemetry,
        } => {
            let request = build_request(&ops, resize)?;
            let bytes = read_input(&input).await?;
            let result = engine.process_async(bytes, request).await?;

            tokio::fs::write(&output, &result.image)
                .await
                .with_context(|| format!("Failed to write {}", output.display()))?;
            info!("Wrote {}", output.display());

            let json = serde_json::to_string_pretty(&result.telemetry)?;
            match telemetry {
                Some(path) => tokio::fs::write(&path, json)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => println!("{json}"),
            }
            Ok(())
        }

        Commands::Grade {
            input,
            width,
            height,
            file_size,
        } => {
            let bytes = read_input(&input).await?;
            let raster = codec::decode(&bytes)?;
            let decoded = Dimensions::of(&raster);
            let report = engine.grader().grade_decoded(
                &raster,
                width.unwrap_or(decoded.width as i64),
                height.unwrap_or(decoded.height as i64),
                file_size.unwrap_or(bytes.len() as u64),
            )?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }

        Commands::Batch {
            input_dir,
            output_dir,
            ops,
            resize,
            parallel,
        } => {
            let request = build_request(&ops, resize)?;
            run_batch(engine.processor(), &input_dir, &output_dir, request, parallel).await
        }
    }
}

fn build_request(ops: &[String], resize: Option<Dimensions>) -> Result<OperationRequest> {
    if ops.is_empty() {
        let request = OperationRequest::auto();
        return Ok(match resize {
            Some(dims) => request.with_resize(dims),
            None => request,
        });
    }
    Ok(OperationRequest::manual(ops, resize)?)
}

async fn read_input(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

async fn run_batch(
    processor: Arc<ImageProcessor>,
    input_dir: &Path,
    output_dir: &Path,
    request: OperationRequest,
    parallel: usize,
) -> Result<()> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let mut inputs = Vec::new();
    let mut entries = tokio::fs::read_dir(input_dir)
        .await
        .with_context(|| format!("Failed to list {}", input_dir.display()))?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if is_image(&path) {
            inputs.push(path);
        }
    }
    inputs.sort();
    info!("Processing {} images from {}", inputs.len(), input_dir.display());

    let targets = output_paths(&inputs, output_dir);
    let results: Vec<(PathBuf, Result<Telemetry>)> = stream::iter(inputs.into_iter().zip(targets))
        .map(|(path, target)| {
            let processor = Arc::clone(&processor);
            let request = request.clone();
            async move {
                let outcome = process_file(processor, &path, &target, request).await;
                (path, outcome)
            }
        })
        .buffer_unordered(parallel.max(1))
        .collect()
        .await;

    let mut failures = 0usize;
    for (path, outcome) in &results {
        match outcome {
            Ok(telemetry) => info!(
                "{}: {:?} in {} ms",
                path.display(),
                telemetry.steps,
                telemetry.duration_ms
            ),
            Err(e) => {
                failures += 1;
                warn!("{}: {:#}", path.display(), e);
            }
        }
    }

    info!("Batch done: {} ok, {} failed", results.len() - failures, failures);
    if failures > 0 {
        anyhow::bail!("{failures} of {} images failed", results.len());
    }
    Ok(())
}

/// `<stem>.jpg` per input; inputs sharing a stem keep their extension
/// (`a_png.jpg`, `a_jpg.jpg`) so no output overwrites another.
fn output_paths(inputs: &[PathBuf], output_dir: &Path) -> Vec<PathBuf> {
    let mut stems: HashMap<&OsStr, usize> = HashMap::new();
    for path in inputs {
        if let Some(stem) = path.file_stem() {
            *stems.entry(stem).or_default() += 1;
        }
    }

    inputs
        .iter()
        .map(|path| {
            let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
            let shared = path
                .file_stem()
                .map_or(false, |s| stems.get(s).copied().unwrap_or(0) > 1);
            let name = match path.extension() {
                Some(ext) if shared => format!("{stem}_{}.jpg", ext.to_string_lossy()),
                _ => format!("{stem}.jpg"),
            };
            output_dir.join(name)
        })
        .collect()
}

async fn process_file(
    processor: Arc<ImageProcessor>,
    path: &Path,
    target: &Path,
    request: OperationRequest,
) -> Result<Telemetry> {
    let bytes = read_input(path).await?;
    let output = processor.process_async(bytes, request).await?;

    tokio::fs::write(target, &output.image)
        .await
        .with_context(|| format!("Failed to write {}", target.display()))?;
    Ok(output.telemetry)
}

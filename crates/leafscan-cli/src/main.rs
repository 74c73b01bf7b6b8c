mod batch;
mod display;
mod guide;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use leafscan_ai::runtime;
use leafscan_core::{PipelineError, Prediction};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use guide::{CareGuide, GuideEntry};

#[derive(Parser)]
#[command(
    name = "leafscan",
    version,
    about = "Leaf disease classification from photos"
)]
struct Cli {
    /// Directory holding manifest.json and the model artifacts.
    #[arg(long, global = true, env = "LEAFSCAN_MODEL_DIR", default_value = "models")]
    model_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify a single leaf photo.
    Predict {
        image: PathBuf,
        /// Emit the prediction as JSON.
        #[arg(long)]
        json: bool,
        /// Care guide JSON shown after the prediction.
        #[arg(long, env = "LEAFSCAN_GUIDE")]
        guide: Option<PathBuf>,
    },
    /// Classify many photos and print a results table.
    Batch {
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Load and cross-check the model artifacts.
    Validate {
        #[arg(long, env = "LEAFSCAN_GUIDE")]
        guide: Option<PathBuf>,
    },
    /// List the classes the model can emit.
    Labels,
}

/// `predict --json` output: the prediction, plus the care guide entry for
/// its label when a guide was given and covers it.
#[derive(Serialize)]
struct PredictReport<'a> {
    #[serde(flatten)]
    prediction: &'a Prediction,
    #[serde(skip_serializing_if = "Option::is_none")]
    care: Option<&'a GuideEntry>,
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();
    tracing::debug!("leafscan v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let pipeline = runtime::init(&cli.model_dir)
        .with_context(|| format!("loading models from {}", cli.model_dir.display()))?;

    let mut out = std::io::stdout().lock();
    match cli.command {
        Command::Predict { image, json, guide } => {
            let bytes = std::fs::read(&image)
                .with_context(|| format!("reading {}", image.display()))?;
            let prediction = match runtime::predict(&bytes) {
                Ok(p) => p,
                Err(PipelineError::Decode(reason)) => {
                    eprintln!(
                        "{} could not be read as a JPEG or PNG photo ({reason}). \
                         Try another image.",
                        image.display()
                    );
                    return Ok(ExitCode::from(2));
                }
                Err(e) => return Err(e.into()),
            };
            let guide = guide.as_deref().map(CareGuide::load).transpose()?;

            if json {
                let report = PredictReport {
                    care: guide.as_ref().and_then(|g| g.get(&prediction.label)),
                    prediction: &prediction,
                };
                serde_json::to_writer_pretty(&mut out, &report)?;
                writeln!(out)?;
                return Ok(ExitCode::SUCCESS);
            }
            display::write_prediction(&mut out, &prediction)?;
            if let Some(guide) = guide {
                writeln!(out)?;
                guide.write_entry(&mut out, &prediction.label)?;
            }
        }
        Command::Batch { images } => {
            let table = batch::run(pipeline, &images)?;
            writeln!(out, "{}", arrow::util::pretty::pretty_format_batches(&[table])?)?;
        }
        Command::Validate { guide } => {
            display::write_summary(&mut out, pipeline)?;
            if let Some(path) = guide {
                let guide = CareGuide::load(&path)?;
                writeln!(out, "Care guide:     {} entries", guide.len())?;
                for label in pipeline.labels().names() {
                    if guide.get(label).is_none() {
                        writeln!(out, "  missing entry for {label}")?;
                    }
                }
                for label in guide.unknown_labels(pipeline.labels().names()) {
                    writeln!(out, "  entry for unknown class {label}")?;
                }
            }
            writeln!(out, "OK")?;
        }
        Command::Labels => {
            display::write_labels(&mut out, pipeline.labels())?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

//! Batch prediction: classify many files into one Arrow report table.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Builder, StringBuilder};
use arrow::record_batch::RecordBatch;
use leafscan_ai::Pipeline;
use leafscan_core::report;
use tracing::{info, warn};

/// Per-file result before it becomes a row.
enum Outcome {
    Ok { label: String, confidence: f64 },
    Failed { status: &'static str, error: String },
}

fn classify_file(pipeline: &Pipeline, path: &Path) -> anyhow::Result<Outcome> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            warn!(file = %path.display(), error = %e, "cannot read image");
            return Ok(Outcome::Failed {
                status: report::STATUS_READ_ERROR,
                error: e.to_string(),
            });
        }
    };
    match pipeline.predict(&bytes) {
        Ok(p) => Ok(Outcome::Ok {
            confidence: p.confidence(),
            label: p.label,
        }),
        Err(e) if e.is_recoverable() => {
            warn!(file = %path.display(), error = %e, "skipping undecodable image");
            Ok(Outcome::Failed {
                status: report::STATUS_DECODE_ERROR,
                error: e.to_string(),
            })
        }
        // Anything else means the artifacts are broken; stop the run.
        Err(e) => Err(e.into()),
    }
}

/// Classify every path and collect the results, one row per input in order.
pub fn run(pipeline: &Pipeline, paths: &[PathBuf]) -> anyhow::Result<RecordBatch> {
    let schema = Arc::new(report::prediction_schema());
    let mut file = StringBuilder::new();
    let mut label = StringBuilder::new();
    let mut confidence = Float64Builder::new();
    let mut status = StringBuilder::new();
    let mut error = StringBuilder::new();

    let mut ok = 0usize;
    for path in paths {
        file.append_value(path.display().to_string());
        match classify_file(pipeline, path)? {
            Outcome::Ok {
                label: l,
                confidence: c,
            } => {
                ok += 1;
                label.append_value(l);
                confidence.append_value(c);
                status.append_value(report::STATUS_OK);
                error.append_null();
            }
            Outcome::Failed { status: s, error: e } => {
                label.append_null();
                confidence.append_null();
                status.append_value(s);
                error.append_value(e);
            }
        }
    }
    info!(total = paths.len(), ok, "batch complete");

    let columns: Vec<ArrayRef> = vec![
        Arc::new(file.finish()),
        Arc::new(label.finish()),
        Arc::new(confidence.finish()),
        Arc::new(status.finish()),
        Arc::new(error.finish()),
    ];
    Ok(RecordBatch::try_new(schema, columns)?)
}

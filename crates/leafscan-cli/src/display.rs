//! Human-readable rendering of predictions and model metadata.
//!
//! Canonical labels look like `Potato___Early_blight`; everything shown to a
//! person goes through [`display_label`] first.

use std::io::{self, Write};

use leafscan_ai::{LabelCodec, Pipeline};
use leafscan_core::{ExtractorSpec, Prediction};

const BAR_WIDTH: usize = 30;

/// `Potato___Early_blight` → `Early blight`.
pub fn display_label(canonical: &str) -> String {
    canonical
        .rsplit("___")
        .next()
        .unwrap_or(canonical)
        .replace('_', " ")
}

fn bar(probability: f64) -> String {
    let filled = (probability.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "·".repeat(BAR_WIDTH - filled))
}

/// Prediction card: winning label, then every class from most to least likely.
pub fn write_prediction(w: &mut impl Write, prediction: &Prediction) -> io::Result<()> {
    writeln!(w, "Prediction: {}", display_label(&prediction.label))?;
    writeln!(w, "Confidence: {:.2}%", prediction.confidence() * 100.0)?;
    writeln!(w)?;
    writeln!(w, "Probabilities:")?;

    let width = prediction
        .probabilities
        .iter()
        .map(|p| display_label(&p.label).chars().count())
        .max()
        .unwrap_or(0);
    for p in prediction.ranked() {
        let marker = if p.label == prediction.label { '>' } else { ' ' };
        writeln!(
            w,
            " {marker} {:<width$}  {} {:>6.2}%",
            display_label(&p.label),
            bar(p.probability),
            p.probability * 100.0,
        )?;
    }
    Ok(())
}

/// Codec listing: index, canonical name, display name.
pub fn write_labels(w: &mut impl Write, codec: &LabelCodec) -> io::Result<()> {
    for (i, name) in codec.names().iter().enumerate() {
        writeln!(w, "{i:>3}  {name}  ({})", display_label(name))?;
    }
    Ok(())
}

/// Summary of a validated artifact triple.
pub fn write_summary(w: &mut impl Write, pipeline: &Pipeline) -> io::Result<()> {
    let m = pipeline.manifest();
    let clf = pipeline.classifier();
    let kind = match m.extractor {
        ExtractorSpec::Onnx { .. } => "onnx",
        ExtractorSpec::Conv { .. } => "conv",
    };
    writeln!(w, "Model version:  {}", m.version)?;
    writeln!(
        w,
        "Input:          {0}x{0} RGB, {1:?} normalization",
        m.input_size, m.normalization
    )?;
    writeln!(w, "Extractor:      {kind} ({})", m.extractor.file().display())?;
    writeln!(w, "Embedding dim:  {}", m.embedding_dim)?;
    writeln!(
        w,
        "Classifier:     {} trees, {:?} voting",
        clf.n_trees(),
        clf.voting()
    )?;
    writeln!(w, "Classes:        {}", clf.codec().len())
}

//! Artifact manifest: the single description of a compatible
//! extractor / classifier / codec triple.
//!
//! A model directory carries a `manifest.json` next to the weight files.
//! The normalization policy is part of the manifest and is never inferred.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PipelineError;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const DEFAULT_INPUT_SIZE: u32 = 224;
/// Largest accepted `input_size`; beyond this the manifest is treated as corrupt.
pub const MAX_INPUT_SIZE: u32 = 4096;
pub const DEFAULT_CLASSIFIER_FILE: &str = "forest.json";

/// ImageNet channel statistics (RGB).
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Per-channel remapping applied to 8-bit RGB values before the forward pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// `v / 255`, range [0, 1].
    Unit,
    /// `v / 127.5 - 1`, range [-1, 1] (MobileNetV2 preprocessing).
    Symmetric,
    /// `(v / 255 - mean) / std` with ImageNet statistics.
    Imagenet,
}

impl Normalization {
    /// Remap one 8-bit channel value.
    pub fn apply(self, value: u8, channel: usize) -> f32 {
        let v = f32::from(value);
        match self {
            Self::Unit => v / 255.0,
            Self::Symmetric => v / 127.5 - 1.0,
            Self::Imagenet => (v / 255.0 - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel],
        }
    }
}

/// Memory layout the network expects for its single image input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensorLayout {
    /// `[1, H, W, 3]`, the Keras export default.
    #[default]
    Nhwc,
    /// `[1, 3, H, W]`.
    Nchw,
}

/// Which backend runs the frozen feature network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractorSpec {
    /// ONNX Runtime session over an exported network.
    Onnx {
        file: PathBuf,
        /// Input name; the session's first input when omitted.
        #[serde(default)]
        input_name: Option<String>,
        #[serde(default)]
        layout: TensorLayout,
    },
    /// Pure-Rust convolutional feature map from a JSON weight file.
    Conv { file: PathBuf },
}

impl ExtractorSpec {
    pub fn file(&self) -> &Path {
        match self {
            Self::Onnx { file, .. } | Self::Conv { file } => file.as_path(),
        }
    }
}

/// How tree outputs are combined into a distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Voting {
    /// One vote per tree for the arg-max class of its leaf.
    #[default]
    Hard,
    /// Mean of normalized leaf distributions (scikit-learn `predict_proba`).
    Soft,
}

fn default_input_size() -> u32 {
    DEFAULT_INPUT_SIZE
}

fn default_classifier() -> PathBuf {
    PathBuf::from(DEFAULT_CLASSIFIER_FILE)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Free-form version tag shared by the artifacts in this directory.
    pub version: String,
    #[serde(default = "default_input_size")]
    pub input_size: u32,
    pub normalization: Normalization,
    pub embedding_dim: usize,
    pub extractor: ExtractorSpec,
    #[serde(default = "default_classifier")]
    pub classifier: PathBuf,
    /// Standalone codec artifact; classes bundled in the classifier are used
    /// when absent.
    #[serde(default)]
    pub labels: Option<PathBuf>,
    #[serde(default)]
    pub voting: Voting,
}

impl Manifest {
    /// Read `manifest.json` from a model directory.
    pub fn load(model_dir: &Path) -> Result<Self, PipelineError> {
        let path = model_dir.join(MANIFEST_FILE);
        let text =
            std::fs::read_to_string(&path).map_err(|e| PipelineError::artifact(&path, e))?;
        let manifest: Self =
            serde_json::from_str(&text).map_err(|e| PipelineError::artifact(&path, e))?;
        manifest.check().map_err(|reason| PipelineError::artifact(&path, reason))?;
        debug!(
            version = %manifest.version,
            input_size = manifest.input_size,
            embedding_dim = manifest.embedding_dim,
            path = %path.display(),
            "read manifest"
        );
        Ok(manifest)
    }

    fn check(&self) -> Result<(), String> {
        if self.input_size == 0 || self.input_size > MAX_INPUT_SIZE {
            return Err(format!(
                "input_size {} outside 1..={MAX_INPUT_SIZE}",
                self.input_size
            ));
        }
        if self.embedding_dim == 0 {
            return Err("embedding_dim must be positive".into());
        }
        Ok(())
    }

    /// Resolve an artifact path relative to the model directory.
    pub fn resolve(model_dir: &Path, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            model_dir.join(file)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_manifest_with_defaults() {
        let json = r#"{
            "version": "potato-mnv2-1",
            "normalization": "symmetric",
            "embedding_dim": 1280,
            "extractor": { "kind": "onnx", "file": "mobilenet_v2.onnx" }
        }"#;
        let m: Manifest = serde_json::from_str(json).unwrap();
        assert_eq!(m.input_size, 224);
        assert_eq!(m.classifier, PathBuf::from("forest.json"));
        assert_eq!(m.labels, None);
        assert_eq!(m.voting, Voting::Hard);
        assert_eq!(
            m.extractor,
            ExtractorSpec::Onnx {
                file: PathBuf::from("mobilenet_v2.onnx"),
                input_name: None,
                layout: TensorLayout::Nhwc,
            }
        );
    }

    #[test]
    fn parses_conv_extractor() {
        let json = r#"{
            "version": "1",
            "input_size": 64,
            "normalization": "unit",
            "embedding_dim": 8,
            "extractor": { "kind": "conv", "file": "conv.json" },
            "labels": "labels.json",
            "voting": "soft"
        }"#;
        let m: Manifest = serde_json::from_str(json).unwrap();
        assert_eq!(m.extractor.file(), Path::new("conv.json"));
        assert_eq!(m.voting, Voting::Soft);
        assert_eq!(m.labels, Some(PathBuf::from("labels.json")));
    }

    #[test]
    fn unknown_normalization_rejected() {
        let json = r#"{
            "version": "1",
            "normalization": "zscore",
            "embedding_dim": 8,
            "extractor": { "kind": "conv", "file": "conv.json" }
        }"#;
        assert!(serde_json::from_str::<Manifest>(json).is_err());
    }

    #[test]
    fn load_reports_missing_manifest_as_artifact_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Manifest::load(dir.path()).unwrap_err();
        assert!(matches!(err, PipelineError::ArtifactLoad { .. }));
    }

    #[test]
    fn load_rejects_zero_embedding_dim() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            r#"{"version":"1","normalization":"unit","embedding_dim":0,
                "extractor":{"kind":"conv","file":"conv.json"}}"#,
        )
        .unwrap();
        let err = Manifest::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("embedding_dim"), "{err}");
    }

    #[test]
    fn load_rejects_implausible_input_size() {
        let dir = tempfile::tempdir().unwrap();
        for size in [0, MAX_INPUT_SIZE + 1, 70_000] {
            std::fs::write(
                dir.path().join(MANIFEST_FILE),
                format!(
                    r#"{{"version":"1","normalization":"unit","embedding_dim":8,
                        "input_size":{size},
                        "extractor":{{"kind":"conv","file":"conv.json"}}}}"#
                ),
            )
            .unwrap();
            let err = Manifest::load(dir.path()).unwrap_err();
            assert!(matches!(err, PipelineError::ArtifactLoad { .. }), "{size}");
            assert!(err.to_string().contains("input_size"), "{err}");
        }

        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            format!(
                r#"{{"version":"1","normalization":"unit","embedding_dim":8,
                    "input_size":{MAX_INPUT_SIZE},
                    "extractor":{{"kind":"conv","file":"conv.json"}}}}"#
            ),
        )
        .unwrap();
        assert_eq!(Manifest::load(dir.path()).unwrap().input_size, MAX_INPUT_SIZE);
    }

    #[test]
    fn normalization_ranges() {
        assert_eq!(Normalization::Unit.apply(0, 0), 0.0);
        assert_eq!(Normalization::Unit.apply(255, 1), 1.0);
        assert_eq!(Normalization::Symmetric.apply(0, 0), -1.0);
        assert_eq!(Normalization::Symmetric.apply(255, 2), 1.0);

        // ImageNet: 0.485 * 255 ≈ 123.7, so 124 lands just above zero on R.
        let r = Normalization::Imagenet.apply(124, 0);
        assert!(r.abs() < 0.01, "got {r}");
    }

    #[test]
    fn resolve_keeps_absolute_paths() {
        let dir = Path::new("/models/potato");
        assert_eq!(
            Manifest::resolve(dir, Path::new("forest.json")),
            PathBuf::from("/models/potato/forest.json")
        );
        assert_eq!(
            Manifest::resolve(dir, Path::new("/shared/labels.json")),
            PathBuf::from("/shared/labels.json")
        );
    }
}

//! Embedding extraction: decode → resize → normalize → forward pass.

use std::path::Path;

use image::DynamicImage;
use leafscan_core::{Embedding, ExtractorSpec, Manifest, Normalization, PipelineError};
use tracing::debug;

use crate::network::{ConvNet, FeatureNetwork};
use crate::preprocess;

/// Deterministic image → embedding function.
///
/// Input size and normalization come from the manifest and are fixed for the
/// extractor's lifetime.
pub struct EmbeddingExtractor {
    network: Box<dyn FeatureNetwork>,
    input_size: u32,
    normalization: Normalization,
}

impl EmbeddingExtractor {
    pub fn new(
        network: Box<dyn FeatureNetwork>,
        input_size: u32,
        normalization: Normalization,
    ) -> Self {
        Self {
            network,
            input_size,
            normalization,
        }
    }

    /// Build the backend the manifest names.
    pub fn from_manifest(model_dir: &Path, manifest: &Manifest) -> Result<Self, PipelineError> {
        let path = Manifest::resolve(model_dir, manifest.extractor.file());
        let network: Box<dyn FeatureNetwork> = match &manifest.extractor {
            ExtractorSpec::Conv { .. } => Box::new(ConvNet::load(&path)?),
            #[cfg(feature = "onnx")]
            ExtractorSpec::Onnx {
                input_name, layout, ..
            } => Box::new(crate::embedder::OnnxNetwork::load(
                &path,
                input_name.as_deref(),
                *layout,
            )?),
            #[cfg(not(feature = "onnx"))]
            ExtractorSpec::Onnx { .. } => {
                return Err(PipelineError::artifact(
                    path,
                    "onnx extractor requested but leafscan-ai was built without the `onnx` feature",
                ));
            }
        };
        Ok(Self::new(network, manifest.input_size, manifest.normalization))
    }

    /// Embedding length if the backend reports it up front.
    pub fn output_dim(&self) -> Option<usize> {
        self.network.output_dim()
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    /// Extract from an already decoded image.
    pub fn extract(&self, image: &DynamicImage) -> Result<Embedding, PipelineError> {
        let tensor = preprocess::normalize(image, self.input_size, self.normalization)?;
        let values = self.network.forward(&tensor)?;
        debug!(
            width = image.width(),
            height = image.height(),
            dim = values.len(),
            "extracted embedding"
        );
        Ok(Embedding::new(values))
    }

    /// Decode raw JPEG/PNG bytes and extract.
    pub fn extract_bytes(&self, bytes: &[u8]) -> Result<Embedding, PipelineError> {
        let image = preprocess::decode(bytes)?;
        self.extract(&image)
    }
}

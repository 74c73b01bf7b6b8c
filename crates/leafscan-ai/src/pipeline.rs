//! Image bytes → prediction, over one validated artifact triple.

use std::path::Path;

use image::DynamicImage;
use leafscan_core::{Embedding, Manifest, PipelineError, Prediction};
use tracing::{debug, info};

use crate::classifier::Classifier;
use crate::extractor::EmbeddingExtractor;
use crate::labels::LabelCodec;
use crate::preprocess;

/// Loaded extractor + classifier + codec.
///
/// Immutable once built; share it by reference across threads.
pub struct Pipeline {
    manifest: Manifest,
    extractor: EmbeddingExtractor,
    classifier: Classifier,
}

impl Pipeline {
    /// Load every artifact named by `model_dir/manifest.json` and check that
    /// they agree on the embedding length.
    pub fn load(model_dir: &Path) -> Result<Self, PipelineError> {
        let manifest = Manifest::load(model_dir)?;

        let labels = manifest
            .labels
            .as_deref()
            .map(|file| LabelCodec::load(&Manifest::resolve(model_dir, file)))
            .transpose()?;
        let classifier = Classifier::load(
            &Manifest::resolve(model_dir, &manifest.classifier),
            labels,
            manifest.voting,
        )?;
        let extractor = EmbeddingExtractor::from_manifest(model_dir, &manifest)?;

        let pipeline = Self::new(manifest, extractor, classifier)?;
        info!(
            version = %pipeline.manifest.version,
            dim = pipeline.manifest.embedding_dim,
            classes = pipeline.classifier.codec().len(),
            dir = %model_dir.display(),
            "pipeline ready"
        );
        Ok(pipeline)
    }

    /// Assemble from already loaded parts, validating compatibility.
    ///
    /// Runs one forward pass on a blank image so that backends which cannot
    /// report their output length up front are still checked here rather than
    /// on the first request.
    pub fn new(
        manifest: Manifest,
        extractor: EmbeddingExtractor,
        classifier: Classifier,
    ) -> Result<Self, PipelineError> {
        let expected = manifest.embedding_dim;
        let check = |actual: usize| {
            if actual == expected {
                Ok(())
            } else {
                Err(PipelineError::ShapeMismatch { expected, actual })
            }
        };

        check(classifier.n_features())?;
        if let Some(dim) = extractor.output_dim() {
            check(dim)?;
        }
        let size = extractor.input_size();
        let probe = extractor.extract(&DynamicImage::new_rgb8(size, size))?;
        check(probe.len())?;

        Ok(Self {
            manifest,
            extractor,
            classifier,
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn labels(&self) -> &LabelCodec {
        self.classifier.codec()
    }

    /// Embedding for raw image bytes.
    pub fn embed(&self, bytes: &[u8]) -> Result<Embedding, PipelineError> {
        self.extractor.extract_bytes(bytes)
    }

    /// Classify raw JPEG/PNG bytes.
    ///
    /// A bad image comes back as [`PipelineError::Decode`]; it is never
    /// retried and never replaced by a fallback label.
    pub fn predict(&self, bytes: &[u8]) -> Result<Prediction, PipelineError> {
        let image = preprocess::decode(bytes)?;
        self.predict_image(&image)
    }

    /// Classify an already decoded image.
    pub fn predict_image(&self, image: &DynamicImage) -> Result<Prediction, PipelineError> {
        let embedding = self.extractor.extract(image)?;
        self.classify(&embedding)
    }

    fn classify(&self, embedding: &Embedding) -> Result<Prediction, PipelineError> {
        let prediction = self.classifier.classify(embedding)?;
        debug!(
            label = %prediction.label,
            confidence = prediction.confidence(),
            "classified"
        );
        Ok(prediction)
    }
}

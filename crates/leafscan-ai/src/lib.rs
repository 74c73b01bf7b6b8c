//! Leaf image inference: embedding extraction, tree-ensemble classification, label codec.

pub mod classifier;
#[cfg(feature = "onnx")]
mod embedder;
pub mod extractor;
pub mod labels;
pub mod network;
pub mod pipeline;
pub mod preprocess;
pub mod runtime;

#[cfg(test)]
mod testutil;

pub use classifier::{Classifier, ForestArtifact};
#[cfg(feature = "onnx")]
pub use embedder::OnnxNetwork;
pub use extractor::EmbeddingExtractor;
pub use labels::LabelCodec;
pub use network::{ConvNet, FeatureNetwork};
pub use pipeline::Pipeline;

pub mod config;
pub mod error;
pub mod schema;
pub mod types;

pub use config::{ExtractorSpec, Manifest, Normalization, TensorLayout, Voting};
pub use error::{CodecError, PipelineError};
pub use schema::report;
pub use types::{ClassProbability, Embedding, NormalizedTensor, Prediction};

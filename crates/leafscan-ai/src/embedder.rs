//! ONNX Runtime feature network for exported image backbones.
//!
//! Expects a headless network ending in global pooling (e.g. MobileNetV2 with
//! `include_top=False, pooling='avg'`, 1280 dimensions). Output of shape
//! `[1, dim]` or `[1, dim, 1, 1]` is flattened into the embedding.

use std::path::Path;
use std::sync::Mutex;

use leafscan_core::{NormalizedTensor, PipelineError, TensorLayout};
use ort::session::Session;
use ort::value::Tensor;
use tracing::info;

use crate::network::FeatureNetwork;

/// Frozen image backbone run through ONNX Runtime.
///
/// `Session::run` needs exclusive access, so the session sits behind a
/// mutex; callers share the network by reference like any other backend.
pub struct OnnxNetwork {
    session: Mutex<Session>,
    input_name: String,
    layout: TensorLayout,
    dim: Option<usize>,
}

impl OnnxNetwork {
    /// Load an exported network. `input_name` defaults to the session's first
    /// input.
    pub fn load(
        model_path: &Path,
        input_name: Option<&str>,
        layout: TensorLayout,
    ) -> Result<Self, PipelineError> {
        if !model_path.exists() {
            return Err(PipelineError::artifact(model_path, "model file not found"));
        }

        let session =
            open_session(model_path).map_err(|e| PipelineError::artifact(model_path, e))?;

        let input_name = match input_name {
            Some(name) => name.to_string(),
            None => session
                .inputs()
                .first()
                .map(|i| i.name().to_string())
                .ok_or_else(|| PipelineError::artifact(model_path, "model has no inputs"))?,
        };

        // Infer embedding dimension from model output shape.
        let dim = session.outputs().first().and_then(|o| infer_dim(o.dtype()));

        info!(
            ?dim,
            input = %input_name,
            ?layout,
            model = %model_path.display(),
            "loaded onnx feature network"
        );
        Ok(Self {
            session: Mutex::new(session),
            input_name,
            layout,
            dim,
        })
    }
}

impl FeatureNetwork for OnnxNetwork {
    fn output_dim(&self) -> Option<usize> {
        self.dim
    }

    fn forward(&self, input: &NormalizedTensor) -> Result<Vec<f32>, PipelineError> {
        let side = i64::from(input.size());
        let (shape, data) = match self.layout {
            TensorLayout::Nhwc => ([1, side, side, 3], input.to_hwc()),
            TensorLayout::Nchw => ([1, 3, side, side], input.as_chw().to_vec()),
        };

        let tensor = Tensor::from_array((shape, data.into_boxed_slice()))
            .map_err(|e| PipelineError::Inference(format!("build input tensor: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| PipelineError::Inference("onnx session lock poisoned".into()))?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(|e| PipelineError::Inference(format!("run: {e}")))?;

        let (output_shape, output_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| PipelineError::Inference(format!("extract output: {e}")))?;
        let dims: &[i64] = output_shape;

        // Accept [1, dim] and [1, dim, 1, 1]; anything else means the
        // network was exported without its pooling head.
        let pooled = dims.first() == Some(&1) && dims.iter().skip(2).all(|&d| d == 1);
        if dims.len() < 2 || !pooled {
            return Err(PipelineError::Inference(format!(
                "unexpected output shape {dims:?}, expected [1, dim] or [1, dim, 1, 1]"
            )));
        }
        Ok(output_data.to_vec())
    }
}

fn open_session(model_path: &Path) -> ort::Result<Session> {
    Session::builder()?.commit_from_file(model_path)
}

/// Try to infer the embedding dimension from the ONNX model output type.
fn infer_dim(output_type: &ort::value::ValueType) -> Option<usize> {
    match output_type {
        ort::value::ValueType::Tensor { shape, .. } => {
            // Second dimension is the channel count after pooling.
            shape
                .get(1)
                .and_then(|&d| if d > 0 { Some(d as usize) } else { None })
        }
        _ => None,
    }
}

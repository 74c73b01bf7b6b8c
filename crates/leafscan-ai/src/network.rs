//! Frozen feature networks: normalized tensor in, pooled embedding out.
//!
//! [`ConvNet`] is a pure-Rust convolutional feature map (stacked 2-D
//! convolutions with a fixed activation, then global average pooling) read
//! from a JSON weight file. The ONNX Runtime backend lives in
//! [`crate::embedder`] behind the `onnx` feature.

use std::path::Path;

use leafscan_core::{NormalizedTensor, PipelineError};
use serde::Deserialize;
use tracing::info;

/// A network that maps a normalized tensor to a fixed-length embedding.
///
/// Implementations are frozen: no state changes between calls, so
/// `forward` on the same tensor returns bit-identical output.
pub trait FeatureNetwork: Send + Sync {
    /// Embedding length, when the backend can tell before the first call.
    fn output_dim(&self) -> Option<usize>;

    fn forward(&self, input: &NormalizedTensor) -> Result<Vec<f32>, PipelineError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    None,
    Relu,
    /// `min(max(x, 0), 6)`, as in MobileNet blocks.
    Relu6,
}

impl Activation {
    fn apply(self, x: f32) -> f32 {
        match self {
            Self::None => x,
            Self::Relu => x.max(0.0),
            Self::Relu6 => x.clamp(0.0, 6.0),
        }
    }
}

/// One square convolution with `kernel / 2` zero padding.
///
/// `weights` is `[out_channels, in_channels, kernel, kernel]`, row-major.
#[derive(Debug, Clone, Deserialize)]
pub struct ConvLayer {
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel: usize,
    #[serde(default = "default_stride")]
    pub stride: usize,
    pub activation: Activation,
    pub weights: Vec<f32>,
    pub bias: Vec<f32>,
}

fn default_stride() -> usize {
    1
}

impl ConvLayer {
    fn check(&self) -> Result<(), String> {
        if self.kernel == 0 || self.stride == 0 || self.in_channels == 0 || self.out_channels == 0
        {
            return Err("kernel, stride and channel counts must be positive".into());
        }
        let expected = self.out_channels * self.in_channels * self.kernel * self.kernel;
        if self.weights.len() != expected {
            return Err(format!(
                "expected {expected} weights, found {}",
                self.weights.len()
            ));
        }
        if self.bias.len() != self.out_channels {
            return Err(format!(
                "expected {} biases, found {}",
                self.out_channels,
                self.bias.len()
            ));
        }
        Ok(())
    }

    fn output_side(&self, side: usize) -> usize {
        let pad = self.kernel / 2;
        (side + 2 * pad).saturating_sub(self.kernel) / self.stride + 1
    }

    /// Apply to a `[in_channels, side, side]` feature map.
    fn forward(&self, input: &[f32], side: usize) -> (Vec<f32>, usize) {
        let pad = self.kernel / 2;
        let out_side = self.output_side(side);
        let plane = side * side;
        let k = self.kernel;
        let mut out = vec![0.0f32; self.out_channels * out_side * out_side];

        for o in 0..self.out_channels {
            let per_out = self.in_channels * k * k;
            let w_o = &self.weights[o * per_out..(o + 1) * per_out];
            for oy in 0..out_side {
                for ox in 0..out_side {
                    let mut acc = self.bias[o];
                    for c in 0..self.in_channels {
                        let src = &input[c * plane..(c + 1) * plane];
                        let w_c = &w_o[c * k * k..(c + 1) * k * k];
                        for ky in 0..k {
                            let y = (oy * self.stride + ky) as isize - pad as isize;
                            if y < 0 || y >= side as isize {
                                continue;
                            }
                            for kx in 0..k {
                                let x = (ox * self.stride + kx) as isize - pad as isize;
                                if x < 0 || x >= side as isize {
                                    continue;
                                }
                                acc += w_c[ky * k + kx] * src[y as usize * side + x as usize];
                            }
                        }
                    }
                    out[(o * out_side + oy) * out_side + ox] = self.activation.apply(acc);
                }
            }
        }
        (out, out_side)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ConvNetFile {
    layers: Vec<ConvLayer>,
}

/// Convolution stack followed by global average pooling.
#[derive(Debug, Clone)]
pub struct ConvNet {
    layers: Vec<ConvLayer>,
}

impl ConvNet {
    pub fn new(layers: Vec<ConvLayer>) -> Result<Self, PipelineError> {
        if layers.is_empty() {
            return Err(PipelineError::InvalidArtifact("conv net has no layers".into()));
        }
        let mut channels = NormalizedTensor::CHANNELS;
        for (i, layer) in layers.iter().enumerate() {
            layer
                .check()
                .map_err(|e| PipelineError::InvalidArtifact(format!("layer {i}: {e}")))?;
            if layer.in_channels != channels {
                return Err(PipelineError::InvalidArtifact(format!(
                    "layer {i} expects {} input channels, previous layer yields {channels}",
                    layer.in_channels
                )));
            }
            channels = layer.out_channels;
        }
        Ok(Self { layers })
    }

    /// Load weights from a JSON file of the form `{ "layers": [...] }`.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::artifact(path, e))?;
        let file: ConvNetFile =
            serde_json::from_str(&text).map_err(|e| PipelineError::artifact(path, e))?;
        let net = Self::new(file.layers).map_err(|e| match e {
            PipelineError::InvalidArtifact(reason) => PipelineError::artifact(path, reason),
            other => other,
        })?;
        info!(
            layers = net.layers.len(),
            dim = net.dim(),
            model = %path.display(),
            "loaded conv feature network"
        );
        Ok(net)
    }

    /// Embedding length: channel count of the last layer.
    pub fn dim(&self) -> usize {
        self.layers.last().map(|l| l.out_channels).unwrap_or(0)
    }
}

impl FeatureNetwork for ConvNet {
    fn output_dim(&self) -> Option<usize> {
        Some(self.dim())
    }

    fn forward(&self, input: &NormalizedTensor) -> Result<Vec<f32>, PipelineError> {
        let mut side = input.size() as usize;
        let mut map = input.as_chw().to_vec();
        for layer in &self.layers {
            let (next, next_side) = layer.forward(&map, side);
            map = next;
            side = next_side;
        }

        // Global average pooling.
        let plane = side * side;
        let pooled = map
            .chunks_exact(plane)
            .map(|ch| ch.iter().sum::<f32>() / plane as f32)
            .collect();
        Ok(pooled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::identity_conv;

    fn tensor(size: u32, rgb: [f32; 3]) -> NormalizedTensor {
        let plane = (size * size) as usize;
        let mut data = Vec::with_capacity(3 * plane);
        for v in rgb {
            data.extend(std::iter::repeat_n(v, plane));
        }
        NormalizedTensor::from_chw(size, data).unwrap()
    }

    fn layer(json: serde_json::Value) -> ConvLayer {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn identity_pools_mean_color() {
        let file: ConvNetFile = serde_json::from_value(identity_conv()).unwrap();
        let net = ConvNet::new(file.layers).unwrap();
        let out = net.forward(&tensor(8, [0.25, 0.5, 0.75])).unwrap();
        assert_eq!(out, vec![0.25, 0.5, 0.75]);
        assert_eq!(net.output_dim(), Some(3));
    }

    #[test]
    fn stride_two_halves_side() {
        let l = layer(serde_json::json!({
            "in_channels": 3, "out_channels": 1, "kernel": 3, "stride": 2,
            "activation": "relu",
            "weights": vec![1.0f32; 27], "bias": [0.0]
        }));
        assert_eq!(l.output_side(224), 112);
        assert_eq!(l.output_side(7), 4);
        assert_eq!(l.output_side(1), 1);
    }

    #[test]
    fn zero_padding_at_borders() {
        // 3x3 box filter over a single all-ones channel (others zero).
        let mut weights = vec![0.0f32; 27];
        weights[..9].fill(1.0);
        let net = ConvNet::new(vec![layer(serde_json::json!({
            "in_channels": 3, "out_channels": 1, "kernel": 3,
            "activation": "none", "weights": weights, "bias": [0.0]
        }))])
        .unwrap();
        // On a 2x2 map every padded 3x3 window covers all four cells.
        let out = net.forward(&tensor(2, [1.0, 0.0, 0.0])).unwrap();
        assert_eq!(out, vec![4.0]);
    }

    #[test]
    fn activations_clip() {
        assert_eq!(Activation::Relu.apply(-2.0), 0.0);
        assert_eq!(Activation::Relu6.apply(9.0), 6.0);
        assert_eq!(Activation::Relu6.apply(3.5), 3.5);
        assert_eq!(Activation::None.apply(-2.0), -2.0);
    }

    #[test]
    fn two_layer_stack_output_dim() {
        let first = layer(serde_json::json!({
            "in_channels": 3, "out_channels": 4, "kernel": 3, "stride": 2,
            "activation": "relu6",
            "weights": vec![0.1f32; 4 * 3 * 9], "bias": [0.0, 0.1, 0.2, 0.3]
        }));
        let second = layer(serde_json::json!({
            "in_channels": 4, "out_channels": 6, "kernel": 1,
            "activation": "relu",
            "weights": vec![0.5f32; 6 * 4], "bias": vec![0.0f32; 6]
        }));
        let net = ConvNet::new(vec![first, second]).unwrap();
        let out = net.forward(&tensor(16, [0.2, 0.4, 0.6])).unwrap();
        assert_eq!(out.len(), 6);
        assert!(out.iter().all(|v| v.is_finite() && *v >= 0.0));
    }

    #[test]
    fn rejects_channel_mismatch_between_layers() {
        let first = layer(serde_json::json!({
            "in_channels": 3, "out_channels": 4, "kernel": 1,
            "activation": "none", "weights": vec![0.0f32; 12], "bias": vec![0.0f32; 4]
        }));
        let second = layer(serde_json::json!({
            "in_channels": 5, "out_channels": 1, "kernel": 1,
            "activation": "none", "weights": vec![0.0f32; 5], "bias": [0.0]
        }));
        assert!(ConvNet::new(vec![first, second]).is_err());
    }

    #[test]
    fn rejects_wrong_weight_count() {
        let bad = layer(serde_json::json!({
            "in_channels": 3, "out_channels": 2, "kernel": 3,
            "activation": "none", "weights": vec![0.0f32; 10], "bias": [0.0, 0.0]
        }));
        let err = ConvNet::new(vec![bad]).unwrap_err();
        assert!(err.to_string().contains("54"), "{err}");
    }

    #[test]
    fn load_missing_file_is_artifact_error() {
        let err = ConvNet::load(Path::new("/nonexistent/conv.json")).unwrap_err();
        assert!(matches!(err, PipelineError::ArtifactLoad { .. }));
    }
}

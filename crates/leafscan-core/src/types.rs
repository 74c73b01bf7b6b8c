//! Values that flow through the pipeline.

use serde::{Deserialize, Serialize};

/// A resized, normalized RGB image in channel-major (`[3, H, W]`) order.
///
/// Always square; `size` is the manifest's `input_size`.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor {
    size: u32,
    data: Vec<f32>,
}

impl NormalizedTensor {
    pub const CHANNELS: usize = 3;

    /// Wrap channel-major data. Returns `None` when the length is not
    /// `3 * size * size`.
    pub fn from_chw(size: u32, data: Vec<f32>) -> Option<Self> {
        let plane = size as usize * size as usize;
        (size > 0 && data.len() == Self::CHANNELS * plane).then_some(Self { size, data })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Channel-major values, length `3 * size * size`.
    pub fn as_chw(&self) -> &[f32] {
        &self.data
    }

    /// One channel plane, row-major.
    pub fn channel(&self, c: usize) -> &[f32] {
        let plane = self.size as usize * self.size as usize;
        &self.data[c * plane..(c + 1) * plane]
    }

    /// Interleaved `[H, W, 3]` copy for networks exported channel-last.
    pub fn to_hwc(&self) -> Vec<f32> {
        let plane = self.size as usize * self.size as usize;
        let mut out = Vec::with_capacity(self.data.len());
        for i in 0..plane {
            for c in 0..Self::CHANNELS {
                out.push(self.data[c * plane + i]);
            }
        }
        out
    }
}

/// Fixed-length feature vector produced by the frozen network.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassProbability {
    pub label: String,
    pub probability: f64,
}

/// Result of one `predict` call.
///
/// `probabilities` covers the whole label set in codec order, so two results
/// from the same model line up entry by entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub class_index: usize,
    pub probabilities: Vec<ClassProbability>,
}

impl Prediction {
    /// Probability of the selected label.
    pub fn confidence(&self) -> f64 {
        self.probabilities
            .get(self.class_index)
            .map(|p| p.probability)
            .unwrap_or(0.0)
    }

    /// Entries sorted by descending probability, ties kept in codec order.
    pub fn ranked(&self) -> Vec<&ClassProbability> {
        let mut out: Vec<&ClassProbability> = self.probabilities.iter().collect();
        out.sort_by(|a, b| {
            b.probability
                .partial_cmp(&a.probability)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        out
    }
}

//! Image decoding and input normalization.
//!
//! Raw bytes → RGB raster → `size × size` bilinear stretch → channel-major
//! tensor under the manifest's [`Normalization`].

use image::DynamicImage;
use image::imageops::{self, FilterType};
use leafscan_core::{Normalization, NormalizedTensor, PipelineError};

/// Decode JPEG or PNG bytes. Anything else is a [`PipelineError::Decode`].
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::Decode("input is empty".into()));
    }
    let image = image::load_from_memory(bytes).map_err(|e| PipelineError::Decode(e.to_string()))?;
    if image.width() == 0 || image.height() == 0 {
        return Err(PipelineError::Decode(format!(
            "image has zero size ({}x{})",
            image.width(),
            image.height()
        )));
    }
    Ok(image)
}

/// Coerce to RGB, stretch to `size × size` and remap channel values.
///
/// Alpha is dropped rather than composited and grayscale is replicated into
/// all three channels. Aspect ratio is not preserved.
pub fn normalize(
    image: &DynamicImage,
    size: u32,
    normalization: Normalization,
) -> Result<NormalizedTensor, PipelineError> {
    let rgb = image.to_rgb8();
    let resized = imageops::resize(&rgb, size, size, FilterType::Triangle);

    let plane = size as usize * size as usize;
    let mut data = vec![0.0f32; NormalizedTensor::CHANNELS * plane];
    for (i, pixel) in resized.pixels().enumerate() {
        for c in 0..NormalizedTensor::CHANNELS {
            data[c * plane + i] = normalization.apply(pixel[c], c);
        }
    }

    NormalizedTensor::from_chw(size, data)
        .ok_or_else(|| PipelineError::Inference(format!("cannot build {size}x{size} tensor")))
}

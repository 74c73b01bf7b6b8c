//! Shared fixtures: in-memory image encoding and a small model directory.

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::json;

pub fn encode_png(image: &DynamicImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

pub fn encode_jpeg(image: &DynamicImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Jpeg).unwrap();
    buf.into_inner()
}

/// PNG of a single solid color.
pub fn solid_png(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    encode_png(&DynamicImage::ImageRgb8(RgbImage::from_pixel(
        width,
        height,
        Rgb(rgb),
    )))
}

/// PNG with a horizontal red ramp and a vertical green ramp.
pub fn gradient_png(width: u32, height: u32) -> Vec<u8> {
    let mut img = RgbImage::new(width, height);
    for (x, y, p) in img.enumerate_pixels_mut() {
        *p = Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            64,
        ]);
    }
    encode_png(&DynamicImage::ImageRgb8(img))
}

pub const CLASSES: [&str; 3] = [
    "Potato___Early_blight",
    "Potato___Late_blight",
    "Potato___healthy",
];

/// Conv net with one 1×1 layer copying RGB into 3 channels, so the pooled
/// embedding is the mean normalized color.
pub fn identity_conv() -> serde_json::Value {
    json!({
        "layers": [{
            "in_channels": 3,
            "out_channels": 3,
            "kernel": 1,
            "stride": 1,
            "activation": "none",
            "weights": [1.0, 0.0, 0.0,
                        0.0, 1.0, 0.0,
                        0.0, 0.0, 1.0],
            "bias": [0.0, 0.0, 0.0]
        }]
    })
}

/// Forest over mean color. The main tree reads red first, then green:
/// bright red → early blight, bright green → healthy, else late blight.
/// A blue stump votes late blight unless blue is bright.
pub fn color_forest() -> serde_json::Value {
    let main = json!({
        "children_left": [1, 2, -1, -1, -1],
        "children_right": [4, 3, -1, -1, -1],
        "feature": [0, 1, -2, -2, -2],
        "threshold": [0.6, 0.6, -2.0, -2.0, -2.0],
        "value": [
            [0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0],
            [0.0, 4.0, 0.0],
            [0.0, 0.0, 4.0],
            [4.0, 0.0, 0.0],
        ],
    });
    let blue = json!({
        "children_left": [1, -1, -1],
        "children_right": [2, -1, -1],
        "feature": [2, -2, -2],
        "threshold": [0.6, -2.0, -2.0],
        "value": [[0.0, 0.0, 0.0], [0.0, 3.0, 1.0], [2.0, 0.0, 0.0]],
    });
    json!({
        "n_features": 3,
        "classes": CLASSES,
        "trees": [main.clone(), main, blue],
    })
}

/// Write a complete conv-backed model directory.
pub fn write_model_dir(dir: &Path, embedding_dim: usize) {
    std::fs::write(
        dir.join("manifest.json"),
        json!({
            "version": "test-1",
            "input_size": 32,
            "normalization": "unit",
            "embedding_dim": embedding_dim,
            "extractor": { "kind": "conv", "file": "conv.json" },
        })
        .to_string(),
    )
    .unwrap();
    std::fs::write(dir.join("conv.json"), identity_conv().to_string()).unwrap();
    std::fs::write(dir.join("forest.json"), color_forest().to_string()).unwrap();
}

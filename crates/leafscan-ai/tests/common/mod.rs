//! Fixtures shared by the runtime test binaries.

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::json;

pub fn png(rgb: [u8; 3]) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(300, 300, Rgb(rgb)));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

pub fn write_model_dir(dir: &Path) {
    let manifest = json!({
        "version": "runtime-test",
        "input_size": 16,
        "normalization": "unit",
        "embedding_dim": 3,
        "extractor": { "kind": "conv", "file": "conv.json" },
    });
    let conv = json!({
        "layers": [{
            "in_channels": 3, "out_channels": 3, "kernel": 1, "activation": "none",
            "weights": [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
            "bias": [0.0, 0.0, 0.0]
        }]
    });
    let forest = json!({
        "n_features": 3,
        "classes": ["Potato___Early_blight", "Potato___Late_blight", "Potato___healthy"],
        "trees": [{
            "children_left": [1, -1, -1],
            "children_right": [2, -1, -1],
            "feature": [1, -2, -2],
            "threshold": [0.6, -2.0, -2.0],
            "value": [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]]
        }]
    });
    std::fs::write(dir.join("manifest.json"), manifest.to_string()).unwrap();
    std::fs::write(dir.join("conv.json"), conv.to_string()).unwrap();
    std::fs::write(dir.join("forest.json"), forest.to_string()).unwrap();
}

//! Label codec: class index ↔ canonical class name.
//!
//! The order is the fitted classifier's class order (scikit-learn's
//! `LabelEncoder.classes_`, i.e. sorted at fit time). It is fixed once at load
//! and never re-sorted here.

use std::collections::HashMap;
use std::path::Path;

use leafscan_core::{CodecError, PipelineError};

/// Bijective mapping between class indices and canonical labels.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelCodec {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl LabelCodec {
    /// Build a codec from names in class-index order.
    pub fn new(names: Vec<String>) -> Result<Self, CodecError> {
        if names.is_empty() {
            return Err(CodecError::Empty);
        }
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(CodecError::Duplicate(name.clone()));
            }
        }
        Ok(Self { names, index })
    }

    /// Load a standalone codec artifact: a JSON array of class names.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::artifact(path, e))?;
        let names: Vec<String> =
            serde_json::from_str(&text).map_err(|e| PipelineError::artifact(path, e))?;
        Ok(Self::new(names)?)
    }

    /// Class name for an index emitted by the classifier.
    pub fn decode(&self, index: usize) -> Result<&str, CodecError> {
        self.names
            .get(index)
            .map(String::as_str)
            .ok_or(CodecError::IndexOutOfRange {
                index,
                len: self.names.len(),
            })
    }

    /// Class index for a canonical name.
    pub fn encode(&self, label: &str) -> Result<usize, CodecError> {
        self.index
            .get(label)
            .copied()
            .ok_or_else(|| CodecError::UnknownLabel(label.to_string()))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names in class-index order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Fail unless `other` carries the same names in the same order.
    pub fn ensure_same(&self, other: &LabelCodec) -> Result<(), CodecError> {
        if self.names == other.names {
            return Ok(());
        }
        Err(CodecError::Disagreement(format!(
            "{:?} vs {:?}",
            self.names, other.names
        )))
    }
}

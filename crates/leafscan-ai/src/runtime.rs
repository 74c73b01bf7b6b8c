//! Process-wide pipeline.
//!
//! The host calls [`init`] once at startup; afterwards any thread may call
//! [`predict`]. A call that arrives while [`init`] is still loading waits for
//! it to finish, and a call made before any [`init`] gets
//! [`PipelineError::NotInitialized`]. There is no teardown.

use std::path::Path;
use std::sync::{Mutex, OnceLock, PoisonError};

use leafscan_core::{PipelineError, Prediction};
use tracing::warn;

use crate::pipeline::Pipeline;

static PIPELINE: OnceLock<Pipeline> = OnceLock::new();
static LOADING: Mutex<()> = Mutex::new(());

/// Load and validate the artifacts in `model_dir` and install them as the
/// shared pipeline.
///
/// Idempotent: once a pipeline is installed later calls return it unchanged.
pub fn init(model_dir: &Path) -> Result<&'static Pipeline, PipelineError> {
    let _loading = LOADING.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(existing) = PIPELINE.get() {
        warn!(
            dir = %model_dir.display(),
            "pipeline already initialized, keeping existing artifacts"
        );
        return Ok(existing);
    }
    let pipeline = Pipeline::load(model_dir)?;
    Ok(PIPELINE.get_or_init(|| pipeline))
}

/// The shared pipeline, waiting out an [`init`] in progress.
pub fn shared() -> Result<&'static Pipeline, PipelineError> {
    if let Some(p) = PIPELINE.get() {
        return Ok(p);
    }
    let _loading = LOADING.lock().unwrap_or_else(PoisonError::into_inner);
    PIPELINE.get().ok_or(PipelineError::NotInitialized)
}

/// Classify raw image bytes with the shared pipeline.
pub fn predict(bytes: &[u8]) -> Result<Prediction, PipelineError> {
    shared()?.predict(bytes)
}

use crate::classifier::{Classifier, ModelSummary, TractClassifier};
use crate::error::ModelError;
use log::{error, info};
use parking_lot::Mutex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub type Loader = Box<dyn Fn(&Path) -> Result<Arc<dyn Classifier>, ModelError> + Send + Sync>;

/// Holds the one shared model instance. Loads happen under the lock, so
/// concurrent first requests wait for a single load instead of racing.
pub struct ModelStore {
    path: PathBuf,
    loader: Loader,
    slot: Mutex<Slot>,
}

#[derive(Default)]
struct Slot {
    model: Option<Arc<dyn Classifier>>,
    last_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ModelStatus {
    pub loaded: bool,
    pub loading: bool,
    pub model_path: String,
    pub file_exists: bool,
    pub file_size_bytes: Option<u64>,
    pub last_error: Option<String>,
    pub summary: Option<ModelSummary>,
}

impl ModelStore {
    pub fn new(path: impl Into<PathBuf>, loader: Loader) -> Self {
        ModelStore {
            path: path.into(),
            loader,
            slot: Mutex::new(Slot::default()),
        }
    }

    pub fn onnx(path: impl Into<PathBuf>) -> Self {
        Self::new(
            path,
            Box::new(|path: &Path| -> Result<Arc<dyn Classifier>, ModelError> {
                let model = TractClassifier::load(path)?;
                Ok(Arc::new(model) as Arc<dyn Classifier>)
            }),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the loaded model, loading it first if no earlier attempt
    /// succeeded. A failure is remembered for diagnostics and retried on the
    /// next call.
    pub fn get(&self) -> Result<Arc<dyn Classifier>, ModelError> {
        let mut slot = self.slot.lock();
        if let Some(model) = &slot.model {
            return Ok(Arc::clone(model));
        }

        match (self.loader)(&self.path) {
            Ok(model) => {
                info!("model ready: {}", self.path.display());
                slot.model = Some(Arc::clone(&model));
                slot.last_error = None;
                Ok(model)
            }
            Err(e) => {
                error!("model load failed: {}", e);
                slot.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Never waits on an in-flight load; reports `loading` instead.
    pub fn status(&self) -> ModelStatus {
        let metadata = fs::metadata(&self.path).ok();
        let mut status = ModelStatus {
            loaded: false,
            loading: false,
            model_path: self.path.display().to_string(),
            file_exists: metadata.is_some(),
            file_size_bytes: metadata.map(|m| m.len()),
            last_error: None,
            summary: None,
        };

        match self.slot.try_lock() {
            Some(slot) => {
                status.loaded = slot.model.is_some();
                status.last_error = slot.last_error.clone();
                status.summary = slot.model.as_ref().map(|m| m.summary());
            }
            None => status.loading = true,
        }
        status
    }
}

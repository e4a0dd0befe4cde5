use crate::error::LabelError;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

const KIDNEY_CLASSES: [&str; 4] = ["Cyst", "Normal", "Stone", "Tumor"];

/// Class index -> class name, e.g. `{"0": "Cyst", "1": "Normal"}` on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelMap(BTreeMap<usize, String>);

impl Default for LabelMap {
    fn default() -> Self {
        LabelMap(
            KIDNEY_CLASSES
                .iter()
                .enumerate()
                .map(|(i, name)| (i, name.to_string()))
                .collect(),
        )
    }
}

impl LabelMap {
    pub fn from_json(path: &Path, text: &str) -> Result<Self, LabelError> {
        serde_json::from_str(text).map_err(|source| LabelError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads the labels file, falling back to the built-in kidney classes
    /// when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, LabelError> {
        if !path.exists() {
            warn!(
                "labels file {} not found, using built-in classes {:?}",
                path.display(),
                KIDNEY_CLASSES
            );
            return Ok(LabelMap::default());
        }
        let text = fs::read_to_string(path).map_err(|source| LabelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let labels = Self::from_json(path, &text)?;
        let duplicates = labels.duplicate_names();
        if !duplicates.is_empty() {
            warn!(
                "labels file {} repeats class names {:?}; their probabilities will be merged by name",
                path.display(),
                duplicates
            );
        }
        info!("loaded {} labels from {}", labels.len(), path.display());
        Ok(labels)
    }

    pub fn name(&self, index: usize) -> String {
        self.0
            .get(&index)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", index))
    }

    /// Names that appear under more than one index.
    pub fn duplicate_names(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        let mut repeated = BTreeSet::new();
        for name in self.0.values() {
            if !seen.insert(name.as_str()) {
                repeated.insert(name.as_str());
            }
        }
        repeated.into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.0.iter().map(|(i, name)| (*i, name.as_str()))
    }
}

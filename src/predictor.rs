use crate::error::{ApiError, ModelError};
use crate::labels::LabelMap;
use crate::models::Prediction;
use crate::preprocess;
use crate::store::ModelStore;
use image::DynamicImage;

pub struct Predictor {
    pub store: ModelStore,
    pub labels: LabelMap,
}

impl Predictor {
    pub fn new(store: ModelStore, labels: LabelMap) -> Self {
        Predictor { store, labels }
    }

    /// Decode, preprocess and classify uploaded bytes. Undecodable input is
    /// reported before the model is touched.
    pub fn predict_bytes(&self, bytes: &[u8]) -> Result<Prediction, ApiError> {
        let img = preprocess::decode(bytes).map_err(|e| ApiError::InvalidImage(e.to_string()))?;
        Ok(self.predict_image(&img)?)
    }

    pub fn predict_image(&self, img: &DynamicImage) -> Result<Prediction, ModelError> {
        let model = self.store.get()?;
        let input = preprocess::to_input_tensor(img);
        let scores = model.classify(&input)?;
        Prediction::from_scores(&scores, &self.labels)
    }
}

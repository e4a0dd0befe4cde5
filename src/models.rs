use crate::error::ModelError;
use crate::labels::LabelMap;
use serde::Serialize;
use std::collections::BTreeMap;

const DISTRIBUTION_TOLERANCE: f32 = 1e-3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub class_index: usize,
    pub label: String,
    pub confidence: f32,
    pub raw: Vec<f32>,
    pub probabilities: BTreeMap<String, f32>,
}

/// A prediction for a file on disk, as printed by the `predict` command.
#[derive(Debug, Serialize)]
pub struct FilePrediction {
    pub file: String,
    #[serde(flatten)]
    pub prediction: Prediction,
}

impl Prediction {
    pub fn from_scores(scores: &[f32], labels: &LabelMap) -> Result<Self, ModelError> {
        let raw = to_distribution(scores)?;
        let class_index = argmax(&raw);
        let probabilities = raw
            .iter()
            .enumerate()
            .map(|(i, p)| (labels.name(i), *p))
            .collect();

        Ok(Prediction {
            class_index,
            label: labels.name(class_index),
            confidence: raw[class_index],
            raw,
            probabilities,
        })
    }
}

/// Passes softmax output through untouched and applies softmax to anything
/// else (e.g. logits from a head exported without its activation).
pub fn to_distribution(scores: &[f32]) -> Result<Vec<f32>, ModelError> {
    if scores.is_empty() {
        return Err(ModelError::Output("model returned no scores".to_string()));
    }
    if scores.iter().any(|s| !s.is_finite()) {
        return Err(ModelError::Output(format!("non-finite scores: {:?}", scores)));
    }

    let sum: f32 = scores.iter().sum();
    let in_unit_range = scores.iter().all(|s| (0.0..=1.0).contains(s));
    if in_unit_range && (sum - 1.0).abs() <= DISTRIBUTION_TOLERANCE {
        return Ok(scores.to_vec());
    }

    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    Ok(exps.into_iter().map(|e| e / total).collect())
}

// First index wins on ties.
fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

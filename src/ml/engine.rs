//! Forward-pass inference over a validated [`ModelArtifact`].
//!
//! Every function here is pure: the artifact is only read, so any number of
//! callers may share one artifact without locking.

use serde::{Deserialize, Serialize};

use super::store::{ClassLabel, ModelArtifact};
use crate::error::{AgingWellError, Result};

/// Outcome of classifying one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub class_label: ClassLabel,
    /// Probability assigned to `class_label`.
    pub confidence: f64,
    /// Same order as the model's class labels.
    pub probabilities: Vec<f64>,
}

/// Class probabilities for a single feature vector.
pub fn predict_probabilities(artifact: &ModelArtifact, features: &[f64]) -> Result<Vec<f64>> {
    check_input(artifact, features)?;

    let layers = artifact.layers();
    let last = layers.len() - 1;
    let hidden = artifact.hidden_activation();

    let mut a: Vec<f64> = features.to_vec();
    for (idx, layer) in layers.iter().enumerate() {
        // a · W + b, with W laid out [in_dim][out_dim]
        let mut y = layer.bias().to_vec();
        for (x, row) in a.iter().zip(layer.weights()) {
            if *x == 0.0 {
                continue;
            }
            for (acc, w) in y.iter_mut().zip(row) {
                *acc += x * w;
            }
        }
        // ReLU maps NaN to 0.0, so overflow has to be caught before it.
        if y.iter().any(|v| !v.is_finite()) {
            return Err(AgingWellError::NonFiniteActivation { layer: idx });
        }
        if idx < last {
            hidden.apply_in_place(&mut y);
        }
        a = y;
    }

    Ok(artifact.output_activation().normalize(&a))
}

/// Row-wise [`predict_probabilities`]; fails on the first bad row.
pub fn predict_probabilities_batch<R: AsRef<[f64]>>(
    artifact: &ModelArtifact,
    rows: &[R],
) -> Result<Vec<Vec<f64>>> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| predict_probabilities(artifact, row.as_ref()).map_err(|e| e.in_row(i)))
        .collect()
}

pub fn predict_with_confidence(
    artifact: &ModelArtifact,
    features: &[f64],
) -> Result<PredictionResult> {
    let probabilities = predict_probabilities(artifact, features)?;
    package(artifact, probabilities)
}

pub fn predict_with_confidence_batch<R: AsRef<[f64]>>(
    artifact: &ModelArtifact,
    rows: &[R],
) -> Result<Vec<PredictionResult>> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| predict_with_confidence(artifact, row.as_ref()).map_err(|e| e.in_row(i)))
        .collect()
}

/// Predicted label per row.
pub fn predict<R: AsRef<[f64]>>(artifact: &ModelArtifact, rows: &[R]) -> Result<Vec<ClassLabel>> {
    Ok(predict_with_confidence_batch(artifact, rows)?
        .into_iter()
        .map(|r| r.class_label)
        .collect())
}

/// Index of the largest value; ties go to the lowest index.
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

fn package(artifact: &ModelArtifact, probabilities: Vec<f64>) -> Result<PredictionResult> {
    let idx = argmax(&probabilities)
        .ok_or_else(|| AgingWellError::Internal("model produced no probabilities".to_string()))?;
    let class_label = artifact.class_labels().get(idx).cloned().ok_or_else(|| {
        AgingWellError::Internal(format!("no class label for output index {idx}"))
    })?;
    Ok(PredictionResult {
        class_label,
        confidence: probabilities[idx],
        probabilities,
    })
}

fn check_input(artifact: &ModelArtifact, features: &[f64]) -> Result<()> {
    let expected = artifact.n_features_in();
    if features.len() != expected {
        return Err(AgingWellError::FeatureCountMismatch {
            expected,
            actual: features.len(),
        });
    }
    if let Some(index) = features.iter().position(|v| !v.is_finite()) {
        return Err(AgingWellError::NonFiniteFeature { index });
    }
    Ok(())
}

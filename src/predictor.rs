//! Feature vector -> species label.

use serde::Serialize;

use crate::artifact::ModelArtifactBundle;
use crate::encoding::{EncodingMetadata, FeatureVector};

/// Outcome of one prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub class_index: usize,
    pub species: String,
    /// Per-class probabilities, indexed like the label map.
    pub probabilities: Vec<f32>,
}

/// Prediction failures. All of them point at a broken artifact or caller,
/// never at user input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PredictError {
    #[error("feature vector has {actual} values but the model expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("model produced non-finite scores {margins:?}")]
    NonFiniteScore { margins: Vec<f32> },

    #[error("class index {index} has no label (label map holds {known})")]
    UnknownClassIndex { index: usize, known: usize },
}

/// Run the bundle's model on `features` and resolve the winning label.
pub fn predict(
    features: &FeatureVector,
    bundle: &ModelArtifactBundle,
) -> Result<Prediction, PredictError> {
    let expected = bundle.metadata().num_columns();
    if features.len() != expected {
        return Err(PredictError::DimensionMismatch {
            expected,
            actual: features.len(),
        });
    }

    let model = bundle.model();
    let margins = model.predict_margins(features.as_slice());
    let Some(class_index) = model.objective().class_index(&margins) else {
        return Err(PredictError::NonFiniteScore { margins });
    };
    let species = resolve_label(class_index, bundle.metadata())?;

    Ok(Prediction {
        class_index,
        species: species.to_string(),
        probabilities: model.objective().probabilities(&margins),
    })
}

/// Map a model class index to its label.
pub fn resolve_label(index: usize, metadata: &EncodingMetadata) -> Result<&str, PredictError> {
    metadata
        .label(index)
        .ok_or(PredictError::UnknownClassIndex {
            index,
            known: metadata.labels().len(),
        })
}

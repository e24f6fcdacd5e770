//! Record -> feature vector encoding.

use crate::features::{CategoricalField, FeatureRecord};

use super::metadata::{ColumnSource, EncodingMetadata};

/// Model input for one request.
///
/// Positions only mean something relative to the [`EncodingMetadata`] that
/// produced the vector.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Box<[f32]>,
}

impl FeatureVector {
    /// Wrap raw values. Length is checked against the metadata at predict time.
    pub fn from_values(values: Vec<f32>) -> Self {
        Self {
            values: values.into_boxed_slice(),
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The record carries a level the trained vocabulary does not know.
///
/// Validation derives its accepted values from the same metadata, so this
/// only happens when the validator and the artifact have drifted apart.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodingError {
    #[error("level `{level}` of `{field}` is not in the trained vocabulary {known:?}")]
    UnknownLevel {
        field: CategoricalField,
        level: String,
        known: Vec<String>,
    },
}

/// Encode a validated record exactly as the training rows were encoded.
///
/// Numeric fields are copied (as `f32`, the model's input type); each
/// categorical field becomes one-hot indicators. Order comes from the
/// metadata layout alone.
pub fn encode(
    record: &FeatureRecord,
    metadata: &EncodingMetadata,
) -> Result<FeatureVector, EncodingError> {
    for field in CategoricalField::ALL {
        let level = record.level(field);
        let known = metadata.levels(field);
        if !known.iter().any(|l| l == level) {
            return Err(EncodingError::UnknownLevel {
                field,
                level: level.to_string(),
                known: known.to_vec(),
            });
        }
    }

    let values = metadata
        .layout()
        .iter()
        .map(|source| match source {
            ColumnSource::Numeric(field) => record.numeric(*field) as f32,
            ColumnSource::Indicator { field, level } => {
                if record.level(*field) == level {
                    1.0
                } else {
                    0.0
                }
            }
        })
        .collect();

    Ok(FeatureVector::from_values(values))
}

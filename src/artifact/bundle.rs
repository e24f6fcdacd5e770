//! The loaded model + encoding metadata unit.

use crate::compat::ConversionError;
use crate::encoding::{EncodingMetadata, MetadataError};
use crate::model::Model;
use crate::schema::RequestSchema;

use super::source::{BundleLocator, RawBundle};

/// blake3 digest of serialized model bytes, as lowercase hex.
pub fn model_digest(model_bytes: &[u8]) -> String {
    blake3::hash(model_bytes).to_hex().to_string()
}

/// Reasons a model and its metadata cannot form a bundle.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("invalid encoding metadata: {0}")]
    Metadata(#[from] MetadataError),

    #[error("invalid model: {0}")]
    Model(#[from] ConversionError),

    #[error("model expects {model} features but metadata lists {metadata} columns")]
    FeatureCountMismatch { model: usize, metadata: usize },

    #[error("model predicts {model} classes but metadata maps {metadata} labels")]
    ClassCountMismatch { model: usize, metadata: usize },

    #[error("model feature names differ from metadata columns at position {position}: `{model}` vs `{metadata}`")]
    FeatureNameMismatch {
        position: usize,
        model: String,
        metadata: String,
    },

    #[error("model digest {actual} does not match the digest recorded in metadata ({expected})")]
    DigestMismatch { expected: String, actual: String },
}

/// An immutable, verified {model, metadata, request schema} triple.
#[derive(Debug)]
pub struct ModelArtifactBundle {
    model: Model,
    metadata: EncodingMetadata,
    schema: RequestSchema,
    digest: Option<String>,
    source: BundleLocator,
}

impl ModelArtifactBundle {
    /// Pair a model with its metadata after checking they agree.
    pub fn new(
        model: Model,
        metadata: EncodingMetadata,
        source: BundleLocator,
    ) -> Result<Self, BundleError> {
        check_compatible(&model, &metadata)?;
        let schema = RequestSchema::from_metadata(&metadata);
        Ok(Self {
            model,
            metadata,
            schema,
            digest: None,
            source,
        })
    }

    /// Parse raw bundle bytes, verifying the model digest when metadata records one.
    pub fn from_raw(raw: &RawBundle, source: BundleLocator) -> Result<Self, BundleError> {
        let metadata = EncodingMetadata::from_json(&raw.metadata)?;
        let actual = model_digest(&raw.model);
        if let Some(expected) = metadata.model_digest() {
            if !expected.eq_ignore_ascii_case(&actual) {
                return Err(BundleError::DigestMismatch {
                    expected: expected.to_string(),
                    actual,
                });
            }
        }
        let model = Model::from_xgboost_json(&raw.model)?;
        let mut bundle = Self::new(model, metadata, source)?;
        bundle.digest = Some(actual);
        Ok(bundle)
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn metadata(&self) -> &EncodingMetadata {
        &self.metadata
    }

    pub fn schema(&self) -> &RequestSchema {
        &self.schema
    }

    /// Digest of the model bytes this bundle was loaded from.
    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    pub fn source(&self) -> &BundleLocator {
        &self.source
    }
}

/// Check that `model` was fitted on the columns and labels `metadata` describes.
pub fn check_compatible(model: &Model, metadata: &EncodingMetadata) -> Result<(), BundleError> {
    if model.num_features() != metadata.num_columns() {
        return Err(BundleError::FeatureCountMismatch {
            model: model.num_features(),
            metadata: metadata.num_columns(),
        });
    }
    if model.num_classes() != metadata.labels().len() {
        return Err(BundleError::ClassCountMismatch {
            model: model.num_classes(),
            metadata: metadata.labels().len(),
        });
    }
    if let Some(names) = &model.meta().feature_names {
        if let Some((position, (m, c))) = names
            .iter()
            .zip(metadata.columns())
            .enumerate()
            .find(|(_, (m, c))| m != c)
        {
            return Err(BundleError::FeatureNameMismatch {
                position,
                model: m.clone(),
                metadata: c.clone(),
            });
        }
    }
    Ok(())
}

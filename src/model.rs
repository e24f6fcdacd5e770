//! Fitted classifier model wrapper.
//!
//! The [`Model`] struct is the predict contract the rest of the crate consumes:
//! a tree ensemble, its objective, and metadata describing what it was fitted on.
//!
//! # Example
//!
//! ```ignore
//! use penguins::model::Model;
//!
//! let model = Model::from_xgboost_json(&std::fs::read("model.json")?)?;
//! let class = model.predict_class(&features);
//! ```

use crate::compat::{ConversionError, XgbModel};
use crate::forest::SoAForest;
use crate::objective::Objective;

// =============================================================================
// Model
// =============================================================================

/// A fitted gradient boosting classifier (inference-ready, immutable).
#[derive(Debug, Clone)]
pub struct Model {
    forest: SoAForest,
    objective: Objective,
    meta: ModelMeta,
}

impl Model {
    /// Create a new model.
    pub fn new(forest: SoAForest, objective: Objective, meta: ModelMeta) -> Self {
        Self {
            forest,
            objective,
            meta,
        }
    }

    /// Parse and convert an XGBoost JSON model document.
    pub fn from_xgboost_json(bytes: &[u8]) -> Result<Self, ConversionError> {
        XgbModel::from_slice(bytes)?.to_model()
    }

    /// Number of features expected by the model.
    #[inline]
    pub fn num_features(&self) -> usize {
        self.meta.num_features
    }

    /// Number of classes the model distinguishes.
    #[inline]
    pub fn num_classes(&self) -> usize {
        self.meta.num_classes
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    pub fn forest(&self) -> &SoAForest {
        &self.forest
    }

    /// Raw margins for one row (one per output group).
    pub fn predict_margins(&self, features: &[f32]) -> Vec<f32> {
        self.forest.predict_row(features)
    }

    /// Class index for one row, or `None` if the margins are not finite.
    pub fn predict_class(&self, features: &[f32]) -> Option<usize> {
        self.objective.class_index(&self.predict_margins(features))
    }
}

// =============================================================================
// Model Metadata
// =============================================================================

/// Model metadata.
#[derive(Debug, Clone)]
pub struct ModelMeta {
    /// Number of input features.
    pub num_features: usize,

    /// Number of classes.
    pub num_classes: usize,

    /// Column names recorded at fit time, when the fitter kept them.
    pub feature_names: Option<Vec<String>>,

    /// Where the model came from.
    pub source: ModelSource,
}

/// Where the model came from (for diagnostics).
#[derive(Debug, Clone, PartialEq)]
pub enum ModelSource {
    /// Loaded from XGBoost JSON format.
    XGBoostJson { version: [u32; 3] },

    /// Assembled in memory.
    Native,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trees::TreeBuilder;

    fn two_class_model() -> Model {
        let mut forest = SoAForest::new(2);
        for (group, (left, right)) in [(1.0, -1.0), (-1.0, 1.0)].into_iter().enumerate() {
            let mut b = TreeBuilder::new();
            b.add_split(0, 10.0, true, 1, 2);
            b.add_leaf(left);
            b.add_leaf(right);
            forest.push_tree(b.build(), group as u32);
        }
        let meta = ModelMeta {
            num_features: 1,
            num_classes: 2,
            feature_names: None,
            source: ModelSource::Native,
        };
        Model::new(forest, Objective::MultiSoftprob { num_class: 2 }, meta)
    }

    #[test]
    fn predict_class_follows_margins() {
        let model = two_class_model();
        assert_eq!(model.predict_margins(&[5.0]), vec![1.0, -1.0]);
        assert_eq!(model.predict_class(&[5.0]), Some(0));
        assert_eq!(model.predict_class(&[15.0]), Some(1));
    }

    #[test]
    fn missing_feature_takes_default_branch() {
        let model = two_class_model();
        assert_eq!(model.predict_class(&[f32::NAN]), Some(0));
    }

    #[test]
    fn rejects_non_json_bytes() {
        assert!(matches!(
            Model::from_xgboost_json(b"not json"),
            Err(ConversionError::Parse(_))
        ));
    }
}

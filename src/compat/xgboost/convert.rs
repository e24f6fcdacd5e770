//! Conversion from XGBoost JSON types to the native model.

use crate::forest::SoAForest;
use crate::model::{Model, ModelMeta, ModelSource};
use crate::objective::Objective;
use crate::trees::{SoATreeStorage, TreeBuilder};

use super::format::{self, GradientBooster, Tree, XgbModel};

/// Error type for XGBoost model conversion.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("model document is not valid XGBoost JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unsupported booster type: gblinear models are not supported for tree prediction")]
    UnsupportedBooster,
    #[error(
        "unsupported objective: only multi:softprob, multi:softmax, binary:logistic \
         and binary:logitraw can back a classifier"
    )]
    UnsupportedObjective,
    #[error("objective declares {objective} classes but learner params declare {learner}")]
    ClassCountMismatch { objective: i64, learner: i64 },
    #[error("model declares invalid feature count {0}")]
    InvalidFeatureCount(i64),
    #[error("model declares {declared} trees but contains {actual}")]
    TreeCountMismatch { declared: i64, actual: usize },
    #[error("tree_info has {actual} entries for {expected} trees")]
    TreeInfoLength { expected: usize, actual: usize },
    #[error("dart model has {actual} drop weights for {expected} trees")]
    DartWeightLength { expected: usize, actual: usize },
    #[error("tree {0} has no nodes")]
    EmptyTree(usize),
    #[error("tree {tree} field `{field}` has {actual} entries, expected {expected}")]
    MalformedTree {
        tree: usize,
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("tree {tree} is assigned to group {group} but the model has {num_groups} groups")]
    TreeGroupOutOfRange { tree: usize, group: i32, num_groups: u32 },
    #[error("invalid node index in tree {tree}: node {node} references child {child} but tree has {num_nodes} nodes")]
    InvalidNodeIndex {
        tree: usize,
        node: usize,
        child: i32,
        num_nodes: usize,
    },
    #[error("tree {tree} node {node} references child {child}, which does not come after it")]
    BackwardChild { tree: usize, node: usize, child: i32 },
    #[error("tree {tree} node {child} is referenced by more than one parent")]
    SharedChild { tree: usize, child: i32 },
    #[error("tree {tree} node {node} splits on feature {feature} but the model has {num_features} features")]
    FeatureIndexOutOfRange {
        tree: usize,
        node: usize,
        feature: i32,
        num_features: usize,
    },
    #[error("tree {tree} node {node} uses a categorical split; categorical features must be one-hot encoded")]
    CategoricalSplit { tree: usize, node: usize },
}

/// Convert base_score from probability space to margin space based on objective.
///
/// XGBoost stores base_score in probability space for logistic objectives; the
/// forest accumulates margins.
fn prob_to_margin(base_score: f32, objective: Objective) -> f32 {
    match objective {
        Objective::BinaryLogistic => {
            let p = base_score.clamp(1e-7, 1.0 - 1e-7);
            (p / (1.0 - p)).ln()
        }
        _ => base_score,
    }
}

fn convert_objective(model: &XgbModel) -> Result<Objective, ConversionError> {
    let learner_classes = model.learner.learner_model_param.num_class;
    let (num_class, multi) = match &model.learner.objective {
        format::Objective::MultiSoftprob {
            softmax_multiclass_param,
        }
        | format::Objective::MultiSoftmax {
            softmax_multiclass_param,
        } => (softmax_multiclass_param.num_class, true),
        format::Objective::BinaryLogistic => return Ok(Objective::BinaryLogistic),
        format::Objective::BinaryLogitRaw => return Ok(Objective::BinaryLogitRaw),
        format::Objective::Unsupported => return Err(ConversionError::UnsupportedObjective),
    };

    if multi && (num_class < 2 || num_class != learner_classes) {
        return Err(ConversionError::ClassCountMismatch {
            objective: num_class,
            learner: learner_classes,
        });
    }

    let num_class = num_class as u32;
    Ok(match model.learner.objective {
        format::Objective::MultiSoftmax { .. } => Objective::MultiSoftmax { num_class },
        _ => Objective::MultiSoftprob { num_class },
    })
}

impl XgbModel {
    /// Convert to a native [`Model`].
    ///
    /// Supports gbtree and dart boosters. Dart drop weights are folded into
    /// the leaf values so the forest predicts with plain summation.
    pub fn to_model(&self) -> Result<Model, ConversionError> {
        let (model_trees, tree_weights) = match &self.learner.gradient_booster {
            GradientBooster::Gbtree { model } => (model, None),
            GradientBooster::Dart {
                gbtree,
                weight_drop,
            } => (&gbtree.model, Some(weight_drop.as_slice())),
            GradientBooster::Gblinear { .. } => return Err(ConversionError::UnsupportedBooster),
        };

        let objective = convert_objective(self)?;
        let params = &self.learner.learner_model_param;
        if params.num_feature <= 0 {
            return Err(ConversionError::InvalidFeatureCount(params.num_feature));
        }
        let num_features = params.num_feature as usize;

        let num_trees = model_trees.trees.len();
        if model_trees.gbtree_model_param.num_trees != num_trees as i64 {
            return Err(ConversionError::TreeCountMismatch {
                declared: model_trees.gbtree_model_param.num_trees,
                actual: num_trees,
            });
        }
        if model_trees.tree_info.len() != num_trees {
            return Err(ConversionError::TreeInfoLength {
                expected: num_trees,
                actual: model_trees.tree_info.len(),
            });
        }
        if let Some(weights) = tree_weights {
            if weights.len() != num_trees {
                return Err(ConversionError::DartWeightLength {
                    expected: num_trees,
                    actual: weights.len(),
                });
            }
        }

        let num_groups = objective.num_groups();
        let base_score = prob_to_margin(params.base_score, objective);
        let mut forest =
            SoAForest::new(num_groups).with_base_score(vec![base_score; num_groups as usize]);

        for (tree_idx, xgb_tree) in model_trees.trees.iter().enumerate() {
            let group = model_trees.tree_info[tree_idx];
            if group < 0 || group as u32 >= num_groups {
                return Err(ConversionError::TreeGroupOutOfRange {
                    tree: tree_idx,
                    group,
                    num_groups,
                });
            }
            let weight = tree_weights.map_or(1.0, |w| w[tree_idx]);
            let native = convert_tree(xgb_tree, tree_idx, weight, num_features)?;
            forest.push_tree(native, group as u32);
        }

        let feature_names =
            (!self.learner.feature_names.is_empty()).then(|| self.learner.feature_names.clone());

        let meta = ModelMeta {
            num_features,
            num_classes: objective.num_classes() as usize,
            feature_names,
            source: ModelSource::XGBoostJson {
                version: self.version,
            },
        };
        Ok(Model::new(forest, objective, meta))
    }
}

fn check_len(
    tree: usize,
    field: &'static str,
    expected: usize,
    actual: usize,
) -> Result<(), ConversionError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ConversionError::MalformedTree {
            tree,
            field,
            expected,
            actual,
        })
    }
}

/// Convert a single XGBoost tree to native storage.
fn convert_tree(
    xgb_tree: &Tree,
    tree_idx: usize,
    weight: f32,
    num_features: usize,
) -> Result<SoATreeStorage, ConversionError> {
    let num_nodes = xgb_tree.tree_param.num_nodes.max(0) as usize;
    if num_nodes == 0 {
        return Err(ConversionError::EmptyTree(tree_idx));
    }
    check_len(tree_idx, "left_children", num_nodes, xgb_tree.left_children.len())?;
    check_len(tree_idx, "right_children", num_nodes, xgb_tree.right_children.len())?;
    check_len(tree_idx, "split_indices", num_nodes, xgb_tree.split_indices.len())?;
    check_len(tree_idx, "split_conditions", num_nodes, xgb_tree.split_conditions.len())?;
    check_len(tree_idx, "default_left", num_nodes, xgb_tree.default_left.len())?;

    let mut builder = TreeBuilder::new();
    let mut has_parent = vec![false; num_nodes];

    // XGBoost stores nodes with the root at index 0 and children referenced by
    // index, which matches the builder layout one to one.
    for node_idx in 0..num_nodes {
        let left_child = xgb_tree.left_children[node_idx];
        let right_child = xgb_tree.right_children[node_idx];

        // A node is a leaf if left_child == -1 (XGBoost convention)
        if left_child == -1 {
            builder.add_leaf(xgb_tree.split_conditions[node_idx] * weight);
            continue;
        }

        for child in [left_child, right_child] {
            if child <= 0 || child as usize >= num_nodes {
                return Err(ConversionError::InvalidNodeIndex {
                    tree: tree_idx,
                    node: node_idx,
                    child,
                    num_nodes,
                });
            }
            // Children always follow their parent, so traversal cannot revisit a node.
            if child as usize <= node_idx {
                return Err(ConversionError::BackwardChild {
                    tree: tree_idx,
                    node: node_idx,
                    child,
                });
            }
            if std::mem::replace(&mut has_parent[child as usize], true) {
                return Err(ConversionError::SharedChild {
                    tree: tree_idx,
                    child,
                });
            }
        }
        if xgb_tree.split_type.get(node_idx).copied().unwrap_or(0) != 0 {
            return Err(ConversionError::CategoricalSplit {
                tree: tree_idx,
                node: node_idx,
            });
        }
        let feature = xgb_tree.split_indices[node_idx];
        if feature < 0 || feature as usize >= num_features {
            return Err(ConversionError::FeatureIndexOutOfRange {
                tree: tree_idx,
                node: node_idx,
                feature,
                num_features,
            });
        }

        builder.add_split(
            feature as u32,
            xgb_tree.split_conditions[node_idx],
            xgb_tree.default_left[node_idx] != 0,
            left_child as u32,
            right_child as u32,
        );
    }

    Ok(builder.build())
}

//! Serde types for XGBoost's JSON model format (`Booster.save_model("model.json")`).
//!
//! Only the parts needed to rebuild a tree ensemble for classification are
//! modelled; everything else in the document is ignored.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use serde_with::{serde_as, DisplayFromStr};

// --- Custom deserializers for XGBoost-specific formats ------------------------------

/// Deserialize base_score which can be:
/// - A single number: 0.5
/// - A stringified number: "5E-1"
/// - A bracketed string (XGBoost >= 3.0): "[5E-1]"
/// - An array: [0.5]
///
/// Vector base scores collapse to their first element.
fn deserialize_base_score<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as SerdeError;

    let mut cur = Value::deserialize(deserializer)?;
    loop {
        match cur {
            Value::Number(n) => {
                return n
                    .as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| SerdeError::custom("invalid number"));
            }
            Value::String(s) => {
                let t = s.trim();
                if let Ok(f) = t.parse::<f32>() {
                    return Ok(f);
                }
                if let Some(inner) = t.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
                    let first = inner.split(',').next().unwrap_or_default().trim();
                    if let Ok(f) = first.parse::<f32>() {
                        return Ok(f);
                    }
                }
                return Err(SerdeError::custom(format!(
                    "cannot parse base_score from string: {s}"
                )));
            }
            Value::Array(arr) => match arr.into_iter().next() {
                Some(first) => cur = first,
                None => return Err(SerdeError::custom("empty base_score array")),
            },
            _ => {
                return Err(SerdeError::custom(
                    "base_score must be number, string, or array",
                ));
            }
        }
    }
}

fn default_num_target() -> i64 {
    1
}

fn default_num_class() -> i64 {
    1
}

// --- Tree / model level definitions -------------------------------------------------

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeParam {
    #[serde_as(as = "DisplayFromStr")]
    pub num_nodes: i64,
    #[serde_as(as = "DisplayFromStr")]
    pub num_feature: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    pub tree_param: TreeParam,
    #[serde(default)]
    pub id: i32,
    pub left_children: Vec<i32>,
    pub right_children: Vec<i32>,
    pub split_indices: Vec<i32>,
    /// Split threshold for internal nodes, leaf value for leaves.
    pub split_conditions: Vec<f32>,
    pub default_left: Vec<i32>,
    /// 0 = numerical split, 1 = categorical split.
    #[serde(default)]
    pub split_type: Vec<i32>,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GBTreeModelParam {
    #[serde_as(as = "DisplayFromStr")]
    pub num_trees: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelTrees {
    pub trees: Vec<Tree>,
    /// Output group of each tree.
    pub tree_info: Vec<i32>,
    pub gbtree_model_param: GBTreeModelParam,
}

// --- Gradient booster variants (gbtree | gblinear | dart) ---------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GBTreeDefinition {
    pub model: ModelTrees,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum GradientBooster {
    Gbtree {
        model: ModelTrees,
    },
    Gblinear {
        #[serde(default)]
        model: Value,
    },
    Dart {
        gbtree: GBTreeDefinition,
        weight_drop: Vec<f32>,
    },
}

// --- Objective / learner-level definitions ---------------------------------------

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftmaxMulticlassParam {
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default = "default_num_class")]
    pub num_class: i64,
}

impl Default for SoftmaxMulticlassParam {
    fn default() -> Self {
        Self { num_class: 1 }
    }
}

/// Training objective. Only classification objectives can back a species model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum Objective {
    #[serde(rename = "multi:softprob")]
    MultiSoftprob {
        #[serde(default)]
        softmax_multiclass_param: SoftmaxMulticlassParam,
    },
    #[serde(rename = "multi:softmax")]
    MultiSoftmax {
        #[serde(default)]
        softmax_multiclass_param: SoftmaxMulticlassParam,
    },
    #[serde(rename = "binary:logistic")]
    BinaryLogistic,
    #[serde(rename = "binary:logitraw")]
    BinaryLogitRaw,
    #[serde(other)]
    Unsupported,
}

impl Objective {
    /// XGBoost name of the objective.
    pub fn name(&self) -> &'static str {
        match self {
            Objective::MultiSoftprob { .. } => "multi:softprob",
            Objective::MultiSoftmax { .. } => "multi:softmax",
            Objective::BinaryLogistic => "binary:logistic",
            Objective::BinaryLogitRaw => "binary:logitraw",
            Objective::Unsupported => "unsupported",
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerModelParam {
    #[serde(deserialize_with = "deserialize_base_score")]
    pub base_score: f32,
    #[serde_as(as = "DisplayFromStr")]
    pub num_class: i64,
    #[serde_as(as = "DisplayFromStr")]
    pub num_feature: i64,
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default = "default_num_target")]
    pub num_target: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Learner {
    /// Column names seen at fit time (present when fitted on a DataFrame).
    #[serde(default)]
    pub feature_names: Vec<String>,
    pub gradient_booster: GradientBooster,
    pub objective: Objective,
    pub learner_model_param: LearnerModelParam,
}

// --- Top-level model -------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XgbModel {
    pub version: [u32; 3],
    pub learner: Learner,
}

impl XgbModel {
    /// Parse a model document from raw JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn base_score_parses_number_string_array_and_bracketed() {
        for raw in [json!(0.5), json!("5E-1"), json!([0.5]), json!("[5E-1]")] {
            let v = json!({"base_score": raw, "num_class": "3", "num_feature": "10"});
            let p: LearnerModelParam = serde_json::from_value(v).unwrap();
            assert_eq!(p.base_score, 0.5);
            assert_eq!(p.num_target, 1);
        }
    }

    #[test]
    fn base_score_rejects_garbage() {
        let v = json!({"base_score": "half", "num_class": "3", "num_feature": "10"});
        assert!(serde_json::from_value::<LearnerModelParam>(v).is_err());
    }

    #[test]
    fn objective_names_round_trip() {
        let o: Objective = serde_json::from_value(json!({
            "name": "multi:softprob",
            "softmax_multiclass_param": {"num_class": "3"}
        }))
        .unwrap();
        match o {
            Objective::MultiSoftprob {
                softmax_multiclass_param,
            } => assert_eq!(softmax_multiclass_param.num_class, 3),
            other => panic!("unexpected objective {other:?}"),
        }

        let o: Objective = serde_json::from_value(json!({"name": "binary:logistic"})).unwrap();
        assert_eq!(o.name(), "binary:logistic");
    }

    #[test]
    fn regression_objectives_are_unsupported() {
        let o: Objective = serde_json::from_value(json!({
            "name": "reg:squarederror",
            "reg_loss_param": {"scale_pos_weight": "1"}
        }))
        .unwrap();
        assert!(matches!(o, Objective::Unsupported));
    }
}

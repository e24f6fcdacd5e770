//! Classification objectives and margin interpretation.
//!
//! The [`Objective`] decides how the forest's raw margins turn into a class
//! index and class probabilities.

/// Classification objective the ensemble was fitted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    /// Binary logistic (sigmoid transform). One margin, two classes.
    BinaryLogistic,

    /// Binary logit raw (margins are logits). One margin, two classes.
    BinaryLogitRaw,

    /// Multiclass softmax (class index output).
    MultiSoftmax { num_class: u32 },

    /// Multiclass softprob (probability output).
    MultiSoftprob { num_class: u32 },
}

impl Objective {
    /// Number of margins the forest produces per row.
    pub fn num_groups(&self) -> u32 {
        match self {
            Objective::BinaryLogistic | Objective::BinaryLogitRaw => 1,
            Objective::MultiSoftmax { num_class } | Objective::MultiSoftprob { num_class } => {
                *num_class
            }
        }
    }

    /// Number of distinct class indices the model can emit.
    pub fn num_classes(&self) -> u32 {
        match self {
            Objective::BinaryLogistic | Objective::BinaryLogitRaw => 2,
            Objective::MultiSoftmax { num_class } | Objective::MultiSoftprob { num_class } => {
                *num_class
            }
        }
    }

    /// Pick the class index for one row of margins.
    ///
    /// Returns `None` when any margin is not finite.
    pub fn class_index(&self, margins: &[f32]) -> Option<usize> {
        if margins.is_empty() || margins.iter().any(|m| !m.is_finite()) {
            return None;
        }
        match self {
            // sigmoid(m) > 0.5 <=> m > 0
            Objective::BinaryLogistic | Objective::BinaryLogitRaw => {
                Some(usize::from(margins[0] > 0.0))
            }
            // softmax is monotone, so the largest margin wins
            Objective::MultiSoftmax { .. } | Objective::MultiSoftprob { .. } => {
                Some(argmax(margins))
            }
        }
    }

    /// Class probabilities for one row of margins (one entry per class).
    pub fn probabilities(&self, margins: &[f32]) -> Vec<f32> {
        match self {
            Objective::BinaryLogistic | Objective::BinaryLogitRaw => {
                let p = sigmoid(margins.first().copied().unwrap_or(0.0));
                vec![1.0 - p, p]
            }
            Objective::MultiSoftmax { .. } | Objective::MultiSoftprob { .. } => {
                let mut values = margins.to_vec();
                softmax_inplace(&mut values);
                values
            }
        }
    }
}

// =============================================================================
// Transform functions
// =============================================================================

/// Sigmoid function: 1 / (1 + exp(-x))
#[inline]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Softmax in-place over a slice.
pub fn softmax_inplace(values: &mut [f32]) {
    if values.is_empty() {
        return;
    }

    // Subtract the max for numerical stability
    let max_val = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);

    let mut sum = 0.0f32;
    for val in values.iter_mut() {
        *val = (*val - max_val).exp();
        sum += *val;
    }

    if sum > 0.0 {
        for val in values.iter_mut() {
            *val /= sum;
        }
    }
}

/// Argmax: index of the maximum value. Ties resolve to the lowest index,
/// matching XGBoost's `multi:softmax` output.
pub fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (idx, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = idx;
        }
    }
    best
}

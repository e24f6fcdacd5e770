//! Split conditions for decision nodes.

/// Numeric split on a single feature column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitCondition {
    /// Feature column index to split on
    pub feature_index: u32,
    /// Threshold value (go left if feature < threshold)
    pub threshold: f32,
    /// Direction for missing values (true = left, false = right)
    pub default_left: bool,
}

impl SplitCondition {
    pub fn new(feature_index: u32, threshold: f32, default_left: bool) -> Self {
        Self {
            feature_index,
            threshold,
            default_left,
        }
    }

    /// Evaluate which direction to go for a feature value.
    /// Returns true for left, false for right.
    #[inline]
    pub fn go_left(&self, feature_value: f32) -> bool {
        if feature_value.is_nan() {
            self.default_left
        } else {
            feature_value < self.threshold
        }
    }
}

//! Structure-of-Arrays forest implementation.

use crate::trees::SoATreeStorage;

/// Structure-of-Arrays forest for inference.
///
/// Stores multiple trees with their output group assignments. For a K-class
/// model every tree contributes to exactly one class margin.
#[derive(Debug, Clone)]
pub struct SoAForest {
    /// Individual tree storage
    trees: Vec<SoATreeStorage>,
    /// Which output group each tree belongs to
    tree_groups: Vec<u32>,
    /// Number of output groups (1 for binary, K for K-class)
    num_groups: u32,
    /// Base score per group (added to every margin)
    base_score: Vec<f32>,
}

impl SoAForest {
    /// Create a new forest with the given number of groups.
    pub fn new(num_groups: u32) -> Self {
        Self {
            trees: Vec::new(),
            tree_groups: Vec::new(),
            num_groups,
            base_score: vec![0.0; num_groups as usize],
        }
    }

    /// Set the base score for all groups.
    pub fn with_base_score(mut self, base_score: Vec<f32>) -> Self {
        debug_assert_eq!(base_score.len(), self.num_groups as usize);
        self.base_score = base_score;
        self
    }

    /// Add a tree to the forest.
    pub fn push_tree(&mut self, tree: SoATreeStorage, group: u32) {
        debug_assert!(group < self.num_groups, "group out of range");
        self.trees.push(tree);
        self.tree_groups.push(group);
    }

    /// Number of trees in the forest.
    #[inline]
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Number of output groups.
    #[inline]
    pub fn num_groups(&self) -> u32 {
        self.num_groups
    }

    /// Get the base score for each group.
    #[inline]
    pub fn base_score(&self) -> &[f32] {
        &self.base_score
    }

    /// Iterate over trees with their group assignments.
    pub fn trees_with_groups(&self) -> impl Iterator<Item = (&SoATreeStorage, u32)> {
        self.trees.iter().zip(self.tree_groups.iter().copied())
    }

    /// Predict raw margins for a single row of features.
    ///
    /// Returns one value per output group.
    pub fn predict_row(&self, features: &[f32]) -> Vec<f32> {
        let mut output = self.base_score.clone();
        for (tree, group) in self.trees_with_groups() {
            output[group as usize] += tree.predict_row(features);
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trees::TreeBuilder;
    use approx::assert_abs_diff_eq;

    ///        [0] feat0 < threshold
    ///        /          \
    ///    [1] left       [2] right
    fn stump(feature: u32, threshold: f32, left: f32, right: f32) -> SoATreeStorage {
        let mut builder = TreeBuilder::new();
        builder.add_split(feature, threshold, true, 1, 2);
        builder.add_leaf(left);
        builder.add_leaf(right);
        builder.build()
    }

    #[test]
    fn trees_sum_into_their_group() {
        let mut forest = SoAForest::new(3);
        forest.push_tree(stump(0, 0.5, 0.1, 0.9), 0);
        forest.push_tree(stump(0, 0.5, 0.2, 0.8), 1);
        forest.push_tree(stump(0, 0.5, 0.3, 0.7), 2);
        forest.push_tree(stump(1, 0.5, 1.0, -1.0), 0);

        let pred = forest.predict_row(&[0.3, 0.0]);
        assert_abs_diff_eq!(pred[0], 1.1, epsilon = 1e-6);
        assert_abs_diff_eq!(pred[1], 0.2, epsilon = 1e-6);
        assert_abs_diff_eq!(pred[2], 0.3, epsilon = 1e-6);

        let pred = forest.predict_row(&[0.7, 1.0]);
        assert_abs_diff_eq!(pred[0], -0.1, epsilon = 1e-6);
        assert_abs_diff_eq!(pred[1], 0.8, epsilon = 1e-6);
    }

    #[test]
    fn base_score_is_added_per_group() {
        let mut forest = SoAForest::new(2).with_base_score(vec![0.5, -0.5]);
        forest.push_tree(stump(0, 0.5, 1.0, 2.0), 0);

        assert_eq!(forest.predict_row(&[0.3]), vec![1.5, -0.5]);
    }
}

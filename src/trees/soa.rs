//! Structure-of-Arrays tree storage implementation.

use super::node::SplitCondition;

/// Structure-of-Arrays tree storage for inference.
///
/// Stores tree nodes in flat arrays for cache-friendly traversal.
/// Child indices are local to this tree (0 = root).
#[derive(Debug, Clone)]
pub struct SoATreeStorage {
    /// Split feature index per node
    split_indices: Box<[u32]>,
    /// Split threshold per node
    split_thresholds: Box<[f32]>,
    /// Left child index per node (only valid for non-leaf nodes)
    left_children: Box<[u32]>,
    /// Right child index per node (only valid for non-leaf nodes)
    right_children: Box<[u32]>,
    /// Default direction for missing values (true = left)
    default_left: Box<[bool]>,
    /// Whether each node is a leaf
    is_leaf: Box<[bool]>,
    /// Leaf values (indexed by node index, only valid for leaf nodes)
    leaf_values: Box<[f32]>,
}

impl SoATreeStorage {
    /// Number of nodes in this tree.
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    /// Check if a node is a leaf.
    #[inline]
    pub fn is_leaf(&self, node_idx: u32) -> bool {
        self.is_leaf[node_idx as usize]
    }

    /// Split condition of an internal node.
    #[inline]
    pub fn split(&self, node_idx: u32) -> SplitCondition {
        let i = node_idx as usize;
        SplitCondition::new(
            self.split_indices[i],
            self.split_thresholds[i],
            self.default_left[i],
        )
    }

    /// Get left child index.
    #[inline]
    pub fn left_child(&self, node_idx: u32) -> u32 {
        self.left_children[node_idx as usize]
    }

    /// Get right child index.
    #[inline]
    pub fn right_child(&self, node_idx: u32) -> u32 {
        self.right_children[node_idx as usize]
    }

    /// Get leaf value for a node.
    #[inline]
    pub fn leaf_value(&self, node_idx: u32) -> f32 {
        self.leaf_values[node_idx as usize]
    }

    /// Traverse the tree to find the leaf value for given features.
    ///
    /// Features past the end of the slice are treated as missing.
    pub fn predict_row(&self, features: &[f32]) -> f32 {
        let mut idx = 0u32;

        while !self.is_leaf(idx) {
            let split = self.split(idx);
            let fvalue = features
                .get(split.feature_index as usize)
                .copied()
                .unwrap_or(f32::NAN);

            idx = if split.go_left(fvalue) {
                self.left_child(idx)
            } else {
                self.right_child(idx)
            };
        }

        self.leaf_value(idx)
    }
}

/// Builder for constructing [`SoATreeStorage`] node by node (BFS order, root first).
#[derive(Debug, Default)]
pub struct TreeBuilder {
    split_indices: Vec<u32>,
    split_thresholds: Vec<f32>,
    left_children: Vec<u32>,
    right_children: Vec<u32>,
    default_left: Vec<bool>,
    is_leaf: Vec<bool>,
    leaf_values: Vec<f32>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a split node. Returns the node index.
    pub fn add_split(
        &mut self,
        feature_index: u32,
        threshold: f32,
        default_left: bool,
        left_child: u32,
        right_child: u32,
    ) -> u32 {
        let idx = self.is_leaf.len() as u32;
        self.split_indices.push(feature_index);
        self.split_thresholds.push(threshold);
        self.left_children.push(left_child);
        self.right_children.push(right_child);
        self.default_left.push(default_left);
        self.is_leaf.push(false);
        self.leaf_values.push(0.0);
        idx
    }

    /// Add a leaf node. Returns the node index.
    pub fn add_leaf(&mut self, value: f32) -> u32 {
        let idx = self.is_leaf.len() as u32;
        self.split_indices.push(0);
        self.split_thresholds.push(0.0);
        self.left_children.push(0);
        self.right_children.push(0);
        self.default_left.push(false);
        self.is_leaf.push(true);
        self.leaf_values.push(value);
        idx
    }

    /// Build the tree storage.
    ///
    /// Child indices must already have been validated by the caller.
    pub fn build(self) -> SoATreeStorage {
        SoATreeStorage {
            split_indices: self.split_indices.into_boxed_slice(),
            split_thresholds: self.split_thresholds.into_boxed_slice(),
            left_children: self.left_children.into_boxed_slice(),
            right_children: self.right_children.into_boxed_slice(),
            default_left: self.default_left.into_boxed_slice(),
            is_leaf: self.is_leaf.into_boxed_slice(),
            leaf_values: self.leaf_values.into_boxed_slice(),
        }
    }
}

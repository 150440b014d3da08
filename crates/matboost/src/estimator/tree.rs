//! Regression trees produced by the grower.

use ndarray::ArrayView1;

/// Type alias for tree node indices.
pub type NodeId = u32;

/// Sentinel value for "no child" (leaf nodes).
pub const NO_CHILD: NodeId = u32::MAX;

/// A single tree node.
///
/// Uses struct layout (not enum) for fixed-size nodes. The `is_leaf` flag
/// distinguishes split vs leaf nodes.
#[derive(Clone, Debug, PartialEq)]
pub struct TreeNode {
    // Split information (only valid when is_leaf=false)
    /// Feature index for split.
    pub feature: u32,
    /// Last bin that goes left during training.
    pub split_bin: u32,
    /// Raw-value threshold: `value < threshold` goes left.
    pub threshold: f64,
    /// Direction for missing values.
    pub default_left: bool,
    pub left: NodeId,
    pub right: NodeId,

    // Leaf information (only valid when is_leaf=true)
    pub value: f64,

    pub is_leaf: bool,
}

impl Default for TreeNode {
    fn default() -> Self {
        Self {
            feature: 0,
            split_bin: 0,
            threshold: f64::INFINITY,
            default_left: false,
            left: NO_CHILD,
            right: NO_CHILD,
            value: 0.0,
            is_leaf: true,
        }
    }
}

impl TreeNode {
    #[inline]
    pub fn leaf(value: f64) -> Self {
        Self { is_leaf: true, value, ..Default::default() }
    }

    #[inline]
    pub fn split(feature: u32, split_bin: u32, threshold: f64, default_left: bool) -> Self {
        Self {
            feature,
            split_bin,
            threshold,
            default_left,
            is_leaf: false,
            ..Default::default()
        }
    }
}

/// A trained decision tree. Root is at index 0.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tree {
    pub(crate) nodes: Vec<TreeNode>,
}

impl Tree {
    pub(crate) fn new(nodes: Vec<TreeNode>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf).count()
    }

    /// Depth of the deepest leaf (a single leaf has depth 0).
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], id: NodeId) -> usize {
            let node = &nodes[id as usize];
            if node.is_leaf {
                0
            } else {
                1 + walk(nodes, node.left).max(walk(nodes, node.right))
            }
        }
        if self.nodes.is_empty() { 0 } else { walk(&self.nodes, 0) }
    }

    /// Multiply every leaf value by `factor`.
    pub fn scale_leaves(&mut self, factor: f64) {
        for node in self.nodes.iter_mut().filter(|n| n.is_leaf) {
            node.value *= factor;
        }
    }

    /// Leaf value reached by a feature row.
    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        if self.nodes.is_empty() {
            return 0.0;
        }
        let mut node = &self.nodes[0];
        while !node.is_leaf {
            let value = row[node.feature as usize];
            let go_left = if value.is_nan() { node.default_left } else { value < node.threshold };
            node = &self.nodes[if go_left { node.left } else { node.right } as usize];
        }
        node.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn stump() -> Tree {
        let mut root = TreeNode::split(1, 0, 0.5, true);
        root.left = 1;
        root.right = 2;
        Tree::new(vec![root, TreeNode::leaf(-1.0), TreeNode::leaf(2.0)])
    }

    #[test]
    fn routes_by_threshold_and_missing() {
        let tree = stump();
        assert_eq!(tree.predict_row(array![9.0, 0.2].view()), -1.0);
        assert_eq!(tree.predict_row(array![9.0, 0.5].view()), 2.0);
        assert_eq!(tree.predict_row(array![9.0, f64::NAN].view()), -1.0);
    }

    #[test]
    fn shape_and_scaling() {
        let mut tree = stump();
        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.depth(), 1);
        tree.scale_leaves(0.5);
        assert_eq!(tree.predict_row(array![0.0, 1.0].view()), 1.0);
        assert_eq!(Tree::new(vec![TreeNode::leaf(3.0)]).depth(), 0);
    }
}

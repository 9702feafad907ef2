use std::collections::BTreeSet;

use nalgebra::DMatrix;

use crate::data::dataset::{RealNumber, WholeNumber};

/// Node of a randomized tree.
///
/// Split nodes own both children. At a `Task` node, samples whose task is in
/// `left_tasks` go left; every other sample goes right, including samples with
/// a task never seen at this node and samples queried without a task.
#[derive(Clone, Debug, PartialEq)]
pub enum TreeNode<XT: RealNumber, YT: WholeNumber> {
    Leaf {
        /// Index of `value` in the forest's sorted class list.
        class_index: usize,
        value: YT,
        /// Training samples per class that reached this leaf.
        class_counts: Vec<usize>,
    },
    Threshold {
        feature_index: usize,
        threshold: XT,
        left: Box<TreeNode<XT, YT>>,
        right: Box<TreeNode<XT, YT>>,
    },
    Task {
        left_tasks: BTreeSet<usize>,
        right_tasks: BTreeSet<usize>,
        left: Box<TreeNode<XT, YT>>,
        right: Box<TreeNode<XT, YT>>,
    },
}

/// Index of the largest count; the first one wins ties.
pub fn majority_index(counts: &[usize]) -> usize {
    let mut best = 0;
    for (index, &count) in counts.iter().enumerate() {
        if count > counts[best] {
            best = index;
        }
    }
    best
}

impl<XT: RealNumber, YT: WholeNumber> TreeNode<XT, YT> {
    /// Builds a leaf voting for the most frequent class, ties going to the smallest class.
    pub fn leaf(class_counts: Vec<usize>, classes: &[YT]) -> Self {
        let class_index = majority_index(&class_counts);
        Self::Leaf {
            class_index,
            value: classes[class_index],
            class_counts,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf { .. })
    }

    /// Walks `row` of `features` down to its leaf.
    pub fn find_leaf(&self, features: &DMatrix<XT>, row: usize, task: Option<usize>) -> &Self {
        let mut node = self;
        loop {
            node = match node {
                Self::Leaf { .. } => return node,
                Self::Threshold {
                    feature_index,
                    threshold,
                    left,
                    right,
                } => {
                    if features[(row, *feature_index)] < *threshold {
                        left.as_ref()
                    } else {
                        right.as_ref()
                    }
                }
                Self::Task {
                    left_tasks,
                    left,
                    right,
                    ..
                } => {
                    if task.is_some_and(|task| left_tasks.contains(&task)) {
                        left.as_ref()
                    } else {
                        right.as_ref()
                    }
                }
            };
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            Self::Leaf { .. } => 0,
            Self::Threshold { left, right, .. } | Self::Task { left, right, .. } => {
                1 + left.depth().max(right.depth())
            }
        }
    }

    pub fn num_nodes(&self) -> usize {
        match self {
            Self::Leaf { .. } => 1,
            Self::Threshold { left, right, .. } | Self::Task { left, right, .. } => {
                1 + left.num_nodes() + right.num_nodes()
            }
        }
    }

    pub fn num_leaves(&self) -> usize {
        match self {
            Self::Leaf { .. } => 1,
            Self::Threshold { left, right, .. } | Self::Task { left, right, .. } => {
                left.num_leaves() + right.num_leaves()
            }
        }
    }

    pub fn has_task_split(&self) -> bool {
        match self {
            Self::Leaf { .. } => false,
            Self::Task { .. } => true,
            Self::Threshold { left, right, .. } => left.has_task_split() || right.has_task_split(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(class_index: usize) -> Box<TreeNode<f64, u8>> {
        let mut counts = vec![0, 0];
        counts[class_index] = 3;
        Box::new(TreeNode::leaf(counts, &[0, 1]))
    }

    fn task_node() -> TreeNode<f64, u8> {
        TreeNode::Task {
            left_tasks: BTreeSet::from([0, 3]),
            right_tasks: BTreeSet::from([1, 2]),
            left: leaf(0),
            right: leaf(1),
        }
    }

    #[test]
    fn test_leaf_majority_with_tie_to_smallest_class() {
        let node: TreeNode<f64, u8> = TreeNode::leaf(vec![2, 5, 5], &[3, 7, 9]);
        assert!(matches!(node, TreeNode::Leaf { value: 7, class_index: 1, .. }));

        let node: TreeNode<f64, u8> = TreeNode::leaf(vec![4, 4], &[3, 7]);
        assert!(matches!(node, TreeNode::Leaf { value: 3, class_index: 0, .. }));
    }

    #[test]
    fn test_majority_index() {
        assert_eq!(majority_index(&[1, 3, 3, 2]), 1);
        assert_eq!(majority_index(&[0, 0]), 0);
        assert_eq!(majority_index(&[]), 0);
    }

    #[test]
    fn test_threshold_routing() {
        let node = TreeNode::Threshold {
            feature_index: 1,
            threshold: 0.5,
            left: leaf(0),
            right: leaf(1),
        };
        let x = DMatrix::from_row_slice(3, 2, &[9.0, 0.2, 9.0, 0.5, 9.0, 0.7]);
        assert!(matches!(node.find_leaf(&x, 0, None), TreeNode::Leaf { value: 0, .. }));
        assert!(matches!(node.find_leaf(&x, 1, None), TreeNode::Leaf { value: 1, .. }));
        assert!(matches!(node.find_leaf(&x, 2, None), TreeNode::Leaf { value: 1, .. }));
    }

    #[test]
    fn test_task_routing() {
        let node = task_node();
        let x = DMatrix::from_row_slice(1, 1, &[0.0]);
        assert!(matches!(node.find_leaf(&x, 0, Some(3)), TreeNode::Leaf { value: 0, .. }));
        assert!(matches!(node.find_leaf(&x, 0, Some(2)), TreeNode::Leaf { value: 1, .. }));
    }

    #[test]
    fn test_task_routing_without_known_task_goes_right() {
        let node = task_node();
        let x = DMatrix::from_row_slice(1, 1, &[0.0]);
        assert!(matches!(node.find_leaf(&x, 0, Some(42)), TreeNode::Leaf { value: 1, .. }));
        assert!(matches!(node.find_leaf(&x, 0, None), TreeNode::Leaf { value: 1, .. }));
    }

    #[test]
    fn test_structure_queries() {
        let node = TreeNode::Threshold {
            feature_index: 0,
            threshold: 1.0,
            left: Box::new(task_node()),
            right: leaf(1),
        };
        assert_eq!(node.depth(), 2);
        assert_eq!(node.num_nodes(), 5);
        assert_eq!(node.num_leaves(), 3);
        assert!(node.has_task_split());
        assert!(!leaf(0).has_task_split());
    }
}

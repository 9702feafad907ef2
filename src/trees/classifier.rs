//! Extremely randomized tree classifier
use nalgebra::{DMatrix, DVector};
use rand::Rng;

use super::node::TreeNode;
use super::params::ResolvedTreeParams;
use super::split::{SplitEvaluator, SplitRule, TrainingSet};
use crate::data::dataset::{RealNumber, WholeNumber};

/// One tree of an Extra-Trees forest.
///
/// The tree keeps only its node graph; the training data is borrowed while it grows.
#[derive(Clone, Debug, PartialEq)]
pub struct ExtraTreeClassifier<XT: RealNumber, YT: WholeNumber> {
    root: TreeNode<XT, YT>,
}

impl<XT: RealNumber, YT: WholeNumber> ExtraTreeClassifier<XT, YT> {
    /// Grows a tree over the rows `ids` of `train`.
    ///
    /// # Arguments
    ///
    /// * `train` - Training view shared by the forest.
    /// * `classes` - Label value of every class index in `train.labels`, sorted so
    ///   that vote ties resolve to the smallest label.
    /// * `params` - Resolved nmin, K and task-cut probability.
    /// * `ids` - Rows this tree learns from.
    /// * `rng` - Generator driving every random draw of the tree.
    ///
    /// # Returns
    ///
    /// The grown tree; a single leaf if no node could be split.
    pub fn fit<R: Rng + ?Sized>(
        train: &TrainingSet<XT>,
        classes: &[YT],
        params: &ResolvedTreeParams,
        ids: Vec<usize>,
        rng: &mut R,
    ) -> Self {
        let evaluator = SplitEvaluator::new(train, params);
        let root = Self::build_tree(train, classes, params, &evaluator, ids, rng);
        Self { root }
    }

    pub fn root(&self) -> &TreeNode<XT, YT> {
        &self.root
    }

    fn build_tree<R: Rng + ?Sized>(
        train: &TrainingSet<XT>,
        classes: &[YT],
        params: &ResolvedTreeParams,
        evaluator: &SplitEvaluator<XT>,
        ids: Vec<usize>,
        rng: &mut R,
    ) -> TreeNode<XT, YT> {
        let class_counts = train.class_counts(&ids);
        let is_pure = class_counts.iter().filter(|&&count| count > 0).count() <= 1;
        if ids.len() <= params.min_samples_leaf || is_pure {
            return TreeNode::leaf(class_counts, classes);
        }

        let Some(best_split) = evaluator.find_split(&ids, &class_counts, rng) else {
            return TreeNode::leaf(class_counts, classes);
        };

        let (left_ids, right_ids) = best_split.rule.partition(train, &ids);
        debug_assert_eq!(left_ids.len() + right_ids.len(), ids.len());
        if left_ids.is_empty() || right_ids.is_empty() {
            return TreeNode::leaf(class_counts, classes);
        }
        drop(ids);

        let left = Box::new(Self::build_tree(train, classes, params, evaluator, left_ids, rng));
        let right = Box::new(Self::build_tree(train, classes, params, evaluator, right_ids, rng));
        match best_split.rule {
            SplitRule::Threshold {
                feature_index,
                threshold,
            } => TreeNode::Threshold {
                feature_index,
                threshold,
                left,
                right,
            },
            SplitRule::Task {
                left_tasks,
                right_tasks,
            } => TreeNode::Task {
                left_tasks,
                right_tasks,
                left,
                right,
            },
        }
    }

    /// Leaf reached by `row` of `features`.
    pub fn leaf_for(
        &self,
        features: &DMatrix<XT>,
        row: usize,
        task: Option<usize>,
    ) -> &TreeNode<XT, YT> {
        self.root.find_leaf(features, row, task)
    }

    /// Class value predicted for `row` of `features`.
    pub fn predict_row(&self, features: &DMatrix<XT>, row: usize, task: Option<usize>) -> YT {
        match self.leaf_for(features, row, task) {
            TreeNode::Leaf { value, .. } => *value,
            _ => unreachable!("find_leaf always stops at a leaf"),
        }
    }

    /// Predicts every row of `features`, using `tasks[i]` at task splits when given.
    pub fn predict(&self, features: &DMatrix<XT>, tasks: Option<&DVector<usize>>) -> DVector<YT> {
        DVector::from_iterator(
            features.nrows(),
            (0..features.nrows()).map(|row| self.predict_row(features, row, tasks.map(|t| t[row]))),
        )
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    pub fn num_nodes(&self) -> usize {
        self.root.num_nodes()
    }

    pub fn num_leaves(&self) -> usize {
        self.root.num_leaves()
    }

    pub fn has_task_split(&self) -> bool {
        self.root.has_task_split()
    }
}

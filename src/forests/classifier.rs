//! Multi-task Extra-Trees classifier
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use nalgebra::{DMatrix, DVector};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, warn};

use super::params::ForestParams;
use crate::data::dataset::{Dataset, RealNumber, WholeNumber};
use crate::error::ForestError;
use crate::metrics::classification::ClassificationMetrics;
use crate::trees::classifier::ExtraTreeClassifier;
use crate::trees::node::{majority_index, TreeNode};
use crate::trees::split::TrainingSet;

/// Ensemble of extremely randomized trees whose nodes may split on feature
/// thresholds or on partitions of the training tasks.
///
/// Samples reaching a task split with a task that node never saw, or with no
/// task at all, follow the right branch.
#[derive(Clone, Debug)]
pub struct ExtraTreesClassifier<XT: RealNumber, YT: WholeNumber> {
    trees: Vec<ExtraTreeClassifier<XT, YT>>,
    forest_params: ForestParams,
    classes: Vec<YT>,
    num_features: usize,
    num_tasks: usize,
    known_tasks: BTreeSet<usize>,
    /// Dedicated pool built by `fit` when `num_threads` is set, reused by predictions.
    pool: Option<Arc<ThreadPool>>,
}

impl<XT: RealNumber, YT: WholeNumber> Default for ExtraTreesClassifier<XT, YT> {
    fn default() -> Self {
        Self::new()
    }
}

impl<XT: RealNumber, YT: WholeNumber> ClassificationMetrics<YT> for ExtraTreesClassifier<XT, YT> {}

impl<XT: RealNumber, YT: WholeNumber> ExtraTreesClassifier<XT, YT> {
    /// Creates an untrained forest with default parameters.
    pub fn new() -> Self {
        Self::with_forest_params(ForestParams::new())
    }

    pub fn with_forest_params(forest_params: ForestParams) -> Self {
        Self {
            trees: Vec::new(),
            forest_params,
            classes: Vec::new(),
            num_features: 0,
            num_tasks: 0,
            known_tasks: BTreeSet::new(),
            pool: None,
        }
    }

    /// Creates an untrained forest with custom parameters.
    ///
    /// # Arguments
    ///
    /// * `min_samples_leaf` - Nodes with at most this many samples become leaves (nmin).
    /// * `num_candidates` - Random split candidates per node (K), `None` for `sqrt(ncols)`.
    /// * `num_trees` - Number of trees in the forest.
    /// * `prob_of_task_cuts` - Probability of trying a task split at a node, `None` for `K / ncols`.
    ///
    /// # Errors
    ///
    /// Returns `ForestError::InvalidParameter` if any value is out of range.
    pub fn with_params(
        min_samples_leaf: usize,
        num_candidates: Option<usize>,
        num_trees: usize,
        prob_of_task_cuts: Option<f64>,
    ) -> Result<Self, ForestError> {
        let mut forest_params = ForestParams::new();
        forest_params.set_min_samples_leaf(min_samples_leaf)?;
        forest_params.set_num_candidates(num_candidates)?;
        forest_params.set_num_trees(num_trees)?;
        forest_params.set_prob_of_task_cuts(prob_of_task_cuts)?;
        Ok(Self::with_forest_params(forest_params))
    }

    pub fn set_num_trees(&mut self, num_trees: usize) -> Result<(), ForestError> {
        self.forest_params.set_num_trees(num_trees)
    }

    pub fn set_subset_size(&mut self, subset_size: Option<usize>) -> Result<(), ForestError> {
        self.forest_params.set_subset_size(subset_size)
    }

    /// Changes the dedicated pool size; the pool is rebuilt on the next `fit`.
    pub fn set_num_threads(&mut self, num_threads: Option<usize>) -> Result<(), ForestError> {
        self.forest_params.set_num_threads(num_threads)?;
        self.pool = None;
        Ok(())
    }

    pub fn set_prob_of_task_cuts(&mut self, prob: Option<f64>) -> Result<(), ForestError> {
        self.forest_params.set_prob_of_task_cuts(prob)
    }

    pub fn forest_params(&self) -> &ForestParams {
        &self.forest_params
    }

    pub fn trees(&self) -> &[ExtraTreeClassifier<XT, YT>] {
        &self.trees
    }

    /// Number of trained trees, zero before `fit`.
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Sorted class values seen during training.
    pub fn classes(&self) -> &[YT] {
        &self.classes
    }

    /// Size of the training task id universe, zero when trained without tasks.
    pub fn num_tasks(&self) -> usize {
        self.num_tasks
    }

    pub fn is_multitask(&self) -> bool {
        self.num_tasks > 0
    }

    pub fn has_task_splits(&self) -> bool {
        self.trees.iter().any(|tree| tree.has_task_split())
    }

    /// Grows the forest on `dataset`.
    ///
    /// Task splits are considered only if the dataset carries task ids. Each tree
    /// gets its own generator seeded from `seed`, so results are reproducible
    /// regardless of how rayon schedules the trees.
    ///
    /// # Arguments
    ///
    /// * `dataset` - Training rows, labels and optional task ids.
    /// * `seed` - Seed of the forest generator, `None` to seed from entropy.
    ///
    /// # Returns
    ///
    /// `Ok(())` once every tree is built.
    ///
    /// # Errors
    ///
    /// Fails on inconsistent or empty data, on a subset size larger than the
    /// dataset, or if the dedicated thread pool can't be created. The forest is
    /// left untouched on failure.
    pub fn fit(&mut self, dataset: &Dataset<XT, YT>, seed: Option<u64>) -> Result<(), ForestError> {
        dataset.check_consistency()?;
        let num_rows = dataset.nrows();
        let subset_size = self.forest_params.subset_size();
        if let Some(size) = subset_size {
            if size > num_rows {
                return Err(ForestError::invalid(
                    "subset_size",
                    format!("{} is larger than the {} training rows", size, num_rows),
                ));
            }
        }

        let classes = sorted_classes(&dataset.y);
        let class_index: HashMap<YT, usize> = classes
            .iter()
            .enumerate()
            .map(|(index, &class)| (class, index))
            .collect();
        let labels: Vec<usize> = dataset.y.iter().map(|class| class_index[class]).collect();

        let num_tasks = dataset.num_tasks();
        let train = TrainingSet {
            x: &dataset.x,
            labels: &labels,
            tasks: dataset.tasks.as_ref().map(|tasks| tasks.as_slice()),
            num_classes: classes.len(),
            num_tasks,
        };
        let tree_params = self.forest_params.tree_params().resolve(dataset.ncols());
        let pool = match self.forest_params.num_threads() {
            Some(num_threads) => Some(Arc::new(
                ThreadPoolBuilder::new().num_threads(num_threads).build()?,
            )),
            None => None,
        };

        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let seeds = (0..self.forest_params.num_trees())
            .map(|_| rng.gen::<u64>())
            .collect::<Vec<_>>();

        info!(
            num_trees = seeds.len(),
            num_rows,
            num_features = dataset.ncols(),
            num_classes = classes.len(),
            num_tasks,
            num_candidates = tree_params.num_candidates,
            prob_of_task_cuts = tree_params.prob_of_task_cuts,
            "building extra-trees forest"
        );

        let trees = install(pool.as_deref(), || {
            seeds
                .into_par_iter()
                .enumerate()
                .map(|(tree_index, tree_seed)| {
                    let mut tree_rng = StdRng::seed_from_u64(tree_seed);
                    let ids = match subset_size {
                        Some(size) => {
                            let mut ids =
                                rand::seq::index::sample(&mut tree_rng, num_rows, size).into_vec();
                            ids.sort_unstable();
                            ids
                        }
                        None => (0..num_rows).collect(),
                    };
                    let tree = ExtraTreeClassifier::fit(&train, &classes, &tree_params, ids, &mut tree_rng);
                    debug!(
                        tree_index,
                        depth = tree.depth(),
                        nodes = tree.num_nodes(),
                        leaves = tree.num_leaves(),
                        "tree built"
                    );
                    tree
                })
                .collect::<Vec<_>>()
        });

        self.trees = trees;
        self.pool = pool;
        self.num_features = dataset.ncols();
        self.num_tasks = num_tasks;
        self.known_tasks = dataset
            .tasks
            .as_ref()
            .map(|tasks| tasks.iter().copied().collect())
            .unwrap_or_default();
        self.classes = classes;
        info!(
            num_trees = self.trees.len(),
            task_splits = self.has_task_splits(),
            "finished building the forest"
        );
        Ok(())
    }

    /// Majority vote of all trees, for samples without task ids.
    ///
    /// Task splits, if the forest has any, send every sample right.
    pub fn predict(&self, features: &DMatrix<XT>) -> Result<DVector<YT>, ForestError> {
        self.check_features(features)?;
        self.warn_missing_tasks(features);
        self.vote(features, None)
    }

    /// Majority vote of all trees, `tasks[i]` being the task of row `i`.
    ///
    /// # Arguments
    ///
    /// * `features` - Rows to classify, with the training feature count.
    /// * `tasks` - Task id of every row; ids unseen in training go right at task splits.
    ///
    /// # Returns
    ///
    /// One predicted class per row, ties going to the smallest class.
    pub fn predict_mt(
        &self,
        features: &DMatrix<XT>,
        tasks: &DVector<usize>,
    ) -> Result<DVector<YT>, ForestError> {
        self.check_features(features)?;
        self.check_tasks(features, tasks)?;
        self.vote(features, Some(tasks))
    }

    /// Prediction of every tree for every row of `features`, shaped rows × trees.
    pub fn predict_all(&self, features: &DMatrix<XT>) -> Result<DMatrix<YT>, ForestError> {
        self.check_features(features)?;
        self.warn_missing_tasks(features);
        self.per_tree(features, None)
    }

    /// Prediction of every tree for every row, using task ids at task splits.
    ///
    /// # Arguments
    ///
    /// * `features` - Rows to classify, with the training feature count.
    /// * `tasks` - Task id of every row.
    ///
    /// # Returns
    ///
    /// A rows × trees matrix, column `j` holding the predictions of `trees()[j]`.
    pub fn predict_all_mt(
        &self,
        features: &DMatrix<XT>,
        tasks: &DVector<usize>,
    ) -> Result<DMatrix<YT>, ForestError> {
        self.check_features(features)?;
        self.check_tasks(features, tasks)?;
        self.per_tree(features, Some(tasks))
    }

    /// Class frequencies averaged over the leaves reached in each tree, shaped
    /// rows × classes with columns ordered as `classes()`.
    pub fn predict_proba(&self, features: &DMatrix<XT>) -> Result<DMatrix<f64>, ForestError> {
        self.check_features(features)?;
        self.warn_missing_tasks(features);
        self.proba(features, None)
    }

    pub fn predict_proba_mt(
        &self,
        features: &DMatrix<XT>,
        tasks: &DVector<usize>,
    ) -> Result<DMatrix<f64>, ForestError> {
        self.check_features(features)?;
        self.check_tasks(features, tasks)?;
        self.proba(features, Some(tasks))
    }

    fn vote(
        &self,
        features: &DMatrix<XT>,
        tasks: Option<&DVector<usize>>,
    ) -> Result<DVector<YT>, ForestError> {
        let predictions = self.run(|| {
            (0..features.nrows())
                .into_par_iter()
                .map(|row| {
                    let task = tasks.map(|tasks| tasks[row]);
                    let mut votes = vec![0; self.classes.len()];
                    for tree in &self.trees {
                        if let TreeNode::Leaf { class_index, .. } = tree.leaf_for(features, row, task) {
                            votes[*class_index] += 1;
                        }
                    }
                    self.classes[majority_index(&votes)]
                })
                .collect::<Vec<_>>()
        })?;
        Ok(DVector::from_vec(predictions))
    }

    fn per_tree(
        &self,
        features: &DMatrix<XT>,
        tasks: Option<&DVector<usize>>,
    ) -> Result<DMatrix<YT>, ForestError> {
        let flat = self.run(|| {
            (0..features.nrows())
                .into_par_iter()
                .flat_map_iter(|row| {
                    let task = tasks.map(|tasks| tasks[row]);
                    self.trees
                        .iter()
                        .map(move |tree| tree.predict_row(features, row, task))
                })
                .collect::<Vec<_>>()
        })?;
        Ok(DMatrix::from_row_slice(features.nrows(), self.trees.len(), &flat))
    }

    fn proba(
        &self,
        features: &DMatrix<XT>,
        tasks: Option<&DVector<usize>>,
    ) -> Result<DMatrix<f64>, ForestError> {
        let num_classes = self.classes.len();
        let num_trees = self.trees.len() as f64;
        let flat = self.run(|| {
            (0..features.nrows())
                .into_par_iter()
                .flat_map_iter(|row| {
                    let task = tasks.map(|tasks| tasks[row]);
                    let mut proba = vec![0.0; num_classes];
                    for tree in &self.trees {
                        if let TreeNode::Leaf { class_counts, .. } = tree.leaf_for(features, row, task) {
                            let total = class_counts.iter().sum::<usize>().max(1) as f64;
                            for (p, &count) in proba.iter_mut().zip(class_counts) {
                                *p += count as f64 / total;
                            }
                        }
                    }
                    proba.into_iter().map(move |p| p / num_trees)
                })
                .collect::<Vec<_>>()
        })?;
        Ok(DMatrix::from_row_slice(features.nrows(), num_classes, &flat))
    }

    fn check_features(&self, features: &DMatrix<XT>) -> Result<(), ForestError> {
        if self.trees.is_empty() {
            return Err(ForestError::NotFitted);
        }
        if features.ncols() != self.num_features {
            return Err(ForestError::DimensionMismatch(format!(
                "the forest was trained on {} features, got {}",
                self.num_features,
                features.ncols()
            )));
        }
        Ok(())
    }

    /// Logs a warning when rows without task ids meet a forest that has task splits.
    /// Returns whether the warning was emitted.
    fn warn_missing_tasks(&self, features: &DMatrix<XT>) -> bool {
        let has_task_splits = self.has_task_splits();
        if has_task_splits {
            warn!(
                rows = features.nrows(),
                "predicting without task ids on a forest with task splits, samples go right at task splits"
            );
        }
        has_task_splits
    }

    /// Validates task ids against the rows and flags ids unseen during training.
    fn check_tasks(&self, features: &DMatrix<XT>, tasks: &DVector<usize>) -> Result<(), ForestError> {
        if tasks.len() != features.nrows() {
            return Err(ForestError::DimensionMismatch(format!(
                "{} task ids for {} rows",
                tasks.len(),
                features.nrows()
            )));
        }
        if !self.is_multitask() {
            debug!("forest trained without tasks, ignoring task ids");
            return Ok(());
        }
        let unknown: HashSet<usize> = tasks
            .iter()
            .copied()
            .filter(|task| !self.known_tasks.contains(task))
            .collect();
        if !unknown.is_empty() {
            let mut unknown: Vec<usize> = unknown.into_iter().collect();
            unknown.sort_unstable();
            warn!(
                ?unknown,
                "task ids never seen during training, samples go right at task splits"
            );
        }
        Ok(())
    }

    /// Runs `job` in the pool built by `fit`, or in a fresh pool if `num_threads`
    /// changed since, or in the global pool when `num_threads` is unset.
    fn run<T, F>(&self, job: F) -> Result<T, ForestError>
    where
        T: Send,
        F: FnOnce() -> T + Send,
    {
        match (self.forest_params.num_threads(), &self.pool) {
            (Some(_), Some(pool)) => Ok(pool.install(job)),
            (Some(num_threads), None) => {
                let pool = ThreadPoolBuilder::new().num_threads(num_threads).build()?;
                Ok(pool.install(job))
            }
            (None, _) => Ok(job()),
        }
    }
}

fn install<T, F>(pool: Option<&ThreadPool>, job: F) -> T
where
    T: Send,
    F: FnOnce() -> T + Send,
{
    match pool {
        Some(pool) => pool.install(job),
        None => job(),
    }
}

fn sorted_classes<YT: WholeNumber>(y: &DVector<YT>) -> Vec<YT> {
    let unique: HashSet<YT> = y.iter().copied().collect();
    let mut classes: Vec<YT> = unique.into_iter().collect();
    classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    classes
}

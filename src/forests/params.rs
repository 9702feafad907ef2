use crate::error::ForestError;
use crate::trees::params::TreeParams;

/// Ensemble-level hyperparameters.
#[derive(Clone, Debug, PartialEq)]
pub struct ForestParams {
    tree_params: TreeParams,
    num_trees: usize,
    subset_size: Option<usize>,
    num_threads: Option<usize>,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self::new()
    }
}

impl ForestParams {
    pub fn new() -> Self {
        Self {
            tree_params: TreeParams::new(),
            num_trees: 100,
            subset_size: None,
            num_threads: None,
        }
    }

    pub fn set_num_trees(&mut self, num_trees: usize) -> Result<(), ForestError> {
        if num_trees < 1 {
            return Err(ForestError::invalid("num_trees", "must be greater than 0"));
        }
        self.num_trees = num_trees;
        Ok(())
    }

    /// Rows drawn without replacement for each tree, `None` trains every tree on all rows.
    pub fn set_subset_size(&mut self, subset_size: Option<usize>) -> Result<(), ForestError> {
        if subset_size.is_some_and(|size| size < 1) {
            return Err(ForestError::invalid("subset_size", "must be greater than 0"));
        }
        self.subset_size = subset_size;
        Ok(())
    }

    /// Size of a dedicated worker pool, `None` uses rayon's global pool.
    pub fn set_num_threads(&mut self, num_threads: Option<usize>) -> Result<(), ForestError> {
        if num_threads.is_some_and(|threads| threads < 1) {
            return Err(ForestError::invalid("num_threads", "must be greater than 0"));
        }
        self.num_threads = num_threads;
        Ok(())
    }

    pub fn set_min_samples_leaf(&mut self, min_samples_leaf: usize) -> Result<(), ForestError> {
        self.tree_params.set_min_samples_leaf(min_samples_leaf)
    }

    pub fn set_num_candidates(&mut self, num_candidates: Option<usize>) -> Result<(), ForestError> {
        self.tree_params.set_num_candidates(num_candidates)
    }

    pub fn set_prob_of_task_cuts(&mut self, prob: Option<f64>) -> Result<(), ForestError> {
        self.tree_params.set_prob_of_task_cuts(prob)
    }

    pub fn tree_params(&self) -> &TreeParams {
        &self.tree_params
    }

    pub fn num_trees(&self) -> usize {
        self.num_trees
    }

    pub fn subset_size(&self) -> Option<usize> {
        self.subset_size
    }

    pub fn num_threads(&self) -> Option<usize> {
        self.num_threads
    }
}

use crate::error::ForestError;

/// Hyperparameters controlling how a single randomized tree grows.
#[derive(Clone, Debug, PartialEq)]
pub struct TreeParams {
    pub min_samples_leaf: usize,
    pub num_candidates: Option<usize>,
    pub prob_of_task_cuts: Option<f64>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeParams {
    pub fn new() -> Self {
        Self {
            min_samples_leaf: 1,
            num_candidates: None,
            prob_of_task_cuts: None,
        }
    }

    /// Nodes holding this many samples or fewer become leaves.
    pub fn set_min_samples_leaf(&mut self, min_samples_leaf: usize) -> Result<(), ForestError> {
        if min_samples_leaf < 1 {
            return Err(ForestError::invalid(
                "min_samples_leaf",
                "must be greater than 0",
            ));
        }
        self.min_samples_leaf = min_samples_leaf;
        Ok(())
    }

    /// Number of random split candidates examined per node, `None` uses `sqrt(ncols)`.
    pub fn set_num_candidates(&mut self, num_candidates: Option<usize>) -> Result<(), ForestError> {
        if num_candidates.is_some_and(|k| k < 1) {
            return Err(ForestError::invalid(
                "num_candidates",
                "must be greater than 0",
            ));
        }
        self.num_candidates = num_candidates;
        Ok(())
    }

    /// Probability of trying a task split at a node, `None` uses `K / ncols`.
    pub fn set_prob_of_task_cuts(&mut self, prob: Option<f64>) -> Result<(), ForestError> {
        if prob.is_some_and(|p| !(0.0..=1.0).contains(&p)) {
            return Err(ForestError::invalid(
                "prob_of_task_cuts",
                "must be between 0.0 and 1.0",
            ));
        }
        self.prob_of_task_cuts = prob;
        Ok(())
    }

    pub fn min_samples_leaf(&self) -> usize {
        self.min_samples_leaf
    }

    pub fn num_candidates(&self) -> Option<usize> {
        self.num_candidates
    }

    pub fn prob_of_task_cuts(&self) -> Option<f64> {
        self.prob_of_task_cuts
    }

    /// Fills in the data-dependent defaults for a matrix with `num_features` columns.
    pub fn resolve(&self, num_features: usize) -> ResolvedTreeParams {
        let num_candidates = self
            .num_candidates
            .unwrap_or_else(|| (num_features as f64).sqrt().floor() as usize)
            .max(1);
        let prob_of_task_cuts = self.prob_of_task_cuts.unwrap_or_else(|| {
            (num_candidates as f64 / num_features.max(1) as f64).min(1.0)
        });
        ResolvedTreeParams {
            min_samples_leaf: self.min_samples_leaf,
            num_candidates,
            prob_of_task_cuts,
        }
    }
}

/// Tree parameters with every default settled against the training matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolvedTreeParams {
    pub min_samples_leaf: usize,
    pub num_candidates: usize,
    pub prob_of_task_cuts: f64,
}

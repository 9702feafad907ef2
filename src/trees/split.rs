use std::collections::BTreeSet;

use nalgebra::DMatrix;
use rand::Rng;

use super::params::ResolvedTreeParams;
use super::task_split::{random_task_partition, split_ids_by_task, sum_along_second, task_class_table};
use crate::data::dataset::RealNumber;

/// Random draws allowed per requested candidate before the node gives up.
const DRAWS_PER_CANDIDATE: usize = 10;

/// Read-only view of the training data shared by every tree of a forest.
#[derive(Clone, Copy, Debug)]
pub struct TrainingSet<'a, XT: RealNumber> {
    pub x: &'a DMatrix<XT>,
    /// Class index of every row.
    pub labels: &'a [usize],
    /// Task id of every row, `None` for single-task training.
    pub tasks: Option<&'a [usize]>,
    pub num_classes: usize,
    pub num_tasks: usize,
}

impl<'a, XT: RealNumber> TrainingSet<'a, XT> {
    pub fn class_counts(&self, ids: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.num_classes];
        for &id in ids {
            counts[self.labels[id]] += 1;
        }
        counts
    }
}

/// How a split node sends samples to its children.
#[derive(Clone, Debug, PartialEq)]
pub enum SplitRule<XT: RealNumber> {
    /// Left iff `x[feature_index] < threshold`.
    Threshold { feature_index: usize, threshold: XT },
    /// Left iff the sample's task is in `left_tasks`.
    Task {
        left_tasks: BTreeSet<usize>,
        right_tasks: BTreeSet<usize>,
    },
}

impl<XT: RealNumber> SplitRule<XT> {
    /// Stable partition of `ids` into left and right children.
    pub fn partition(&self, train: &TrainingSet<XT>, ids: &[usize]) -> (Vec<usize>, Vec<usize>) {
        match self {
            Self::Threshold {
                feature_index,
                threshold,
            } => ids
                .iter()
                .partition(|&&id| train.x[(id, *feature_index)] < *threshold),
            Self::Task { left_tasks, .. } => match train.tasks {
                Some(tasks) => split_ids_by_task(ids, tasks, left_tasks),
                None => (Vec::new(), ids.to_vec()),
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SplitCandidate<XT: RealNumber> {
    pub rule: SplitRule<XT>,
    /// Gini impurity reduction.
    pub score: f64,
}

pub fn gini_impurity(counts: &[usize]) -> f64 {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts
        .iter()
        .map(|&count| {
            let p = count as f64 / total;
            p * p
        })
        .sum::<f64>()
}

/// Impurity decrease of splitting `parent` into `left` and `parent - left`,
/// children weighted by their share of the samples.
pub fn gini_gain(parent: &[usize], left: &[usize]) -> f64 {
    let right: Vec<usize> = parent.iter().zip(left).map(|(&p, &l)| p - l).collect();
    let num_samples = parent.iter().sum::<usize>() as f64;
    let num_left = left.iter().sum::<usize>() as f64;
    let num_right = num_samples - num_left;

    gini_impurity(parent)
        - (num_left / num_samples) * gini_impurity(left)
        - (num_right / num_samples) * gini_impurity(&right)
}

/// Draws and scores random split candidates for one node.
pub struct SplitEvaluator<'a, 'b, XT: RealNumber> {
    train: &'a TrainingSet<'b, XT>,
    params: &'a ResolvedTreeParams,
}

impl<'a, 'b, XT: RealNumber> SplitEvaluator<'a, 'b, XT> {
    pub fn new(train: &'a TrainingSet<'b, XT>, params: &'a ResolvedTreeParams) -> Self {
        Self { train, params }
    }

    /// Best candidate for the node holding `ids`, or `None` if no candidate lowers impurity.
    ///
    /// With task ids available, a Bernoulli draw decides whether the node tries task
    /// partitions first; threshold candidates are drawn otherwise or when every task
    /// candidate fails.
    pub fn find_split<R: Rng + ?Sized>(
        &self,
        ids: &[usize],
        parent_counts: &[usize],
        rng: &mut R,
    ) -> Option<SplitCandidate<XT>> {
        if self.train.tasks.is_some() && rng.gen_bool(self.params.prob_of_task_cuts) {
            if let Some(candidate) = self.best_task_split(ids, parent_counts, rng) {
                return Some(candidate);
            }
        }
        self.best_threshold_split(ids, parent_counts, rng)
    }

    /// Best of `num_candidates` random threshold splits, or `None` if no feature
    /// varies over `ids` or no drawn threshold lowers impurity.
    ///
    /// Features constant at the node are never drawn, so they don't use up draws.
    pub fn best_threshold_split<R: Rng + ?Sized>(
        &self,
        ids: &[usize],
        parent_counts: &[usize],
        rng: &mut R,
    ) -> Option<SplitCandidate<XT>> {
        let ranges: Vec<(usize, XT, XT)> = (0..self.train.x.ncols())
            .filter_map(|feature_index| {
                self.feature_range(ids, feature_index)
                    .map(|(min, max)| (feature_index, min, max))
            })
            .collect();
        if ranges.is_empty() {
            return None;
        }

        let mut best: Option<SplitCandidate<XT>> = None;
        let mut valid = 0;
        let mut draws = 0;
        while valid < self.params.num_candidates
            && draws < self.params.num_candidates * DRAWS_PER_CANDIDATE
        {
            draws += 1;
            let (feature_index, min, max) = ranges[rng.gen_range(0..ranges.len())];
            let Some(threshold) = draw_threshold(min, max, rng) else {
                continue;
            };

            let mut left_counts = vec![0; self.train.num_classes];
            let mut num_left = 0;
            for &id in ids {
                if self.train.x[(id, feature_index)] < threshold {
                    left_counts[self.train.labels[id]] += 1;
                    num_left += 1;
                }
            }
            if num_left == 0 || num_left == ids.len() {
                continue;
            }

            valid += 1;
            let score = gini_gain(parent_counts, &left_counts);
            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(SplitCandidate {
                    rule: SplitRule::Threshold {
                        feature_index,
                        threshold,
                    },
                    score,
                });
            }
        }
        best.filter(|candidate| candidate.score > 0.0)
    }

    /// Smallest and largest value of the feature over `ids`, `None` if it is constant there.
    fn feature_range(&self, ids: &[usize], feature_index: usize) -> Option<(XT, XT)> {
        let mut values = ids.iter().map(|&id| self.train.x[(id, feature_index)]);
        let first = values.next()?;
        let (min, max) = values.fold((first, first), |(min, max), value| {
            (min.min(value), max.max(value))
        });
        (min < max).then_some((min, max))
    }

    pub fn best_task_split<R: Rng + ?Sized>(
        &self,
        ids: &[usize],
        parent_counts: &[usize],
        rng: &mut R,
    ) -> Option<SplitCandidate<XT>> {
        let tasks = self.train.tasks?;
        let table = task_class_table(
            ids,
            tasks,
            self.train.labels,
            self.train.num_tasks,
            self.train.num_classes,
        );
        let task_totals = sum_along_second(&table);
        let present: Vec<usize> = (0..table.nrows()).filter(|&t| task_totals[t] > 0.0).collect();
        if present.len() < 2 {
            return None;
        }

        let mut best: Option<SplitCandidate<XT>> = None;
        let mut valid = 0;
        let mut draws = 0;
        while valid < self.params.num_candidates
            && draws < self.params.num_candidates * DRAWS_PER_CANDIDATE
        {
            draws += 1;
            let Some((left_tasks, right_tasks)) = random_task_partition(&present, rng) else {
                break;
            };
            let left_total: f64 = left_tasks.iter().map(|&t| task_totals[t]).sum();
            let right_total: f64 = right_tasks.iter().map(|&t| task_totals[t]).sum();
            if left_total == 0.0 || right_total == 0.0 {
                continue;
            }

            valid += 1;
            let mut left_counts = vec![0; self.train.num_classes];
            for &task in &left_tasks {
                for (class, count) in table.row(task).iter().enumerate() {
                    left_counts[class] += count;
                }
            }
            let score = gini_gain(parent_counts, &left_counts);
            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(SplitCandidate {
                    rule: SplitRule::Task {
                        left_tasks,
                        right_tasks,
                    },
                    score,
                });
            }
        }
        best.filter(|candidate| candidate.score > 0.0)
    }
}

/// Uniform threshold in `(min, max]`.
fn draw_threshold<XT: RealNumber, R: Rng + ?Sized>(min: XT, max: XT, rng: &mut R) -> Option<XT> {
    let u = XT::from_f64(rng.gen::<f64>())?;
    let threshold = min + u * (max - min);
    (threshold > min && threshold <= max).then_some(threshold)
}

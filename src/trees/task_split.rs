use std::collections::BTreeSet;

use nalgebra::{DMatrix, DVector};
use rand::Rng;

/// Random draws before a task partition falls back to halving the task list.
const MAX_PARTITION_RETRIES: usize = 16;

/// Draws a random bipartition of the distinct ids in `tasks`.
///
/// Each task goes left or right with probability 1/2. Draws leaving one side
/// empty are repeated; once the retries run out the sorted task list is cut in
/// half instead. Returns `None` when fewer than two distinct tasks are given.
pub fn random_task_partition<R: Rng + ?Sized>(
    tasks: &[usize],
    rng: &mut R,
) -> Option<(BTreeSet<usize>, BTreeSet<usize>)> {
    let distinct: Vec<usize> = tasks.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
    if distinct.len() < 2 {
        return None;
    }

    for _ in 0..MAX_PARTITION_RETRIES {
        let (left, right): (BTreeSet<usize>, BTreeSet<usize>) =
            distinct.iter().partition(|_| rng.gen_bool(0.5));
        if !left.is_empty() && !right.is_empty() {
            return Some((left, right));
        }
    }

    let (left, right) = distinct.split_at(distinct.len() / 2);
    Some((left.iter().copied().collect(), right.iter().copied().collect()))
}

/// Splits `ids` into the samples whose task is in `left_tasks` and the rest,
/// keeping the input order on both sides.
pub fn split_ids_by_task(
    ids: &[usize],
    tasks: &[usize],
    left_tasks: &BTreeSet<usize>,
) -> (Vec<usize>, Vec<usize>) {
    ids.iter()
        .partition(|&&id| left_tasks.contains(&tasks[id]))
}

/// Counts samples of `ids` per (task, class): rows are tasks, columns are class indices.
pub fn task_class_table(
    ids: &[usize],
    tasks: &[usize],
    labels: &[usize],
    num_tasks: usize,
    num_classes: usize,
) -> DMatrix<usize> {
    let mut table = DMatrix::zeros(num_tasks, num_classes);
    for &id in ids {
        table[(tasks[id], labels[id])] += 1;
    }
    table
}

/// Sums every row of `table` across its columns.
pub fn sum_along_second(table: &DMatrix<usize>) -> DVector<f64> {
    DVector::from_iterator(
        table.nrows(),
        table.row_iter().map(|row| row.iter().sum::<usize>() as f64),
    )
}

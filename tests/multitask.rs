use std::collections::BTreeSet;

use approx::assert_relative_eq;
use multitask_extratrees::data::dataset::Dataset;
use multitask_extratrees::forests::classifier::ExtraTreesClassifier;
use multitask_extratrees::metrics::classification::ClassificationMetrics;
use multitask_extratrees::trees::node::TreeNode;
use multitask_extratrees::trees::task_split::{split_ids_by_task, sum_along_second};
use nalgebra::{DMatrix, DVector};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn multitask_dataset(rng: &mut StdRng, num_rows: usize, num_features: usize, num_tasks: usize) -> Dataset<f64, u8> {
    let num_features = num_features.max(2);
    let x = DMatrix::from_fn(num_rows, num_features, |_, _| rng.gen::<f64>());
    let tasks = DVector::from_fn(num_rows, |i, _| i % num_tasks);
    let y = DVector::from_fn(num_rows, |i, _| {
        if x[(i, 0)] < 0.5 {
            let flip = if tasks[i] % 2 == 0 { 0.05 } else { 0.95 };
            u8::from(rng.gen::<f64>() < flip)
        } else {
            u8::from(x[(i, 1)] < 0.5)
        }
    });
    Dataset::with_tasks(x, y, tasks)
}

fn collect_task_splits(node: &TreeNode<f64, u8>, found: &mut Vec<(BTreeSet<usize>, BTreeSet<usize>)>) {
    match node {
        TreeNode::Leaf { .. } => {}
        TreeNode::Threshold { left, right, .. } => {
            collect_task_splits(left, found);
            collect_task_splits(right, found);
        }
        TreeNode::Task {
            left_tasks,
            right_tasks,
            left,
            right,
        } => {
            found.push((left_tasks.clone(), right_tasks.clone()));
            collect_task_splits(left, found);
            collect_task_splits(right, found);
        }
    }
}

#[test]
fn ids_split_by_task_keep_order() {
    let tasks = [0, 0, 0, 1, 1, 1, 2, 3, 6, 3];
    let left_tasks = BTreeSet::from([0, 3]);
    let (left, right) = split_ids_by_task(&[0, 1, 2, 3, 4, 6, 7, 8, 9], &tasks, &left_tasks);
    assert_eq!(left, vec![0, 1, 2, 7, 9]);
    assert_eq!(right, vec![3, 4, 6, 8]);
}

#[test]
fn sum_along_second_axis() {
    let n = 10;
    let table = DMatrix::from_fn(2, n, |row, task| if row == 0 { task % 5 } else { task % 3 });
    let sums = sum_along_second(&table);
    assert_relative_eq!(sums[0], 20.0, epsilon = 1e-7);
    assert_relative_eq!(sums[1], 9.0, epsilon = 1e-7);
}

#[test]
fn multitask_forest_predictions() {
    let num_tasks = 50;
    let num_features = 10;
    let mut rng = StdRng::seed_from_u64(12345);
    let train = multitask_dataset(&mut rng, 1000, num_features, num_tasks);
    let single_task = Dataset::new(train.x.clone(), train.y.clone());
    let test = multitask_dataset(&mut rng, 1000, num_features, num_tasks);
    let test_tasks = test.tasks.as_ref().unwrap();
    assert_eq!(train.num_tasks(), num_tasks);

    let mut forest = ExtraTreesClassifier::with_params(7, Some(5), 10, Some(0.7)).unwrap();
    let mut plain = ExtraTreesClassifier::with_params(7, Some(5), 10, None).unwrap();
    forest.fit(&train, Some(1)).unwrap();
    plain.fit(&single_task, Some(2)).unwrap();
    assert_eq!(forest.num_tasks(), num_tasks);

    let predictions = forest.predict_mt(&test.x, test_tasks).unwrap();
    let plain_predictions = plain.predict(&test.x).unwrap();
    assert_eq!(predictions.len(), test.nrows());
    assert!(predictions.iter().all(|p| forest.classes().contains(p)));

    let all = forest.predict_all_mt(&test.x, test_tasks).unwrap();
    assert_eq!(all.nrows(), test.nrows());
    assert_eq!(all.ncols(), forest.num_trees());

    let error = forest.error_rate(&test.y, &predictions).unwrap();
    let plain_error = plain.error_rate(&test.y, &plain_predictions).unwrap();
    assert!(error < 0.5, "multi-task error {}", error);
    assert!(
        error <= plain_error + 0.05,
        "multi-task error {} against single-task error {}",
        error,
        plain_error
    );
}

#[test]
fn task_splits_partition_node_tasks() {
    let mut rng = StdRng::seed_from_u64(77);
    let train = multitask_dataset(&mut rng, 600, 4, 12);
    let mut forest = ExtraTreesClassifier::with_params(3, Some(3), 5, Some(0.8)).unwrap();
    forest.fit(&train, Some(4)).unwrap();

    let mut splits = Vec::new();
    for tree in forest.trees() {
        collect_task_splits(tree.root(), &mut splits);
    }
    assert!(!splits.is_empty());
    for (left_tasks, right_tasks) in splits {
        assert!(!left_tasks.is_empty());
        assert!(!right_tasks.is_empty());
        assert!(left_tasks.is_disjoint(&right_tasks));
        assert!(left_tasks.iter().chain(&right_tasks).all(|&task| task < 12));
    }
}

#[test]
fn zero_task_cut_probability_gives_plain_extra_trees() {
    let mut rng = StdRng::seed_from_u64(3);
    let train = multitask_dataset(&mut rng, 500, 5, 10);
    let mut forest = ExtraTreesClassifier::with_params(2, None, 10, Some(0.0)).unwrap();
    forest.fit(&train, Some(9)).unwrap();
    assert!(!forest.has_task_splits());
}

#[test]
fn repeated_predictions_are_identical() {
    let mut rng = StdRng::seed_from_u64(8);
    let train = multitask_dataset(&mut rng, 300, 3, 6);
    let test = multitask_dataset(&mut rng, 50, 3, 6);
    let test_tasks = test.tasks.as_ref().unwrap();
    let mut forest = ExtraTreesClassifier::with_params(1, Some(2), 7, Some(0.5)).unwrap();
    forest.fit(&train, Some(10)).unwrap();

    assert_eq!(
        forest.predict_mt(&test.x, test_tasks).unwrap(),
        forest.predict_mt(&test.x, test_tasks).unwrap()
    );
    assert_eq!(
        forest.predict_all(&test.x).unwrap(),
        forest.predict_all(&test.x).unwrap()
    );
    assert_eq!(forest.predict_all(&test.x).unwrap().shape(), (50, 7));
}

#[test]
fn constant_columns_do_not_stop_root_splits() {
    let num_rows = 100;
    let x = DMatrix::from_fn(num_rows, 40, |row, col| if col == 0 { row as f64 } else { 0.25 });
    let y = DVector::from_fn(num_rows, |row, _| u8::from(row >= 50));
    let mut forest = ExtraTreesClassifier::with_params(1, Some(1), 200, None).unwrap();
    forest.fit(&Dataset::new(x, y), Some(3)).unwrap();

    let stumps = forest.trees().iter().filter(|tree| tree.root().is_leaf()).count();
    assert_eq!(stumps, 0);
}

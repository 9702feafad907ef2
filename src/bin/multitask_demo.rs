use multitask_extratrees::data::dataset::Dataset;
use multitask_extratrees::error::ForestError;
use multitask_extratrees::forests::classifier::ExtraTreesClassifier;
use multitask_extratrees::metrics::classification::ClassificationMetrics;
use nalgebra::{DMatrix, DVector};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const NUM_TASKS: usize = 50;
const NUM_FEATURES: usize = 10;
const NUM_TEST_ROWS: usize = 1000;
const REPETITIONS: usize = 10;

/// Synthetic multi-task data: below 0.5 on the first feature even tasks are
/// mostly class 0 and odd tasks mostly class 1; above it the label follows the
/// second feature for every task.
fn generate_dataset(rng: &mut StdRng, num_rows: usize) -> Dataset<f64, u8> {
    let x = DMatrix::from_fn(num_rows, NUM_FEATURES, |_, _| rng.gen::<f64>());
    let tasks = DVector::from_fn(num_rows, |i, _| i % NUM_TASKS);
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

/// Error rates of a task-aware forest and of a plain forest on the same data.
fn compare_once(rng: &mut StdRng, num_rows: usize) -> Result<(f64, f64), ForestError> {
    let train = generate_dataset(rng, num_rows);
    let single_task = Dataset::new(train.x.clone(), train.y.clone());
    let test = generate_dataset(rng, NUM_TEST_ROWS);
    let test_tasks = test.tasks.as_ref().ok_or(ForestError::EmptyDataset)?;

    let mut multitask_forest = ExtraTreesClassifier::with_params(7, Some(5), 10, Some(0.7))?;
    let mut plain_forest = ExtraTreesClassifier::with_params(7, Some(5), 10, None)?;
    multitask_forest.fit(&train, Some(rng.gen()))?;
    plain_forest.fit(&single_task, Some(rng.gen()))?;

    let multitask_predictions = multitask_forest.predict_mt(&test.x, test_tasks)?;
    let plain_predictions = plain_forest.predict(&test.x)?;

    let per_tree = multitask_forest.predict_all_mt(&test.x, test_tasks)?;
    debug!(
        rows = per_tree.nrows(),
        trees = per_tree.ncols(),
        "per-tree prediction matrix"
    );

    Ok((
        multitask_forest.error_rate(&test.y, &multitask_predictions)?,
        plain_forest.error_rate(&test.y, &plain_predictions)?,
    ))
}

fn main() -> Result<(), ForestError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut rng = StdRng::seed_from_u64(2024);
    for num_rows in [500, 1000, 2000] {
        let mut multitask_error = 0.0;
        let mut plain_error = 0.0;
        for _ in 0..REPETITIONS {
            let (multitask, plain) = compare_once(&mut rng, num_rows)?;
            multitask_error += multitask;
            plain_error += plain;
        }
        println!(
            "Error rate (N={:>4})\t[MT] {:.3}\t[ST] {:.3}",
            num_rows,
            multitask_error / REPETITIONS as f64,
            plain_error / REPETITIONS as f64
        );
    }
    Ok(())
}

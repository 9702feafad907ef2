//! # Multitask Extra-Trees
//!
//! `multitask-extratrees` implements Extremely Randomized Trees for classification,
//! extended to multi-task data. Every training sample may carry a task identifier,
//! and trees can split a node either on a random feature threshold or on a random
//! bipartition of the tasks present at that node.
//!
//! ## Example Usage
//!
//! ```rust
//! use multitask_extratrees::data::dataset::Dataset;
//! use multitask_extratrees::forests::classifier::ExtraTreesClassifier;
//! use nalgebra::{DMatrix, DVector};
//!
//! let x = DMatrix::from_row_slice(
//!     6,
//!     2,
//!     &[0.1, 0.9, 0.2, 0.8, 0.3, 0.7, 0.7, 0.3, 0.8, 0.2, 0.9, 0.1],
//! );
//! let y = DVector::from_vec(vec![0u8, 0, 0, 1, 1, 1]);
//! let tasks = DVector::from_vec(vec![0, 1, 0, 1, 0, 1]);
//! let dataset = Dataset::with_tasks(x, y, tasks);
//!
//! let mut forest = ExtraTreesClassifier::with_params(1, Some(2), 10, Some(0.5)).unwrap();
//! forest.fit(&dataset, Some(42)).unwrap();
//!
//! let test_x = DMatrix::from_row_slice(2, 2, &[0.15, 0.85, 0.85, 0.15]);
//! let test_tasks = DVector::from_vec(vec![0, 1]);
//! let predictions = forest.predict_mt(&test_x, &test_tasks).unwrap();
//! assert_eq!(predictions.len(), 2);
//! ```

/// Dataset and numeric traits
pub mod data;
/// Crate error type
pub mod error;
/// Extra-Trees ensembles
pub mod forests;
/// Functions for evaluating model performance
pub mod metrics;
/// Randomized decision trees
pub mod trees;

pub use error::ForestError;

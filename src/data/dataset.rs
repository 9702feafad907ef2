use nalgebra::{DMatrix, DVector};
use num_traits::{Float, FromPrimitive, Num, ToPrimitive};
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};
use std::fmt::{self, Display};
use std::fmt::{Debug, Formatter};
use std::hash::Hash;

use crate::error::ForestError;

pub trait DataValue:
    Debug + Clone + Copy + Num + FromPrimitive + ToPrimitive + Send + Sync + Display + 'static
{
}

impl<T> DataValue for T where
    T: Debug + Clone + Copy + Num + FromPrimitive + ToPrimitive + Send + Sync + Display + 'static
{
}

pub trait Number: DataValue + PartialOrd {}
impl<T> Number for T where T: DataValue + PartialOrd {}

/// Categorical values: labels are compared, hashed and ordered.
pub trait WholeNumber: Number + Eq + Hash {}
impl<T> WholeNumber for T where T: Number + Eq + Hash {}

pub trait RealNumber: Number + Float {}
impl<T> RealNumber for T where T: Number + Float {}

/// Training or evaluation data: one feature row, one label and optionally one task id per sample.
pub struct Dataset<XT: Number, YT: WholeNumber> {
    pub x: DMatrix<XT>,
    pub y: DVector<YT>,
    pub tasks: Option<DVector<usize>>,
}

impl<XT: Number, YT: WholeNumber> Debug for Dataset<XT, YT> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Dataset {{\n    x: [\n")?;

        for i in 0..self.x.nrows() {
            write!(f, "        [")?;
            for j in 0..self.x.ncols() {
                write!(f, "{:?}, ", self.x[(i, j)])?;
            }
            writeln!(f, "],")?;
        }

        write!(f, "    ],\n    y: [")?;
        for value in self.y.iter() {
            write!(f, "{:?}, ", value)?;
        }
        write!(f, "]")?;
        if let Some(tasks) = &self.tasks {
            write!(f, ",\n    tasks: [")?;
            for task in tasks.iter() {
                write!(f, "{}, ", task)?;
            }
            write!(f, "]")?;
        }
        write!(f, "\n}}")
    }
}

impl<XT: Number, YT: WholeNumber> Dataset<XT, YT> {
    /// Single-task dataset.
    pub fn new(x: DMatrix<XT>, y: DVector<YT>) -> Self {
        Self { x, y, tasks: None }
    }

    /// Multi-task dataset, `tasks[i]` is the task of row `i`.
    pub fn with_tasks(x: DMatrix<XT>, y: DVector<YT>, tasks: DVector<usize>) -> Self {
        Self {
            x,
            y,
            tasks: Some(tasks),
        }
    }

    pub fn into_parts(&self) -> (&DMatrix<XT>, &DVector<YT>, Option<&DVector<usize>>) {
        (&self.x, &self.y, self.tasks.as_ref())
    }

    pub fn is_not_empty(&self) -> bool {
        !(self.x.is_empty() || self.y.is_empty())
    }

    pub fn is_multitask(&self) -> bool {
        self.tasks.is_some()
    }

    pub fn nrows(&self) -> usize {
        self.x.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.x.ncols()
    }

    /// Size of the task id universe (largest id + 1), zero for single-task data.
    pub fn num_tasks(&self) -> usize {
        self.tasks
            .as_ref()
            .and_then(|tasks| tasks.iter().max().copied())
            .map_or(0, |max| max + 1)
    }

    /// Checks that labels and tasks line up with the rows of the feature matrix.
    pub fn check_consistency(&self) -> Result<(), ForestError> {
        if !self.is_not_empty() {
            return Err(ForestError::EmptyDataset);
        }
        if self.y.len() != self.x.nrows() {
            return Err(ForestError::DimensionMismatch(format!(
                "{} labels for {} rows",
                self.y.len(),
                self.x.nrows()
            )));
        }
        if let Some(tasks) = &self.tasks {
            if tasks.len() != self.x.nrows() {
                return Err(ForestError::DimensionMismatch(format!(
                    "{} task ids for {} rows",
                    tasks.len(),
                    self.x.nrows()
                )));
            }
        }
        Ok(())
    }

    pub fn train_test_split(
        &self,
        train_size: f64,
        seed: Option<u64>,
    ) -> Result<(Self, Self), ForestError> {
        if !(0.0..=1.0).contains(&train_size) {
            return Err(ForestError::invalid(
                "train_size",
                "should be between 0.0 and 1.0",
            ));
        }
        self.check_consistency()?;
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut indices = (0..self.x.nrows()).collect::<Vec<_>>();
        indices.shuffle(&mut rng);
        let train_size = (self.x.nrows() as f64 * train_size).floor() as usize;
        let (train_indices, test_indices) = indices.split_at(train_size);

        Ok((self.select(train_indices), self.select(test_indices)))
    }

    fn select(&self, indices: &[usize]) -> Self {
        let x = DMatrix::from_fn(indices.len(), self.x.ncols(), |i, j| {
            self.x[(indices[i], j)]
        });
        let y = DVector::from_iterator(indices.len(), indices.iter().map(|&i| self.y[i]));
        let tasks = self.tasks.as_ref().map(|tasks| {
            DVector::from_iterator(indices.len(), indices.iter().map(|&i| tasks[i]))
        });
        Self { x, y, tasks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_new() {
        let x = DMatrix::from_row_slice(2, 2, &[1, 2, 3, 4]);
        let y = DVector::from_vec(vec![5, 6]);
        let dataset = Dataset::new(x.clone(), y.clone());
        assert_eq!(dataset.x, x);
        assert_eq!(dataset.y, y);
        assert!(!dataset.is_multitask());
        assert_eq!(dataset.num_tasks(), 0);
    }

    #[test]
    fn test_dataset_into_parts() {
        let x = DMatrix::from_row_slice(2, 1, &[0.5, 1.5]);
        let y = DVector::from_vec(vec![1u8, 0]);
        let tasks = DVector::from_vec(vec![3, 1]);
        let dataset = Dataset::with_tasks(x.clone(), y.clone(), tasks.clone());
        let (parts_x, parts_y, parts_tasks) = dataset.into_parts();
        assert_eq!(parts_x, &x);
        assert_eq!(parts_y, &y);
        assert_eq!(parts_tasks, Some(&tasks));

        let single = Dataset::new(x, y);
        assert!(single.into_parts().2.is_none());
    }

    #[test]
    fn test_dataset_num_tasks() {
        let x = DMatrix::from_row_slice(3, 1, &[1.0, 2.0, 3.0]);
        let y = DVector::from_vec(vec![0, 1, 0]);
        let tasks = DVector::from_vec(vec![0, 4, 2]);
        let dataset = Dataset::with_tasks(x, y, tasks);
        assert!(dataset.is_multitask());
        assert_eq!(dataset.num_tasks(), 5);
    }

    #[test]
    fn test_dataset_formatting() {
        let x = DMatrix::from_row_slice(2, 2, &[1, 2, 3, 4]);
        let y = DVector::from_vec(vec![5, 6]);
        let tasks = DVector::from_vec(vec![0, 1]);
        let dataset = Dataset::with_tasks(x, y, tasks);

        let expected_str = "\
Dataset {
    x: [
        [1, 2, ],
        [3, 4, ],
    ],
    y: [5, 6, ],
    tasks: [0, 1, ]
}";
        assert_eq!(format!("{:?}", dataset), expected_str);
    }

    #[test]
    fn test_check_consistency_label_mismatch() {
        let x = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let y = DVector::from_vec(vec![1, 0, 1]);
        let dataset = Dataset::new(x, y);
        assert!(matches!(
            dataset.check_consistency(),
            Err(ForestError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_check_consistency_task_mismatch() {
        let x = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let y = DVector::from_vec(vec![1, 0]);
        let tasks = DVector::from_vec(vec![0]);
        let dataset = Dataset::with_tasks(x, y, tasks);
        assert!(matches!(
            dataset.check_consistency(),
            Err(ForestError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_check_consistency_empty() {
        let x = DMatrix::<f64>::from_row_slice(0, 2, &[]);
        let y = DVector::<u8>::from_vec(vec![]);
        let dataset = Dataset::new(x, y);
        assert!(matches!(
            dataset.check_consistency(),
            Err(ForestError::EmptyDataset)
        ));
    }

    #[test]
    fn test_dataset_train_test_split_keeps_tasks_aligned() {
        let x = DMatrix::from_row_slice(4, 2, &[1, 2, 3, 4, 5, 6, 7, 8]);
        let y = DVector::from_vec(vec![1, 3, 5, 7]);
        let tasks = DVector::from_vec(vec![10, 30, 50, 70]);
        let dataset = Dataset::with_tasks(x, y, tasks);

        let (train, test) = dataset.train_test_split(0.75, Some(7)).unwrap();
        assert_eq!(train.nrows(), 3);
        assert_eq!(test.nrows(), 1);
        for part in [&train, &test] {
            let tasks = part.tasks.as_ref().unwrap();
            for i in 0..part.nrows() {
                assert_eq!(part.x[(i, 0)], part.y[i]);
                assert_eq!(tasks[i] as i32, part.y[i] * 10);
            }
        }
    }

    #[test]
    fn test_dataset_train_test_split_rejects_bad_size() {
        let x = DMatrix::from_row_slice(2, 1, &[1.0, 2.0]);
        let y = DVector::from_vec(vec![0, 1]);
        let dataset = Dataset::new(x, y);
        assert!(dataset.train_test_split(1.5, None).is_err());
    }
}

use std::cmp::Ordering;
use std::collections::HashSet;

use nalgebra::{DMatrix, DVector};

use crate::data::dataset::WholeNumber;
use crate::error::ForestError;

/// Confusion counts with the sorted class list labelling rows (true) and columns (predicted).
pub struct ConfusionMatrix<T: WholeNumber> {
    pub classes: Vec<T>,
    pub counts: DMatrix<usize>,
}

pub trait ClassificationMetrics<T: WholeNumber> {
    /// Counts (true, predicted) label pairs.
    ///
    /// # Errors
    ///
    /// Returns `ForestError::DimensionMismatch` if the vectors differ in length.
    fn confusion_matrix(
        &self,
        y_true: &DVector<T>,
        y_pred: &DVector<T>,
    ) -> Result<ConfusionMatrix<T>, ForestError> {
        check_lengths(y_true, y_pred)?;

        let seen: HashSet<T> = y_true.iter().chain(y_pred.iter()).copied().collect();
        let mut classes: Vec<T> = seen.into_iter().collect();
        classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

        let position = |label: &T| classes.iter().position(|class| class == label).unwrap_or(0);
        let mut counts = DMatrix::zeros(classes.len(), classes.len());
        for (truth, prediction) in y_true.iter().zip(y_pred.iter()) {
            counts[(position(truth), position(prediction))] += 1;
        }

        Ok(ConfusionMatrix { classes, counts })
    }

    /// Share of predictions equal to the true label.
    fn accuracy(&self, y_true: &DVector<T>, y_pred: &DVector<T>) -> Result<f64, ForestError> {
        check_lengths(y_true, y_pred)?;
        if y_true.is_empty() {
            return Ok(0.0);
        }
        let correct = y_true
            .iter()
            .zip(y_pred.iter())
            .filter(|(truth, prediction)| truth == prediction)
            .count();
        Ok(correct as f64 / y_true.len() as f64)
    }

    /// Share of predictions differing from the true label.
    fn error_rate(&self, y_true: &DVector<T>, y_pred: &DVector<T>) -> Result<f64, ForestError> {
        if y_true.is_empty() && y_pred.is_empty() {
            return Ok(0.0);
        }
        Ok(1.0 - self.accuracy(y_true, y_pred)?)
    }
}

fn check_lengths<T: WholeNumber>(y_true: &DVector<T>, y_pred: &DVector<T>) -> Result<(), ForestError> {
    if y_true.len() != y_pred.len() {
        return Err(ForestError::DimensionMismatch(format!(
            "{} labels against {} predictions",
            y_true.len(),
            y_pred.len()
        )));
    }
    Ok(())
}

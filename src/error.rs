use thiserror::Error;

/// Errors raised while configuring, training or querying a forest.
#[derive(Debug, Error)]
pub enum ForestError {
    /// A hyperparameter is outside of its allowed range.
    #[error("Invalid value for `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    /// Matrix, label and task arrays disagree in size.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
    /// The training set has no rows or no features.
    #[error("The dataset is empty.")]
    EmptyDataset,
    /// Prediction was requested before `fit`.
    #[error("The forest wasn't trained yet.")]
    NotFitted,
    /// The dedicated worker pool could not be created.
    #[error("Failed to build the thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl ForestError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ForestError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

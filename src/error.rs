use thiserror::Error;

/// Errors returned by clustering algorithms in this crate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Invalid parameter value.
    #[error("invalid parameter {name}: {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Human-readable explanation.
        message: &'static str,
    },

    /// Input matrix has no rows.
    #[error("empty input")]
    EmptyInput,

    /// Input rows have no columns.
    #[error("input rows have zero features")]
    ZeroDimension,

    /// Rows in a dataset have inconsistent dimensionality.
    #[error("dimension mismatch at row {row}: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Offending row.
        row: usize,
        /// Expected dimensionality.
        expected: usize,
        /// Found dimensionality.
        found: usize,
    },

    /// A value is NaN or infinite.
    #[error("non-finite value at row {row}, column {col}")]
    NonFinite {
        /// Offending row.
        row: usize,
        /// Offending column.
        col: usize,
    },

    /// Requested cluster count is incompatible with the dataset.
    #[error("invalid cluster count: requested {requested}, but dataset has {n_items} items")]
    InvalidClusterCount {
        /// Requested number of clusters.
        requested: usize,
        /// Number of items in the dataset.
        n_items: usize,
    },

    /// `predict` was called on a model that has never been fitted.
    #[error("model is not fitted")]
    NotFitted,
}

/// Broad failure category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A parameter value is out of range.
    Configuration,
    /// The sample matrix is malformed or incompatible with the parameters.
    InvalidInput,
    /// The model has no fitted state.
    NotFitted,
}

impl Error {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidParameter { .. } => ErrorKind::Configuration,
            Error::EmptyInput
            | Error::ZeroDimension
            | Error::DimensionMismatch { .. }
            | Error::NonFinite { .. }
            | Error::InvalidClusterCount { .. } => ErrorKind::InvalidInput,
            Error::NotFitted => ErrorKind::NotFitted,
        }
    }
}

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, Error>;

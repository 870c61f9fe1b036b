//! Error type shared by the network, the histogram distribution, and the
//! runtime helpers.

use thiserror::Error;

/// Unified error for DDR construction, evaluation, and persistence.
#[derive(Error, Debug)]
pub enum DdrError {
    /// Cutpoints are too few, non-finite, or not strictly increasing.
    #[error("invalid cutpoints: {0}")]
    InvalidCutpoints(String),

    /// A structural size (p, hidden_size, num_hidden_layers) is zero.
    #[error("invalid dimension: {name} must be positive, got {value}")]
    InvalidDimension { name: &'static str, value: usize },

    /// Dropout rate outside [0, 1).
    #[error("invalid dropout rate {0}: must lie in [0, 1)")]
    InvalidDropoutRate(f32),

    /// A batch with zero rows.
    #[error("empty batch: at least one row is required")]
    EmptyBatch,

    /// An array does not have the shape the operation requires.
    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: String,
        actual: String,
    },

    /// A feature value is NaN or infinite.
    #[error("non-finite input at row {row}, column {col}: {value}")]
    NonFiniteInput { row: usize, col: usize, value: f32 },

    /// Bin probabilities do not form a categorical distribution.
    #[error("invalid bin probabilities in row {row}: {reason}")]
    InvalidProbabilities { row: usize, reason: String },

    /// Quantile level outside [0, 1].
    #[error("invalid quantile level {0}: must lie in [0, 1]")]
    InvalidQuantile(f32),

    /// The requested compute device has no backend in this build or host.
    #[error("device {0} is not available")]
    DeviceUnavailable(String),

    /// Ensemble members disagree on cutpoints or input dimension.
    #[error("invalid ensemble: {0}")]
    InvalidEnsemble(String),

    /// The global worker pool could not be configured.
    #[error("thread pool error: {0}")]
    ThreadPool(String),

    /// A checkpoint decoded but its contents are inconsistent.
    #[error("corrupt checkpoint: {0}")]
    CorruptCheckpoint(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

/// Result alias used across the crate.
pub type DdrResult<T> = std::result::Result<T, DdrError>;

impl DdrError {
    pub(crate) fn shape(
        context: &'static str,
        expected: impl std::fmt::Display,
        actual: impl std::fmt::Display,
    ) -> Self {
        DdrError::ShapeMismatch {
            context,
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_message() {
        let err = DdrError::shape("forward", "(N, 3)", "(2, 4)");
        assert_eq!(
            err.to_string(),
            "shape mismatch in forward: expected (N, 3), got (2, 4)"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: DdrError = io.into();
        assert!(matches!(err, DdrError::Io(_)));
    }
}

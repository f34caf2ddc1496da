/// Crate-level error type for the entrain spectral estimation library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input array rank is not one of the accepted layouts.
    #[error("invalid shape: expected {expected}, got {got}")]
    InvalidShape { expected: &'static str, got: String },

    /// Invalid parameter value.
    #[error("invalid parameter `{name}`: got {value}, {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// Frequency band of interest is invalid.
    #[error("invalid frequency range: low={low}, high={high} ({reason})")]
    InvalidFrequencyRange { low: f64, high: f64, reason: String },

    /// A required dimension is zero or otherwise unusable.
    #[error("invalid size for `{name}`: {value} ({reason})")]
    InvalidSize {
        name: &'static str,
        value: usize,
        reason: &'static str,
    },

    /// Bootstrap driver received an unrecognized estimator tag.
    #[error("unknown estimator `{0}` (expected one of: cpca, plv, itc, spec)")]
    UnknownEstimator(String),
}

/// Convenience Result type for entrain operations.
pub type Result<T> = std::result::Result<T, Error>;

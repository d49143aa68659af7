//! Error types.
//!
//! Two layers:
//!
//! - `T1Error`: library errors raised by evaluation, fitting, and dataset loading
//! - `AppError`: what the binary reports (a message plus a process exit code)
//!
//! Exit codes:
//! - `2` invalid input or parameters
//! - `3` dataset / data errors
//! - `4` fit failures

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for library operations.
pub type Result<T> = std::result::Result<T, T1Error>;

/// Errors raised by the evaluator, the fitters, and the dataset loader.
#[derive(Debug, Error)]
pub enum T1Error {
    #[error("Invalid parameter `{name}` = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("Acquisition protocol has no sample points.")]
    EmptyProtocol,

    #[error("Signal length {actual} does not match protocol length {expected}.")]
    LengthMismatch { expected: usize, actual: usize },

    #[error(
        "Long-TR approximation is not valid: TR={tr_ms:.1}ms is shorter than {factor}×T1 (T1≈{t1_ms:.1}ms)."
    )]
    ApproximationInvalid { tr_ms: f64, t1_ms: f64, factor: f64 },

    #[error("Fit did not converge within {iterations} iterations (cost={cost:.3e}).")]
    FitNotConverged { iterations: usize, cost: f64 },

    #[error("Fit failed: {reason}")]
    FitFailed { reason: String },

    #[error("Failed to read dataset '{}': {source}", path.display())]
    DatasetIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed dataset '{}': {reason}", path.display())]
    DatasetMalformed { path: PathBuf, reason: String },

    #[error("Inconsistent dataset shape: {reason}")]
    DatasetShape { reason: String },
}

impl T1Error {
    pub(crate) fn invalid(name: &'static str, value: f64, reason: &'static str) -> Self {
        T1Error::InvalidParameter {
            name,
            value,
            reason,
        }
    }

    pub(crate) fn fit_failed(reason: impl Into<String>) -> Self {
        T1Error::FitFailed {
            reason: reason.into(),
        }
    }

    /// Exit code used when this error reaches the binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            T1Error::InvalidParameter { .. }
            | T1Error::EmptyProtocol
            | T1Error::LengthMismatch { .. } => 2,
            T1Error::DatasetIo { .. } | T1Error::DatasetMalformed { .. } | T1Error::DatasetShape { .. } => 3,
            T1Error::ApproximationInvalid { .. }
            | T1Error::FitNotConverged { .. }
            | T1Error::FitFailed { .. } => 4,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<T1Error> for AppError {
    fn from(err: T1Error) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        assert_eq!(T1Error::EmptyProtocol.exit_code(), 2);
        assert_eq!(
            T1Error::FitNotConverged {
                iterations: 3,
                cost: 1.0
            }
            .exit_code(),
            4
        );
        let app: AppError = T1Error::DatasetMalformed {
            path: PathBuf::from("x.json"),
            reason: "bad".to_string(),
        }
        .into();
        assert_eq!(app.exit_code(), 3);
        assert!(app.to_string().contains("x.json"));
    }
}

//! Error types for the optimization engine
//!
//! Every failure aborts the run and is returned to the caller unchanged.
//! [`ErrorKind`] groups the variants into configuration, numerical and
//! capability failures.

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, OptimError>;

/// Boxed error raised by an injected capability (step, cost, reducer, denoiser)
pub type CapabilityError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Coarse classification of an [`OptimError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Numerical,
    Capability,
}

#[derive(Debug, Error)]
pub enum OptimError {
    #[error("convergence criterion '{0}' not implemented (expected 'residual' or 'cost')")]
    UnknownCriterion(String),

    #[error("unknown algorithm '{0}' (expected 'GD', 'PGD' or 'HQS')")]
    UnknownAlgorithm(String),

    #[error("parameter '{name}' has {len} values, expected 1 or max_iter={max_iter}")]
    ScheduleLength {
        name: String,
        len: usize,
        max_iter: usize,
    },

    #[error("parameter '{0}' is not configured")]
    MissingParameter(String),

    #[error("{0} requires a cost function")]
    MissingCostFunction(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read config file: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("anderson system is singular at iteration {iteration} (batch element {batch})")]
    SingularSystem { iteration: usize, batch: usize },

    #[error("non-finite value produced at iteration {iteration}: {what}")]
    NonFinite { iteration: usize, what: &'static str },

    #[error("shape mismatch in {context}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        context: &'static str,
        expected: (usize, usize),
        got: (usize, usize),
    },

    #[error("iterator step changed estimate arity from {expected} to {got}")]
    ArityMismatch { expected: usize, got: usize },

    #[error("{0}")]
    Capability(#[source] CapabilityError),
}

impl OptimError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OptimError::UnknownCriterion(_)
            | OptimError::UnknownAlgorithm(_)
            | OptimError::ScheduleLength { .. }
            | OptimError::MissingParameter(_)
            | OptimError::MissingCostFunction(_)
            | OptimError::InvalidConfig(_)
            | OptimError::ConfigIo(_)
            | OptimError::ConfigParse(_) => ErrorKind::Configuration,
            OptimError::SingularSystem { .. } | OptimError::NonFinite { .. } => ErrorKind::Numerical,
            OptimError::ShapeMismatch { .. }
            | OptimError::ArityMismatch { .. }
            | OptimError::Capability(_) => ErrorKind::Capability,
        }
    }

    /// Wrap an arbitrary error raised inside an injected capability
    pub fn capability<E>(err: E) -> Self
    where
        E: Into<CapabilityError>,
    {
        OptimError::Capability(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(OptimError::UnknownCriterion("foo".into()).kind(), ErrorKind::Configuration);
        assert_eq!(
            OptimError::SingularSystem { iteration: 3, batch: 0 }.kind(),
            ErrorKind::Numerical
        );
        assert_eq!(OptimError::capability("denoiser exploded").kind(), ErrorKind::Capability);
    }

    #[test]
    fn test_schedule_length_message() {
        let err = OptimError::ScheduleLength { name: "stepsize".into(), len: 3, max_iter: 10 };
        assert_eq!(
            err.to_string(),
            "parameter 'stepsize' has 3 values, expected 1 or max_iter=10"
        );
    }
}

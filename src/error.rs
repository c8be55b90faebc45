use thiserror::Error;

/// Errors that happen when we evaluate a log density.
pub trait LogpError: std::error::Error {
    /// Unrecoverable errors stop the calling algorithm, recoverable errors
    /// should be treated as a rejected candidate (a log density of `-inf`).
    fn is_recoverable(&self) -> bool;
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Shape mismatch for {what}: expected length {expected}, got {found}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        found: usize,
    },
    #[error("Field mismatch: expected fields {expected:?}, got {found:?}")]
    FieldMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error(
        "Model parameters do not match the stored forward problem (distance {distance}, tolerance {tolerance})"
    )]
    ParameterMismatch { distance: f64, tolerance: f64 },
    #[error("Unknown attribute `{0}` on inference problem or forward problem")]
    UnknownAttribute(String),
    #[error("Duplicate likelihood name `{0}`")]
    DuplicateLikelihood(String),
    #[error("Duplicate parameter component `{0}`")]
    DuplicateComponent(String),
    #[error("Forward solve requested but no forward solver is configured")]
    NoForwardSolver,
    #[error("No simulator output available for likelihood `{0}`")]
    MissingObservable(String),
    #[error("Forward solve failed")]
    ForwardSolve {
        recoverable: bool,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("Invalid distribution parameters: {0}")]
    InvalidDistribution(String),
}

pub type Result<T> = std::result::Result<T, InferenceError>;

impl InferenceError {
    /// Wrap an error returned by a forward solver.
    pub fn forward_solve<E>(err: E) -> Self
    where
        E: LogpError + Send + Sync + 'static,
    {
        InferenceError::ForwardSolve {
            recoverable: err.is_recoverable(),
            source: Box::new(err),
        }
    }
}

impl LogpError for InferenceError {
    fn is_recoverable(&self) -> bool {
        match self {
            InferenceError::ForwardSolve { recoverable, .. } => *recoverable,
            InferenceError::InvalidDistribution(_) => true,
            _ => false,
        }
    }
}

pub(crate) fn check_len(what: &str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(InferenceError::ShapeMismatch {
            what: what.to_string(),
            expected,
            found,
        });
    }
    Ok(())
}

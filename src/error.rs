use thiserror::Error;

/// Fatal conditions detected by the analyzer or devirtualizer.
///
/// These are programmer errors, not recoverable runtime conditions: the
/// public entry point (`crate::rta_optimization`) turns every `Err` into a
/// panic at the point of detection. Internal functions still return
/// `Result<_, RtaError>` so tests can assert on the exact variant.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RtaError {
    #[error("precondition violated: {0}")]
    PreconditionViolated(&'static str),

    #[error("invariant violated: {0}")]
    InvariantViolated(&'static str),

    #[error("ambiguous inherited implementation for call entity")]
    AmbiguousImplementation,
}

pub type Result<T> = std::result::Result<T, RtaError>;

//! Construction and addressing error types.

use thiserror::Error;

/// Errors raised while declaring parameters or building a search space.
///
/// These are always programming errors in the tuning setup; they are
/// never raised once tuning has started.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Two parameters share one name
    #[error("duplicate parameter name: {0}")]
    DuplicateParameterName(String),

    /// A constraint does not list its own parameter as a dependency
    #[error("constraint for parameter {0} has to take at least itself as a dependency")]
    ConstraintMissingSelf(String),

    /// A constraint references parameters declared later (or never)
    #[error("constraint for parameter {name} references parameters that have not yet been declared: {undeclared}")]
    UndeclaredConstraintReference { name: String, undeclared: String },

    /// Two constraints reference each other, directly or transitively
    #[error("circular constraint between parameters {0} and {1}")]
    CircularConstraint(String, String),

    /// Interval step of zero
    #[error("invalid interval: expecting step != 0")]
    ZeroStep,
}

/// Errors raised when addressing into a built search space.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// The search space has no feasible configuration
    #[error("search space does not contain any configurations")]
    EmptySearchSpace,

    /// Wrong coordinate count for this space
    #[error("expecting {expected} coordinates, got {got}")]
    WrongDimensionality { expected: usize, got: usize },

    /// A coordinate fell outside (0,1]
    #[error("expecting all coordinates to be in (0,1], got {0}")]
    CoordinateOutOfRange(f64),

    /// An index fell outside [0, constrained size)
    #[error("expecting index in range [0,{size}), got {index}")]
    IndexOutOfRange { index: u64, size: u64 },

    /// Index addressing was requested on a space built without it
    #[error("search space can only be addressed by index if it was built with index access enabled")]
    IndexAccessDisabled,

    /// Range access past the end
    #[error("range index out of bounds: {0}")]
    RangeIndexOutOfBounds(u64),
}

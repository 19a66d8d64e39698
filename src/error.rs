// src/error.rs

//! Error types for the qndiag crate.

use thiserror::Error;

/// Errors raised while validating the inputs of a joint diagonalization.
///
/// Every variant is produced before the first iteration. Numerical trouble
/// during the optimization itself is handled by regularization and never
/// surfaces here.
#[derive(Debug, Clone, Error)]
pub enum QndiagError {
    /// The matrix stack does not have the shape `(n, p, p)`.
    #[error("{message}")]
    Shape {
        /// Description of the shape error.
        message: String,
    },

    /// A matrix of the stack is not symmetric within tolerance.
    #[error("only symmetric matrices supported (matrix {index} is not symmetric)")]
    Symmetry {
        /// Position of the offending matrix in the stack.
        index: usize,
    },

    /// A matrix of the stack fails the positivity check.
    #[error("matrices must be positive (matrix {index}: {reason})")]
    Positivity {
        /// Position of the offending matrix in the stack.
        index: usize,
        /// What the check found.
        reason: String,
    },

    /// Weights or starting point do not match the stack dimensions.
    #[error("Invalid dimensions: {message}")]
    InvalidDimensions {
        /// Description of the dimension error.
        message: String,
    },

    /// The starting diagonalizer is singular.
    #[error("Singular matrix encountered: {message}")]
    SingularMatrix {
        /// Where the singular matrix was found.
        message: String,
    },

    /// Non-finite values in the inputs.
    #[error("Computation error: {message}")]
    Computation {
        /// Description of what went wrong.
        message: String,
    },

    /// Invalid configuration parameter.
    #[error("Invalid configuration for '{parameter}': {message}")]
    InvalidConfig {
        /// Name of the invalid parameter.
        parameter: String,
        /// Description of why it's invalid.
        message: String,
    },
}

/// Convenience type alias for Results with QndiagError.
pub type Result<T> = std::result::Result<T, QndiagError>;

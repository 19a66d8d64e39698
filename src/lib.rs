// src/lib.rs

//! # qndiag
//!
//! Approximate joint diagonalization of symmetric positive matrices with a
//! quasi-Newton method.
//!
//! Given matrices `C_1, …, C_n` of size `p × p`, find `B` such that every
//! `B C_i Bᵗ` is as diagonal as possible. This implements the algorithm of:
//!
//! > Pierre Ablin, Jean-François Cardoso, Alexandre Gramfort.
//! > "Beyond Pham's algorithm for joint diagonalization"
//! > ESANN, 2019
//!
//! The Hessian of the criterion is approximated by independent 2×2 blocks,
//! one per pair of rows of `B`, so each quasi-Newton step costs about as much
//! as a gradient evaluation.
//!
//! ## Example
//!
//! ```rust,no_run
//! use ndarray::Array3;
//! use qndiag::{Qndiag, QndiagConfig};
//!
//! # fn main() -> Result<(), qndiag::QndiagError> {
//! // Stack of n symmetric positive matrices, shape (n, p, p)
//! let mut c = Array3::<f64>::zeros((10, 3, 3));
//! for mut ci in c.outer_iter_mut() {
//!     ci.diag_mut().fill(1.0);
//! }
//!
//! // Diagonalize with default settings
//! let result = Qndiag::fit(&c)?;
//!
//! // Or with custom configuration
//! let config = QndiagConfig::builder()
//!     .ortho(true)
//!     .tol(1e-8)
//!     .max_iter(200)
//!     .build();
//! let result = Qndiag::fit_with_config(&c, &config)?;
//!
//! let b = &result.diagonalizer;
//! let losses = &result.trace;
//! # Ok(())
//! # }
//! ```

mod config;
mod core;
mod error;
mod hessian;
mod math;
mod objective;
mod result;
mod solver;
mod validation;

pub use config::{ConfigBuilder, Initialization, PositivityCheck, QndiagConfig};
pub use error::{QndiagError, Result};
pub use objective::transform_set;
pub use result::{QndiagResult, Status};
pub use solver::{qndiag, Qndiag};
pub use validation::validate_stack;

// Utility functions
pub mod utils;

// Re-export ndarray for convenience
pub use ndarray;

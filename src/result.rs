//! Result types for the joint diagonalization.

use crate::objective::transform_set;
use ndarray::{Array2, Array3, ArrayView3};

/// Terminal state of the iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// The gradient norm fell below the tolerance.
    Converged,
    /// The iteration budget ran out first. The last iterate is returned.
    MaxIterReached,
    /// Neither the quasi-Newton step nor the gradient fallback decreased the
    /// loss. The last iterate is returned.
    Stalled,
}

/// Result of a joint diagonalization.
#[derive(Debug, Clone)]
pub struct QndiagResult {
    /// Diagonalizer B (p × p).
    pub diagonalizer: Array2<f64>,

    /// Loss at the starting point followed by the loss after every accepted
    /// iteration. Non-increasing up to rounding.
    pub trace: Vec<f64>,

    /// Gradient norm measured at the start of every iteration, plus the final
    /// one that triggered termination.
    pub gradient_norms: Vec<f64>,

    /// Number of accepted iterations.
    pub n_iterations: usize,

    /// How the iteration ended.
    pub status: Status,

    /// Every accepted diagonalizer, starting point included.
    /// None unless `track_history` was set.
    pub history: Option<Vec<Array2<f64>>>,
}

impl QndiagResult {
    /// Whether the tolerance was met.
    pub fn converged(&self) -> bool {
        self.status == Status::Converged
    }

    /// Final gradient norm.
    pub fn gradient_norm(&self) -> f64 {
        self.gradient_norms.last().copied().unwrap_or(f64::NAN)
    }

    /// Final loss.
    pub fn loss(&self) -> f64 {
        self.trace.last().copied().unwrap_or(f64::NAN)
    }

    /// Apply the diagonalizer to a stack: `B C_i Bᵗ` for every `C_i`.
    pub fn transform(&self, c: ArrayView3<'_, f64>) -> Array3<f64> {
        transform_set(&self.diagonalizer, c)
    }

    /// Off-diagonal energy of the transformed stack relative to its total
    /// energy, after normalizing each matrix to unit diagonal.
    ///
    /// Zero for an exact joint diagonalizer.
    pub fn off_diagonal_ratio(&self, c: ArrayView3<'_, f64>) -> f64 {
        let d = self.transform(c);
        let mut off = 0.0;
        let mut total = 0.0;
        for di in d.outer_iter() {
            let p = di.nrows();
            for k in 0..p {
                for j in 0..p {
                    let v = di[[k, j]] / (di[[k, k]] * di[[j, j]]).sqrt();
                    total += v * v;
                    if k != j {
                        off += v * v;
                    }
                }
            }
        }
        off / total
    }
}

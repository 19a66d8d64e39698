// src/solver.rs

//! Main joint diagonalization interface.

use crate::config::{Initialization, QndiagConfig};
use crate::core;
use crate::error::{QndiagError, Result};
use crate::math::{log_abs_det, sym_decorrelation, whitener};
use crate::objective::normalized_weights;
use crate::result::{QndiagResult, Status};
use crate::validation::validate_stack;

use ndarray::{Array1, Array2, ArrayBase, ArrayView3, Axis, Data, Dimension};

/// The quasi-Newton joint diagonalization solver.
///
/// This struct provides static methods for diagonalizing matrix stacks.
pub struct Qndiag;

impl Qndiag {
    /// Jointly diagonalize a stack with default configuration.
    ///
    /// # Arguments
    /// * `c` - Stack of symmetric positive matrices of shape (n, p, p)
    ///
    /// # Returns
    /// * `QndiagResult` containing the diagonalizer and convergence trace
    pub fn fit<S, D>(c: &ArrayBase<S, D>) -> Result<QndiagResult>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        Self::fit_with_config(c, &QndiagConfig::default())
    }

    /// Jointly diagonalize a stack with custom configuration.
    ///
    /// All input errors are reported before the first iteration. Running
    /// out of iterations is not an error: check [`QndiagResult::status`].
    ///
    /// # Arguments
    /// * `c` - Stack of symmetric positive matrices of shape (n, p, p)
    /// * `config` - Algorithm configuration
    pub fn fit_with_config<S, D>(c: &ArrayBase<S, D>, config: &QndiagConfig) -> Result<QndiagResult>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        config.validate()?;
        let stack = validate_stack(c, config)?;
        let (n, p, _) = stack.dim();

        let weights = normalized_weights(config.weights.as_ref(), n);
        let b_init = initial_diagonalizer(stack, &weights, config)?;

        if config.verbose {
            log::info!(
                "Running qndiag on {} matrices of size {}x{} (ortho = {})",
                n,
                p,
                p,
                config.ortho
            );
        }

        let (b, info) = core::run(stack, b_init, &weights, config);

        match info.status {
            Status::Converged => {}
            status => {
                let g_norm = info.gradient_norms.last().copied().unwrap_or(f64::NAN);
                if config.verbose {
                    log::warn!(
                        "qndiag did not converge ({:?}) after {} iterations. \
                         Final gradient norm: {:.4e}, tolerance: {:.4e}",
                        status,
                        info.n_iterations,
                        g_norm,
                        config.tol
                    );
                } else {
                    log::debug!("qndiag stopped with {:?}, gradient norm {:.4e}", status, g_norm);
                }
            }
        }

        Ok(QndiagResult {
            diagonalizer: b,
            trace: info.trace,
            gradient_norms: info.gradient_norms,
            n_iterations: info.n_iterations,
            status: info.status,
            history: info.history,
        })
    }
}

/// Jointly diagonalize a stack and return `(B, trace)`.
///
/// Shorthand for [`Qndiag::fit_with_config`] when only the diagonalizer and
/// the loss trace are needed.
pub fn qndiag<S, D>(c: &ArrayBase<S, D>, config: &QndiagConfig) -> Result<(Array2<f64>, Vec<f64>)>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let result = Qndiag::fit_with_config(c, config)?;
    Ok((result.diagonalizer, result.trace))
}

/// Pick the starting point and move it to the feasible set.
fn initial_diagonalizer(
    c: ArrayView3<'_, f64>,
    weights: &Array1<f64>,
    config: &QndiagConfig,
) -> Result<Array2<f64>> {
    let p = c.dim().1;

    let b = match (&config.b_init, config.init) {
        (Some(b), _) => b.clone(),
        (None, Initialization::Identity) => Array2::eye(p),
        (None, Initialization::Whitening) => {
            let mut mean = Array2::<f64>::zeros((p, p));
            for (ci, &w) in c.axis_iter(Axis(0)).zip(weights.iter()) {
                mean.scaled_add(w, &ci);
            }
            whitener(&mean)?
        }
    };

    if config.ortho {
        return sym_decorrelation(&b);
    }

    if log_abs_det(&b).is_none() {
        return Err(QndiagError::SingularMatrix {
            message: "the initial diagonalizer is singular".into(),
        });
    }

    Ok(b)
}

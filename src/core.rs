// src/core.rs

//! Core quasi-Newton iteration.

use crate::config::QndiagConfig;
use crate::hessian::{hessian_coefficients, newton_direction, ortho_direction};
use crate::math::{expm_skew, sym_decorrelation};
use crate::objective::{
    compute_gradient, compute_loss, transform_set, transformed_diagonals, Transformed,
};
use crate::result::Status;
use ndarray::{Array1, Array2, ArrayView3};

/// Information returned from the core iteration.
pub struct CoreInfo {
    /// How the iteration ended.
    pub status: Status,
    /// Number of accepted iterations.
    pub n_iterations: usize,
    /// Loss at the start and after every accepted iteration.
    pub trace: Vec<f64>,
    /// Gradient norm at every check.
    pub gradient_norms: Vec<f64>,
    /// Accepted iterates, if requested.
    pub history: Option<Vec<Array2<f64>>>,
}

/// Result of line search.
pub struct LineSearchResult {
    /// Accepted diagonalizer.
    pub b: Array2<f64>,
    /// Stack transformed by the accepted diagonalizer.
    pub transformed: Transformed,
    /// Loss at the accepted diagonalizer.
    pub loss: f64,
    /// Accepted step size `alpha`.
    pub step: f64,
}

/// Frobenius norm of `g`.
pub fn gradient_norm(g: &Array2<f64>) -> f64 {
    g.mapv(|v| v * v).sum().sqrt()
}

/// Loss differences below this level are rounding noise.
fn loss_slack(loss: f64) -> f64 {
    64.0 * f64::EPSILON * loss.abs().max(1.0)
}

/// Perform backtracking line search along `direction`.
///
/// The candidate for step `alpha` is `(I + alpha Δ) B`, or
/// `expm(alpha Δ) B` retracted onto the orthogonal group when `ortho` is
/// set. Candidates are scored from the diagonals of the transformed stack
/// only; the full stack is recomputed for the accepted one. `slope` is the
/// directional derivative `⟨G, Δ⟩`.
pub fn line_search(
    c: ArrayView3<'_, f64>,
    b: &Array2<f64>,
    current: &Transformed,
    direction: &Array2<f64>,
    slope: f64,
    current_loss: f64,
    weights: &Array1<f64>,
    config: &QndiagConfig,
) -> Option<LineSearchResult> {
    let p = b.nrows();
    let slack = loss_slack(current_loss);
    let mut alpha = 1.0;

    for _ in 0..config.ls_tries {
        let step = direction * alpha;
        let m = if config.ortho {
            expm_skew(&step)
        } else {
            &Array2::<f64>::eye(p) + &step
        };

        let new_b = m.dot(b);
        let candidate_diagonals = transformed_diagonals(&m, &current.d);
        let candidate_loss = compute_loss(&new_b, &candidate_diagonals, weights, config.ortho);
        let threshold = current_loss + config.armijo * alpha * slope + slack;

        if candidate_loss.is_finite() && candidate_loss <= threshold {
            let accepted = if config.ortho {
                sym_decorrelation(&new_b)
                    .ok()
                    .map(|retracted| {
                        let transformed = Transformed::new(&retracted, c);
                        (retracted, transformed)
                    })
            } else {
                let d = transform_set(&m, current.d.view());
                let diagonals = crate::objective::diagonals(&d);
                Some((new_b, Transformed { d, diagonals }))
            };

            if let Some((new_b, transformed)) = accepted {
                let loss = compute_loss(&new_b, &transformed.diagonals, weights, config.ortho);
                return Some(LineSearchResult {
                    b: new_b,
                    transformed,
                    loss,
                    step: alpha,
                });
            }
        }

        alpha /= 2.0;
    }

    None
}

/// Search along the quasi-Newton `direction`, then along the scaled
/// negative gradient if no step was accepted.
///
/// Under `ortho` the gradient step uses `G - Gᵗ` so that it stays skew.
pub fn descend(
    c: ArrayView3<'_, f64>,
    b: &Array2<f64>,
    current: &Transformed,
    g: &Array2<f64>,
    direction: &Array2<f64>,
    current_loss: f64,
    weights: &Array1<f64>,
    config: &QndiagConfig,
) -> Option<LineSearchResult> {
    let slope = (g * direction).sum();
    let result = line_search(c, b, current, direction, slope, current_loss, weights, config);
    if result.is_some() {
        return result;
    }

    log::debug!("quasi-Newton step rejected, trying a gradient step");
    let descent = if config.ortho { g - &g.t() } else { g.clone() };
    let fallback = descent * -config.fallback_step;
    let fallback_slope = (g * &fallback).sum();
    line_search(c, b, current, &fallback, fallback_slope, current_loss, weights, config)
}

/// Run the quasi-Newton iteration from the starting point `b`.
///
/// `c` must have been validated and `weights` normalized to sum to one.
/// Under `ortho`, `b` must already be orthogonal.
pub fn run(
    c: ArrayView3<'_, f64>,
    b: Array2<f64>,
    weights: &Array1<f64>,
    config: &QndiagConfig,
) -> (Array2<f64>, CoreInfo) {
    let p = b.nrows();
    let threshold = config.tol * (p as f64).sqrt();

    let mut b = b;
    let mut transformed = Transformed::new(&b, c);
    let mut current_loss = compute_loss(&b, &transformed.diagonals, weights, config.ortho);

    let mut trace = vec![current_loss];
    let mut gradient_norms = Vec::new();
    let mut history = config.track_history.then(|| vec![b.clone()]);
    let mut n_iter = 0;

    let status = loop {
        let g = compute_gradient(&transformed, weights);

        let g_norm = if config.ortho {
            gradient_norm(&(&g - &g.t()))
        } else {
            gradient_norm(&g)
        };
        gradient_norms.push(g_norm);

        if config.verbose {
            log::info!(
                "iteration {}, gradient norm = {:.4e}, loss = {:.4e}",
                n_iter,
                g_norm,
                current_loss
            );
        } else {
            log::trace!(
                "iteration {}, gradient norm = {:.4e}, loss = {:.4e}",
                n_iter,
                g_norm,
                current_loss
            );
        }

        if g_norm < threshold {
            break Status::Converged;
        }
        if n_iter == config.max_iter {
            break Status::MaxIterReached;
        }

        let h = hessian_coefficients(&transformed.diagonals, weights, config.hessian_floor);
        let direction = if config.ortho {
            ortho_direction(&g, &h, config.lambda_min)
        } else {
            newton_direction(&g, &h, config.lambda_min)
        };

        let result = descend(
            c,
            &b,
            &transformed,
            &g,
            &direction,
            current_loss,
            weights,
            config,
        );

        let Some(result) = result else {
            log::warn!(
                "iteration {}: no step decreases the loss, stopping with gradient norm {:.4e}",
                n_iter + 1,
                g_norm
            );
            break Status::Stalled;
        };

        b = result.b;
        transformed = result.transformed;
        current_loss = result.loss;
        n_iter += 1;

        trace.push(current_loss);
        if let Some(history) = history.as_mut() {
            history.push(b.clone());
        }

        log::debug!("iteration {} accepted with step {:.2e}", n_iter, result.step);
    };

    let info = CoreInfo {
        status,
        n_iterations: n_iter,
        trace,
        gradient_norms,
        history,
    };

    (b, info)
}

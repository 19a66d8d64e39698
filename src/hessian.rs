// src/hessian.rs

//! Block-diagonal Hessian approximation and quasi-Newton directions.
//!
//! Near a joint diagonalizer, the Hessian of the criterion with respect to a
//! relative update `B <- (I + E) B` decouples into independent 2×2 blocks,
//! one per unordered pair `(k, j)`:
//!
//! ```text
//! [[h_kj, 1], [1, h_jk]]   acting on   [E_kj, E_jk]
//! ```
//!
//! with `h_kj = Σ_i ŵ_i D_i[j, j] / D_i[k, k]`. Solving each block in closed
//! form gives the Newton direction at the cost of one gradient evaluation.

use ndarray::{Array1, Array2};

/// Compute the Hessian coefficients `h[k, j] = Σ_i ŵ_i d_i[j] / d_i[k]`.
///
/// `diagonals` has shape `(n, p)`. Off-diagonal coefficients smaller than
/// `floor` times the largest one are raised to that level. The diagonal is 1.
pub fn hessian_coefficients(
    diagonals: &Array2<f64>,
    weights: &Array1<f64>,
    floor: f64,
) -> Array2<f64> {
    let p = diagonals.ncols();
    let mut h = Array2::zeros((p, p));

    for (diag, &w) in diagonals.outer_iter().zip(weights.iter()) {
        for k in 0..p {
            for j in 0..p {
                h[[k, j]] += w * diag[j] / diag[k];
            }
        }
    }

    regularize_hessian(&mut h, floor);
    h
}

/// Floor the off-diagonal coefficients at a fraction of the largest one.
///
/// Coefficients are positive by construction; tiny values only appear when
/// some diagonals differ by many orders of magnitude.
pub fn regularize_hessian(h: &mut Array2<f64>, floor: f64) {
    let p = h.nrows();
    let mut largest: f64 = 0.0;
    for k in 0..p {
        for j in 0..p {
            if k != j {
                largest = largest.max(h[[k, j]]);
            }
        }
    }

    let threshold = floor * largest;
    for k in 0..p {
        for j in 0..p {
            if k != j && h[[k, j]] < threshold {
                h[[k, j]] = threshold;
            }
        }
    }
}

/// Quasi-Newton direction for the unconstrained problem.
///
/// For each pair `(k, j)`, solves
/// `[[h[k,j], 1], [1, h[j,k]]] · [x, y]ᵗ = [g[k,j], g[j,k]]ᵗ`
/// and returns `-x, -y` in the corresponding entries. The determinant
/// `h[k,j] h[j,k] - 1` is floored at `lambda_min`, which keeps the direction
/// a descent direction. The diagonal of the result is zero.
pub fn newton_direction(g: &Array2<f64>, h: &Array2<f64>, lambda_min: f64) -> Array2<f64> {
    let p = g.nrows();
    let mut direction = Array2::zeros((p, p));

    for k in 0..p {
        for j in (k + 1)..p {
            let (a, d) = (h[[k, j]], h[[j, k]]);
            let (e, f) = (g[[k, j]], g[[j, k]]);

            let det = (a * d - 1.0).max(lambda_min);

            direction[[k, j]] = -(d * e - f) / det;
            direction[[j, k]] = -(a * f - e) / det;
        }
    }

    direction
}

/// Quasi-Newton direction under the orthogonal constraint.
///
/// Restricted to skew-symmetric updates `E_jk = -E_kj`, each block reduces
/// to the scalar curvature `h[k,j] + h[j,k] - 2`, floored at `lambda_min`.
pub fn ortho_direction(g: &Array2<f64>, h: &Array2<f64>, lambda_min: f64) -> Array2<f64> {
    let p = g.nrows();
    let mut direction = Array2::zeros((p, p));

    for k in 0..p {
        for j in (k + 1)..p {
            let curvature = (h[[k, j]] + h[[j, k]] - 2.0).max(lambda_min);
            let step = -(g[[k, j]] - g[[j, k]]) / curvature;
            direction[[k, j]] = step;
            direction[[j, k]] = -step;
        }
    }

    direction
}

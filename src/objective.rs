// src/objective.rs

//! Joint diagonalization criterion and its relative gradient.
//!
//! For a diagonalizer B and transformed matrices `D_i = B C_i Bᵗ`, the
//! criterion is
//!
//! ```text
//! L(B) = -log|det B| + 1/2 Σ_i ŵ_i Σ_k log D_i[k, k]
//! ```
//!
//! where `ŵ` are the weights normalized to sum to one. By Hadamard's
//! inequality each inner sum is at least `log det D_i`, with equality iff
//! `D_i` is diagonal, so the minimizers are exactly the joint diagonalizers.
//! Under the orthogonal constraint the log-determinant is constant and is
//! dropped.

use crate::math::log_abs_det;
use ndarray::{Array1, Array2, Array3, ArrayView3, Axis, Zip};

/// Transformed stack `D_i = B C_i Bᵗ` along with its diagonals.
#[derive(Clone, Debug)]
pub struct Transformed {
    /// Transformed matrices, shape `(n, p, p)`.
    pub d: Array3<f64>,
    /// Diagonal of every transformed matrix, shape `(n, p)`.
    pub diagonals: Array2<f64>,
}

impl Transformed {
    /// Apply the congruence `C_i -> M C_i Mᵗ` to every matrix of the stack.
    pub fn new(m: &Array2<f64>, c: ArrayView3<'_, f64>) -> Self {
        let d = transform_set(m, c);
        let diagonals = diagonals(&d);
        Self { d, diagonals }
    }
}

/// Apply the congruence `C_i -> M C_i Mᵗ` to every matrix of the stack.
pub fn transform_set(m: &Array2<f64>, c: ArrayView3<'_, f64>) -> Array3<f64> {
    let (n, p, _) = c.dim();
    let mut d = Array3::zeros((n, p, p));
    for (mut out, ci) in d.outer_iter_mut().zip(c.outer_iter()) {
        out.assign(&m.dot(&ci).dot(&m.t()));
    }
    d
}

/// Diagonals of every matrix in the stack, shape `(n, p)`.
pub fn diagonals(d: &Array3<f64>) -> Array2<f64> {
    let (n, p, _) = d.dim();
    Array2::from_shape_fn((n, p), |(i, k)| d[[i, k, k]])
}

/// Diagonals of `M D_i Mᵗ` without forming the full products.
///
/// `(M D Mᵗ)[k, k] = Σ_j (M D)[k, j] M[k, j]`.
pub fn transformed_diagonals(m: &Array2<f64>, d: &Array3<f64>) -> Array2<f64> {
    let (n, p, _) = d.dim();
    let mut out = Array2::zeros((n, p));
    for (mut row, di) in out.outer_iter_mut().zip(d.outer_iter()) {
        let md = m.dot(&di);
        row.assign(&(&md * m).sum_axis(Axis(1)));
    }
    out
}

/// Normalize weights to sum to one. None means uniform weights.
pub fn normalized_weights(weights: Option<&Array1<f64>>, n: usize) -> Array1<f64> {
    match weights {
        Some(w) => w / w.sum(),
        None => Array1::from_elem(n, 1.0 / n as f64),
    }
}

/// Compute the loss function.
///
/// Returns `f64::INFINITY` when B is singular or a diagonal entry is not
/// positive, so that such candidates are always rejected by the line search.
pub fn compute_loss(
    b: &Array2<f64>,
    diagonals: &Array2<f64>,
    weights: &Array1<f64>,
    ortho: bool,
) -> f64 {
    let mut loss = if ortho {
        0.0
    } else {
        match log_abs_det(b) {
            Some(logdet) => -logdet,
            None => return f64::INFINITY,
        }
    };

    for (row, &w) in diagonals.outer_iter().zip(weights.iter()) {
        let mut log_sum = 0.0;
        for &v in row.iter() {
            if !(v > 0.0) {
                return f64::INFINITY;
            }
            log_sum += v.ln();
        }
        loss += 0.5 * w * log_sum;
    }

    loss
}

/// Relative gradient `G = Σ_i ŵ_i D_i / diag(D_i)[:, None] - I`.
///
/// The diagonal of G is zero up to rounding.
pub fn compute_gradient(t: &Transformed, weights: &Array1<f64>) -> Array2<f64> {
    let (_, p, _) = t.d.dim();
    let mut g = Array2::zeros((p, p));

    for ((di, diag), &w) in t
        .d
        .outer_iter()
        .zip(t.diagonals.outer_iter())
        .zip(weights.iter())
    {
        Zip::indexed(&mut g).and(&di).for_each(|(k, _), g_kj, &d_kj| {
            *g_kj += w * d_kj / diag[k];
        });
    }

    for k in 0..p {
        g[[k, k]] -= 1.0;
    }
    g
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn stack() -> Array3<f64> {
        array![
            [[2.0, 0.3, 0.1], [0.3, 1.0, 0.2], [0.1, 0.2, 3.0]],
            [[1.0, -0.4, 0.0], [-0.4, 2.0, 0.5], [0.0, 0.5, 1.5]]
        ]
    }

    #[test]
    fn test_transformed_diagonals_match_full_transform() {
        let c = stack();
        let m = array![[1.0, 0.2, 0.0], [-0.1, 1.0, 0.3], [0.0, 0.4, 1.0]];
        let full = diagonals(&transform_set(&m, c.view()));
        let fast = transformed_diagonals(&m, &c);
        assert_abs_diff_eq!(full, fast, epsilon = 1e-12);
    }

    #[test]
    fn test_gradient_vanishes_on_diagonal_stack() {
        // For a diagonal stack the identity is a stationary point.
        let c = array![[[2.0, 0.0], [0.0, 1.0]], [[0.5, 0.0], [0.0, 3.0]]];
        let w = normalized_weights(None, 2);
        let t = Transformed::new(&Array2::eye(2), c.view());
        let g = compute_gradient(&t, &w);
        assert_abs_diff_eq!(g, Array2::<f64>::zeros((2, 2)), epsilon = 1e-14);
    }

    #[test]
    fn test_loss_value() {
        let c = stack();
        let w = normalized_weights(None, 2);
        let t = Transformed::new(&Array2::eye(3), c.view());
        let expected = 0.5 * 0.5 * ((2.0f64 * 1.0 * 3.0).ln() + (1.0f64 * 2.0 * 1.5).ln());
        assert_abs_diff_eq!(
            compute_loss(&Array2::eye(3), &t.diagonals, &w, false),
            expected,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_loss_is_scale_invariant() {
        // Rescaling the rows of B leaves the criterion unchanged.
        let c = stack();
        let w = normalized_weights(None, 2);
        let b = array![[1.0, 0.2, 0.0], [-0.1, 1.0, 0.3], [0.0, 0.4, 1.0]];
        let scaled = &b * &array![[2.0], [-0.5], [3.0]];

        let l1 = compute_loss(&b, &Transformed::new(&b, c.view()).diagonals, &w, false);
        let l2 = compute_loss(
            &scaled,
            &Transformed::new(&scaled, c.view()).diagonals,
            &w,
            false,
        );
        assert_abs_diff_eq!(l1, l2, epsilon = 1e-12);
    }

    #[test]
    fn test_gradient_matches_finite_differences() {
        let c = stack();
        let w = normalized_weights(Some(&array![1.0, 3.0]), 2);
        let b = array![[1.0, 0.2, 0.0], [-0.1, 1.0, 0.3], [0.0, 0.4, 1.0]];
        let t = Transformed::new(&b, c.view());
        let g = compute_gradient(&t, &w);
        let base = compute_loss(&b, &t.diagonals, &w, false);

        // Relative perturbation B <- (I + eps E_kj) B.
        let eps = 1e-7;
        for k in 0..3 {
            for j in 0..3 {
                let mut m = Array2::<f64>::eye(3);
                m[[k, j]] += eps;
                let nb = m.dot(&b);
                let nl = compute_loss(&nb, &Transformed::new(&nb, c.view()).diagonals, &w, false);
                assert_abs_diff_eq!((nl - base) / eps, g[[k, j]], epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_loss_rejects_singular() {
        let c = stack();
        let w = normalized_weights(None, 2);
        let b = array![[1.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
        let t = Transformed::new(&b, c.view());
        assert_eq!(compute_loss(&b, &t.diagonals, &w, false), f64::INFINITY);
    }
}

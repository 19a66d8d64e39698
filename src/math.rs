// src/math.rs

//! Dense linear algebra helpers.
//!
//! Matrices are stored as `ndarray` arrays throughout the crate; the
//! decompositions are delegated to `faer`.

use crate::error::{QndiagError, Result};
use faer::{Mat, Side};
use ndarray::{Array1, Array2};

/// Copy an `ndarray` matrix into a `faer` matrix.
pub fn to_faer(a: &Array2<f64>) -> Mat<f64> {
    Mat::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

/// Compute `log|det(m)|`.
///
/// Returns None when the matrix is singular or the determinant is not finite.
pub fn log_abs_det(m: &Array2<f64>) -> Option<f64> {
    let det = to_faer(m).determinant();
    if det == 0.0 || !det.is_finite() {
        return None;
    }
    Some(det.abs().ln())
}

/// Eigendecomposition of a symmetric matrix.
///
/// Returns `(eigenvalues, eigenvectors)` with eigenvalues in ascending order
/// and eigenvectors stored as columns.
pub fn sym_eigh(a: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let n = a.nrows();
    let eig = to_faer(a).selfadjoint_eigendecomposition(Side::Lower);
    let u = eig.u();
    let s = eig.s().column_vector();

    let eigenvalues = Array1::from_shape_fn(n, |i| s.read(i));
    let eigenvectors = Array2::from_shape_fn((n, n), |(i, j)| u.read(i, j));
    (eigenvalues, eigenvectors)
}

/// Symmetric decorrelation: W <- (W · W^T)^{-1/2} · W
///
/// This is the polar projection of W onto the orthogonal group.
pub fn sym_decorrelation(w: &Array2<f64>) -> Result<Array2<f64>> {
    let ww_t = w.dot(&w.t());
    let (eigenvalues, eigenvectors) = sym_eigh(&ww_t);

    let min_eigenvalue = eigenvalues.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_eigenvalue = eigenvalues.iter().cloned().fold(0.0, f64::max);
    if !(min_eigenvalue > 1e-12 * max_eigenvalue) {
        return Err(QndiagError::SingularMatrix {
            message: "cannot project a rank deficient matrix onto the orthogonal group".into(),
        });
    }

    let s_inv_sqrt = eigenvalues.mapv(|v| 1.0 / v.sqrt());

    // (U · diag(1/sqrt(s)) · U^T) · W
    let scaled = &eigenvectors * &s_inv_sqrt;
    Ok(scaled.dot(&eigenvectors.t()).dot(w))
}

/// Whitening matrix `Λ^{-1/2} Uᵗ` of a symmetric positive definite matrix.
pub fn whitener(c: &Array2<f64>) -> Result<Array2<f64>> {
    let (eigenvalues, eigenvectors) = sym_eigh(c);

    if eigenvalues.iter().any(|&v| !(v > 0.0)) {
        return Err(QndiagError::SingularMatrix {
            message: "the mean matrix is not positive definite, cannot whiten".into(),
        });
    }

    let mut b = eigenvectors.t().to_owned();
    for (mut row, &v) in b.rows_mut().into_iter().zip(eigenvalues.iter()) {
        row /= v.sqrt();
    }
    Ok(b)
}

/// Degree of the Taylor polynomial used by [`expm_skew`].
const TAYLOR_DEGREE: usize = 16;

/// Exponential of a skew-symmetric matrix.
///
/// The argument is the step `alpha Δ` of an orthogonal update, so the
/// result is a rotation: `exp(A)ᵗ = exp(-A) = exp(A)^{-1}`. `A` is halved
/// until its Frobenius norm is at most 1/2, the Taylor polynomial is summed
/// in Horner form and the result is squared back.
pub fn expm_skew(a: &Array2<f64>) -> Array2<f64> {
    let n = a.nrows();
    let eye = Array2::<f64>::eye(n);

    let norm = a.iter().map(|&x| x * x).sum::<f64>().sqrt();
    if norm == 0.0 {
        return eye;
    }

    let squarings = (2.0 * norm).log2().ceil().max(0.0) as i32;
    let x = a / 2.0_f64.powi(squarings);

    // I + X (I + X/2 (I + X/3 (...)))
    let mut r = eye.clone();
    for k in (1..=TAYLOR_DEGREE).rev() {
        r = &eye + &(x.dot(&r) / k as f64);
    }

    for _ in 0..squarings {
        r = r.dot(&r);
    }
    r
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::orthogonality_error;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_sym_decorrelation() {
        let w = array![[1.0, 0.5], [0.5, 1.0]];
        let w_dec = sym_decorrelation(&w).unwrap();
        assert!(orthogonality_error(&w_dec) < 1e-10);
    }

    #[test]
    fn test_sym_decorrelation_keeps_orthogonal() {
        let (c, s) = (0.3_f64.cos(), 0.3_f64.sin());
        let r = array![[c, -s], [s, c]];
        let projected = sym_decorrelation(&r).unwrap();
        assert_abs_diff_eq!(projected, r, epsilon = 1e-12);
    }

    #[test]
    fn test_sym_decorrelation_singular() {
        let w = array![[1.0, 2.0], [2.0, 4.0]];
        assert!(matches!(
            sym_decorrelation(&w),
            Err(QndiagError::SingularMatrix { .. })
        ));
    }

    #[test]
    fn test_expm_skew_zero() {
        let zero = Array2::<f64>::zeros((3, 3));
        assert_eq!(expm_skew(&zero), Array2::<f64>::eye(3));
    }

    #[test]
    fn test_expm_skew_rotation() {
        let theta: f64 = 2.5;
        let a = array![[0.0, -theta], [theta, 0.0]];
        let expected = array![[theta.cos(), -theta.sin()], [theta.sin(), theta.cos()]];
        assert_abs_diff_eq!(expm_skew(&a), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_expm_skew_is_orthogonal() {
        let a = array![
            [0.0, 1.2, -0.7, 3.1],
            [-1.2, 0.0, 0.4, -2.2],
            [0.7, -0.4, 0.0, 0.9],
            [-3.1, 2.2, -0.9, 0.0]
        ];
        let r = expm_skew(&a);
        assert!(orthogonality_error(&r) < 1e-12);
        assert_abs_diff_eq!(r.dot(&expm_skew(&(-&a))), Array2::<f64>::eye(4), epsilon = 1e-12);
    }

    #[test]
    fn test_log_abs_det() {
        let m = array![[1.0, 2.0], [3.0, 4.0]];
        assert_abs_diff_eq!(log_abs_det(&m).unwrap(), 2.0_f64.ln(), epsilon = 1e-12);

        let singular = array![[1.0, 2.0], [2.0, 4.0]];
        assert!(log_abs_det(&singular).is_none());
    }

    #[test]
    fn test_sym_eigh_reconstructs() {
        let a = array![[2.0, 1.0, 0.0], [1.0, 3.0, 0.5], [0.0, 0.5, 1.0]];
        let (vals, vecs) = sym_eigh(&a);
        assert!(vals[0] <= vals[1] && vals[1] <= vals[2]);
        let rebuilt = (&vecs * &vals).dot(&vecs.t());
        assert_abs_diff_eq!(rebuilt, a, epsilon = 1e-10);
    }

    #[test]
    fn test_whitener() {
        let c = array![[4.0, 1.0], [1.0, 2.0]];
        let b = whitener(&c).unwrap();
        let white = b.dot(&c).dot(&b.t());
        assert_abs_diff_eq!(white, Array2::<f64>::eye(2), epsilon = 1e-10);
    }
}

//! Utilities to assess a diagonalizer against a known mixing matrix.

use ndarray::{Array2, Axis};
use std::cmp::Ordering;

/// Compute the Amari distance of `B · A` to the set of scaled permutations.
///
/// It equals 0 exactly when B undoes the mixing A up to row scaling and
/// permutation, which is all a joint diagonalizer can recover.
///
/// # Arguments
/// * `b` - Diagonalizer
/// * `a` - Mixing matrix
pub fn amari_distance(b: &Array2<f64>, a: &Array2<f64>) -> f64 {
    let m = b.dot(a).mapv(|x| x * x);
    let p = m.nrows() as f64;

    let spread = |axis: Axis| -> f64 {
        m.lanes(axis)
            .into_iter()
            .map(|lane| {
                let total: f64 = lane.sum();
                let peak = lane.fold(0.0_f64, |acc, &x| acc.max(x));
                if peak > 0.0 {
                    total / peak - 1.0
                } else {
                    0.0
                }
            })
            .sum()
    };

    (spread(Axis(1)) + spread(Axis(0))) / (2.0 * p)
}

/// Reduce a near scaled permutation to its pattern.
///
/// Takes absolute values, optionally divides every row by its largest
/// entry, zeroes entries below `threshold`, then sorts the rows in
/// decreasing lexicographic order. For a scaled permutation matrix the
/// output is the identity.
pub fn permutation_pattern(m: &Array2<f64>, threshold: f64, scale_rows: bool) -> Array2<f64> {
    let mut abs = m.mapv(f64::abs);

    if scale_rows {
        for mut row in abs.rows_mut() {
            let peak = row.fold(0.0_f64, |acc, &x| acc.max(x));
            if peak > 0.0 {
                row /= peak;
            }
        }
    }

    abs.mapv_inplace(|x| if x < threshold { 0.0 } else { x });

    let mut rows: Vec<Vec<f64>> = abs.rows().into_iter().map(|r| r.to_vec()).collect();
    rows.sort_by(|x, y| y.partial_cmp(x).unwrap_or(Ordering::Equal));

    let (nrows, ncols) = abs.dim();
    Array2::from_shape_fn((nrows, ncols), |(i, j)| rows[i][j])
}

/// Largest absolute deviation of `a · aᵗ` from the identity.
///
/// Zero for an orthogonal matrix.
pub fn orthogonality_error(a: &Array2<f64>) -> f64 {
    let aat = a.dot(&a.t());
    let n = a.nrows();
    let mut err: f64 = 0.0;
    for i in 0..n {
        for j in 0..n {
            let expected = if i == j { 1.0 } else { 0.0 };
            err = err.max((aat[[i, j]] - expected).abs());
        }
    }
    err
}

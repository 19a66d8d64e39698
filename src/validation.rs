// src/validation.rs

//! Input validation for the matrix stack.

use crate::config::{PositivityCheck, QndiagConfig};
use crate::error::{QndiagError, Result};
use crate::math::sym_eigh;
use ndarray::{ArrayBase, ArrayView2, ArrayView3, Data, Dimension, Ix3};

/// Check a matrix stack and the configuration that goes with it.
///
/// The stack must have shape `(n, p, p)`, every matrix must be symmetric
/// and positive, and the weights and starting point of `config` must match
/// `n` and `p`. On success a 3-dimensional view of the stack is returned.
///
/// Checks run in a fixed order: shape, finiteness, symmetry, positivity,
/// then the configuration. The first failure is reported.
pub fn validate_stack<'a, S, D>(
    c: &'a ArrayBase<S, D>,
    config: &QndiagConfig,
) -> Result<ArrayView3<'a, f64>>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    if c.ndim() != 3 {
        return Err(QndiagError::Shape {
            message: format!("expected 3 dimensions, got {}", c.ndim()),
        });
    }

    let stack = c
        .view()
        .into_dyn()
        .into_dimensionality::<Ix3>()
        .map_err(|e| QndiagError::Shape {
            message: format!("expected 3 dimensions: {}", e),
        })?;

    let (n, p, q) = stack.dim();
    if p != q {
        return Err(QndiagError::Shape {
            message: format!("last two dimensions must match, got ({}, {})", p, q),
        });
    }
    if n == 0 || p == 0 {
        return Err(QndiagError::Shape {
            message: format!("matrix stack cannot be empty, got shape ({}, {}, {})", n, p, q),
        });
    }

    if stack.iter().any(|v| !v.is_finite()) {
        return Err(QndiagError::Computation {
            message: "matrix stack contains non-finite values".into(),
        });
    }

    for (index, matrix) in stack.outer_iter().enumerate() {
        if !is_symmetric(&matrix, config.symmetry_rtol, config.symmetry_atol) {
            return Err(QndiagError::Symmetry { index });
        }
    }

    for (index, matrix) in stack.outer_iter().enumerate() {
        check_positive(&matrix, config.positivity)
            .map_err(|reason| QndiagError::Positivity { index, reason })?;
    }

    if let Some(weights) = &config.weights {
        if weights.len() != n {
            return Err(QndiagError::InvalidDimensions {
                message: format!(
                    "got {} weights for a stack of {} matrices",
                    weights.len(),
                    n
                ),
            });
        }
    }

    if let Some(b) = &config.b_init {
        if b.dim() != (p, p) {
            return Err(QndiagError::InvalidDimensions {
                message: format!(
                    "b_init shape {:?} doesn't match expected ({}, {})",
                    b.shape(),
                    p,
                    p
                ),
            });
        }
        if b.iter().any(|v| !v.is_finite()) {
            return Err(QndiagError::Computation {
                message: "b_init contains non-finite values".into(),
            });
        }
    }

    Ok(stack)
}

/// Symmetry within `|a_kj - a_jk| <= atol + rtol * |a_jk|`.
fn is_symmetric(m: &ArrayView2<'_, f64>, rtol: f64, atol: f64) -> bool {
    let p = m.nrows();
    for k in 0..p {
        for j in (k + 1)..p {
            let (a, b) = (m[[k, j]], m[[j, k]]);
            if (a - b).abs() > atol + rtol * b.abs() {
                return false;
            }
        }
    }
    true
}

fn check_positive(
    m: &ArrayView2<'_, f64>,
    check: PositivityCheck,
) -> std::result::Result<(), String> {
    if let Some((k, &v)) = m.diag().iter().enumerate().find(|&(_, &v)| v <= 0.0) {
        return Err(format!("diagonal entry {} is {}", k, v));
    }

    if check == PositivityCheck::Eigenvalues {
        let (eigenvalues, _) = sym_eigh(&m.to_owned());
        let smallest = eigenvalues.iter().cloned().fold(f64::INFINITY, f64::min);
        if smallest <= 0.0 {
            return Err(format!("smallest eigenvalue is {:.4e}", smallest));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array, Array2, Array3};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, StandardNormal};

    fn randn(shape: &[usize], rng: &mut StdRng) -> Array<f64, ndarray::IxDyn> {
        Array::from_shape_simple_fn(shape, || StandardNormal.sample(&mut *rng))
    }

    #[test]
    fn test_rejects_rank_two() {
        let mut rng = StdRng::seed_from_u64(42);
        let x = randn(&[10, 2], &mut rng);
        let err = validate_stack(&x, &QndiagConfig::default()).unwrap_err();
        assert!(matches!(err, QndiagError::Shape { .. }));
        assert!(err.to_string().contains("3 dimensions"));
    }

    #[test]
    fn test_rejects_non_square() {
        let mut rng = StdRng::seed_from_u64(42);
        let x = randn(&[10, 2, 3], &mut rng);
        let err = validate_stack(&x, &QndiagConfig::default()).unwrap_err();
        assert!(matches!(err, QndiagError::Shape { .. }));
        assert!(err.to_string().contains("last two dimensions"));
    }

    #[test]
    fn test_rejects_non_symmetric() {
        let mut rng = StdRng::seed_from_u64(42);
        let x = randn(&[10, 2, 2], &mut rng);
        let err = validate_stack(&x, &QndiagConfig::default()).unwrap_err();
        assert!(matches!(err, QndiagError::Symmetry { .. }));
        assert!(err.to_string().contains("only symmetric"));
    }

    #[test]
    fn test_rejects_non_positive() {
        let mut rng = StdRng::seed_from_u64(42);
        let x = randn(&[10, 2, 2], &mut rng);
        let mut x = &x + &x.view().permuted_axes(vec![0, 2, 1]);
        x.index_axis_mut(ndarray::Axis(0), 0)
            .assign(&array![[0.0, 1.0], [1.0, 0.0]].into_dyn());
        let err = validate_stack(&x, &QndiagConfig::default()).unwrap_err();
        assert!(matches!(err, QndiagError::Positivity { .. }));
        assert!(err.to_string().contains("positive"));
    }

    #[test]
    fn test_eigenvalue_check_is_stricter() {
        // Positive diagonal, but indefinite.
        let c = array![[[1.0, 2.0], [2.0, 1.0]]];
        assert!(validate_stack(&c, &QndiagConfig::default()).is_ok());

        let strict = QndiagConfig::builder()
            .positivity(PositivityCheck::Eigenvalues)
            .build();
        assert!(matches!(
            validate_stack(&c, &strict),
            Err(QndiagError::Positivity { index: 0, .. })
        ));
    }

    #[test]
    fn test_accepts_rounding_asymmetry() {
        let mut c = Array3::<f64>::zeros((1, 2, 2));
        c[[0, 0, 0]] = 2.0;
        c[[0, 1, 1]] = 3.0;
        c[[0, 0, 1]] = 0.5;
        c[[0, 1, 0]] = 0.5 + 1e-13;
        assert!(validate_stack(&c, &QndiagConfig::default()).is_ok());
    }

    #[test]
    fn test_rejects_empty_and_non_finite() {
        let empty = Array3::<f64>::zeros((0, 2, 2));
        assert!(matches!(
            validate_stack(&empty, &QndiagConfig::default()),
            Err(QndiagError::Shape { .. })
        ));

        let mut c = Array3::<f64>::zeros((1, 2, 2));
        c[[0, 0, 0]] = f64::NAN;
        assert!(matches!(
            validate_stack(&c, &QndiagConfig::default()),
            Err(QndiagError::Computation { .. })
        ));
    }

    #[test]
    fn test_checks_weights_and_b_init_shapes() {
        let c = array![[[1.0, 0.0], [0.0, 1.0]], [[2.0, 0.5], [0.5, 1.0]]];

        let config = QndiagConfig::builder().weights(array![1.0, 2.0, 3.0]).build();
        assert!(matches!(
            validate_stack(&c, &config),
            Err(QndiagError::InvalidDimensions { .. })
        ));

        let config = QndiagConfig::builder().b_init(Array2::eye(3)).build();
        assert!(matches!(
            validate_stack(&c, &config),
            Err(QndiagError::InvalidDimensions { .. })
        ));

        let config = QndiagConfig::builder()
            .weights(array![1.0, 2.0])
            .b_init(Array2::eye(2))
            .build();
        let view = validate_stack(&c, &config).unwrap();
        assert_eq!(view.dim(), (2, 2, 2));
    }
}

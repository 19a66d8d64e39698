// src/config.rs

//! Configuration for the joint diagonalization solver.

use crate::error::{QndiagError, Result};
use ndarray::{Array1, Array2};

/// Starting point used when no explicit `b_init` is given.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Initialization {
    /// Start from the identity matrix.
    #[default]
    Identity,
    /// Start from the whitening matrix of the weighted mean of the stack,
    /// `B = Λ^{-1/2} Uᵗ` where `U Λ Uᵗ` is its eigendecomposition.
    Whitening,
}

/// How strictly the matrices of the stack are checked for positivity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PositivityCheck {
    /// Every diagonal entry must be strictly positive.
    #[default]
    Diagonal,
    /// The smallest eigenvalue must be strictly positive.
    Eigenvalues,
}

/// Configuration parameters for the joint diagonalization.
#[derive(Clone, Debug)]
pub struct QndiagConfig {
    /// Non-negative weight of each matrix. If None, all matrices weigh the same.
    pub weights: Option<Array1<f64>>,

    /// Initial diagonalizer. Takes priority over `init`.
    pub b_init: Option<Array2<f64>>,

    /// Starting point used when `b_init` is None.
    pub init: Initialization,

    /// If true, the diagonalizer is constrained to be orthogonal.
    pub ortho: bool,

    /// Convergence tolerance on the gradient norm.
    pub tol: f64,

    /// Maximum number of iterations.
    pub max_iter: usize,

    /// Floor for the determinant of each 2×2 Hessian block.
    pub lambda_min: f64,

    /// Hessian coefficients below this fraction of the largest one are floored.
    pub hessian_floor: f64,

    /// Maximum backtracking attempts per line search.
    pub ls_tries: usize,

    /// Sufficient decrease constant of the Armijo condition.
    pub armijo: f64,

    /// Scale of the plain gradient step tried when the quasi-Newton step fails.
    pub fallback_step: f64,

    /// Relative tolerance of the symmetry check.
    pub symmetry_rtol: f64,

    /// Absolute tolerance of the symmetry check.
    pub symmetry_atol: f64,

    /// Positivity check applied to every matrix of the stack.
    pub positivity: PositivityCheck,

    /// If true, keep every accepted diagonalizer in the result.
    pub track_history: bool,

    /// If true, log one line per iteration at info level.
    pub verbose: bool,
}

impl Default for QndiagConfig {
    fn default() -> Self {
        Self {
            weights: None,
            b_init: None,
            init: Initialization::default(),
            ortho: false,
            tol: 1e-6,
            max_iter: 1000,
            lambda_min: 1e-4,
            hessian_floor: 1e-12,
            ls_tries: 10,
            armijo: 1e-4,
            fallback_step: 1e-2,
            symmetry_rtol: 1e-5,
            symmetry_atol: 1e-8,
            positivity: PositivityCheck::default(),
            track_history: false,
            verbose: false,
        }
    }
}

impl QndiagConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for constructing a configuration.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Validate the parameters that do not depend on the matrix stack.
    ///
    /// Weights and `b_init` are checked against the stack in
    /// [`validate_stack`](crate::validate_stack).
    pub fn validate(&self) -> Result<()> {
        if self.max_iter == 0 {
            return Err(invalid("max_iter", "must be greater than 0"));
        }

        if !(self.tol > 0.0) {
            return Err(invalid("tol", "must be positive"));
        }

        if !(self.lambda_min > 0.0) {
            return Err(invalid("lambda_min", "must be positive"));
        }

        if !(0.0..1.0).contains(&self.hessian_floor) {
            return Err(invalid("hessian_floor", "must lie in [0, 1)"));
        }

        if self.ls_tries == 0 {
            return Err(invalid("ls_tries", "line search needs at least 1 attempt"));
        }

        if !(self.armijo >= 0.0 && self.armijo < 1.0) {
            return Err(invalid("armijo", "must lie in [0, 1)"));
        }

        if !(self.fallback_step > 0.0) {
            return Err(invalid("fallback_step", "must be positive"));
        }

        if !(self.symmetry_rtol >= 0.0 && self.symmetry_atol >= 0.0) {
            return Err(invalid("symmetry_rtol", "tolerances must be non-negative"));
        }

        if let Some(weights) = &self.weights {
            if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
                return Err(invalid("weights", "must be finite and non-negative"));
            }
            if weights.sum() <= 0.0 {
                return Err(invalid("weights", "at least one weight must be positive"));
            }
        }

        Ok(())
    }
}

fn invalid(parameter: &str, message: &str) -> QndiagError {
    QndiagError::InvalidConfig {
        parameter: parameter.into(),
        message: message.into(),
    }
}

/// Builder for constructing `QndiagConfig` with a fluent API.
#[derive(Default)]
pub struct ConfigBuilder {
    config: QndiagConfig,
}

impl ConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            config: QndiagConfig::default(),
        }
    }

    /// Set the per-matrix weights.
    pub fn weights(mut self, weights: Array1<f64>) -> Self {
        self.config.weights = Some(weights);
        self
    }

    /// Set the initial diagonalizer.
    pub fn b_init(mut self, b_init: Array2<f64>) -> Self {
        self.config.b_init = Some(b_init);
        self
    }

    /// Set the starting point used when no `b_init` is given.
    pub fn init(mut self, init: Initialization) -> Self {
        self.config.init = init;
        self
    }

    /// Enable or disable the orthogonal constraint.
    pub fn ortho(mut self, ortho: bool) -> Self {
        self.config.ortho = ortho;
        self
    }

    /// Set the convergence tolerance.
    pub fn tol(mut self, tol: f64) -> Self {
        self.config.tol = tol;
        self
    }

    /// Set the maximum number of iterations.
    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.config.max_iter = max_iter;
        self
    }

    /// Set the floor of the 2×2 block determinants.
    pub fn lambda_min(mut self, lambda_min: f64) -> Self {
        self.config.lambda_min = lambda_min;
        self
    }

    /// Set the relative floor of the Hessian coefficients.
    pub fn hessian_floor(mut self, hessian_floor: f64) -> Self {
        self.config.hessian_floor = hessian_floor;
        self
    }

    /// Set the maximum line search attempts.
    pub fn ls_tries(mut self, ls_tries: usize) -> Self {
        self.config.ls_tries = ls_tries;
        self
    }

    /// Set the Armijo sufficient decrease constant.
    pub fn armijo(mut self, armijo: f64) -> Self {
        self.config.armijo = armijo;
        self
    }

    /// Set the scale of the gradient fallback step.
    pub fn fallback_step(mut self, fallback_step: f64) -> Self {
        self.config.fallback_step = fallback_step;
        self
    }

    /// Set the tolerances of the symmetry check.
    pub fn symmetry_tolerance(mut self, rtol: f64, atol: f64) -> Self {
        self.config.symmetry_rtol = rtol;
        self.config.symmetry_atol = atol;
        self
    }

    /// Set the positivity check.
    pub fn positivity(mut self, positivity: PositivityCheck) -> Self {
        self.config.positivity = positivity;
        self
    }

    /// Keep every accepted diagonalizer in the result.
    pub fn track_history(mut self, track_history: bool) -> Self {
        self.config.track_history = track_history;
        self
    }

    /// Enable or disable verbose output.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> QndiagConfig {
        self.config
    }

    /// Build and validate the configuration.
    pub fn build_validated(self) -> Result<QndiagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

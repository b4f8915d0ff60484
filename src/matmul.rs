//! Approximate matrix multiplication through tug-of-war sketches (Algorithm 1, dense projections).
//!
//! With `C` the returned approximation,
//! `Pr(||AB - C||_F <= 2 epsilon ||A||_F ||B||_F) >= 1 - delta`.
//! The cost is `O(b(1/e^2 (n+g)(m+p) + g(n(m+p) + lg g)))` with `b = lg(1/delta)` outer trials
//! and `g = 2(b + lg b)` inner repeats.

use nalgebra::DMatrix;
use rand::Rng;
use crate::dimension::discretize;
use crate::errors::{Result, SketchError};
use crate::selection::median_then_argmin;
use crate::sketch::{nested_projection_batch, projection_batch};
use crate::trial;

/// Rows of the tug-of-war matrices used to estimate each trial's error, i.e. `1/e^2` for `e = 1/4`.
pub const ESTIMATOR_ROWS: usize = 16;
const ESTIMATOR_SCALE: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatMulConfig {
    pub epsilon: f64,
    pub delta: f64,
    /// Return the two sketched factors instead of their product.
    pub decompose: bool,
    /// Evaluate the outer trials on the rayon pool.
    pub parallel: bool,
}

impl Default for MatMulConfig {
    fn default() -> Self {
        MatMulConfig { epsilon: 0.25, delta: 0.05, decompose: false, parallel: true }
    }
}

/// Sizes derived from `epsilon` and `delta`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatMulDimensions {
    /// Number of outer trials, `ceil(lg(1/delta))`.
    pub beta: usize,
    /// Inner repeats per outer trial, `ceil(2(beta + lg beta))`.
    pub gamma: usize,
    /// Rows of each sketch, `ceil(1/epsilon^2)`.
    pub sketch_rows: usize,
}

impl MatMulConfig {
    pub fn new(epsilon: f64, delta: f64) -> Self {
        MatMulConfig { epsilon, delta, ..Default::default() }
    }

    pub fn with_decompose(mut self, decompose: bool) -> Self {
        self.decompose = decompose;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.epsilon > 0.0 && self.epsilon.is_finite()) {
            return Err(SketchError::InvalidParameter(format!(
                "epsilon must be greater than 0. Found epsilon={}",
                self.epsilon
            )));
        }
        // lg lg(1/delta) must be nonnegative
        if !(self.delta > 0.0 && self.delta <= 0.5) {
            return Err(SketchError::InvalidParameter(format!(
                "delta must be in (0, 1/2]. Found delta={}",
                self.delta
            )));
        }
        Ok(())
    }

    pub fn dimensions(&self) -> Result<MatMulDimensions> {
        self.validate()?;
        let beta = discretize((1.0 / self.delta).log2())?;
        let beta_f = beta as f64;
        // inner repeats follow the integer trial count
        let gamma = discretize(2.0 * (beta_f + beta_f.log2()))?;
        let sketch_rows = discretize(1.0 / (self.epsilon * self.epsilon))?;
        Ok(MatMulDimensions { beta, gamma, sketch_rows })
    }
}

/// Result of an approximate multiplication.
#[derive(Debug, Clone, PartialEq)]
pub enum Product {
    /// The materialized `m × p` approximation.
    Full(DMatrix<f64>),
    /// Factors `left = A S^t` (`m × r`) and `right = S B` (`r × p`) whose product is the approximation.
    Factored { left: DMatrix<f64>, right: DMatrix<f64> },
}

impl Product {
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Product::Full(c) => c.shape(),
            Product::Factored { left, right } => (left.nrows(), right.ncols()),
        }
    }

    pub fn to_matrix(&self) -> DMatrix<f64> {
        match self {
            Product::Full(c) => c.clone(),
            Product::Factored { left, right } => left * right,
        }
    }

    pub fn into_matrix(self) -> DMatrix<f64> {
        match self {
            Product::Full(c) => c,
            Product::Factored { left, right } => &left * &right,
        }
    }
}

struct MatMulTrial {
    a_st: DMatrix<f64>,
    s_b: DMatrix<f64>,
    // squared Frobenius error estimate of every inner repeat
    errors: Vec<f64>,
}

fn check_shapes(a: &DMatrix<f64>, b: &DMatrix<f64>) -> Result<()> {
    if a.is_empty() || b.is_empty() {
        return Err(SketchError::InvalidShape(format!(
            "Cannot multiply empty matrices {:?} and {:?}",
            a.shape(),
            b.shape()
        )));
    }
    if a.ncols() != b.nrows() {
        return Err(SketchError::DimensionMismatch(format!(
            "Dimension mismatch: cannot multiply {:?} by {:?}.",
            a.shape(),
            b.shape()
        )));
    }
    Ok(())
}

/**
Approximates `AB`.

* Inputs:
`a` is `m × n`, `b` is `n × p`,
`epsilon > 0` controls the sketch size `1/epsilon^2`,
`0 < delta <= 1/2` is the failure probability,
`decompose` asks for the two sketched factors rather than their product,
`rng` is the random source.

* Output:
A `Product` satisfying `||AB - C||_F <= 2 epsilon ||A||_F ||B||_F` with probability at least `1 - delta`.
 */
pub fn approx_matmul<R: Rng + ?Sized>(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    epsilon: f64,
    delta: f64,
    decompose: bool,
    rng: &mut R,
) -> Result<Product> {
    let config = MatMulConfig::new(epsilon, delta).with_decompose(decompose);
    approx_matmul_with(a, b, &config, rng)
}

/// Same as [`approx_matmul`] with every knob taken from `config`.
pub fn approx_matmul_with<R: Rng + ?Sized>(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    config: &MatMulConfig,
    rng: &mut R,
) -> Result<Product> {
    let dims = config.dimensions()?;
    check_shapes(a, b)?;
    let n = a.ncols();
    let p = b.ncols();
    log::debug!(
        "approx_matmul : ({}, {}) x ({}, {}), beta = {}, gamma = {}, sketch rows = {}",
        a.nrows(), n, b.nrows(), p, dims.beta, dims.gamma, dims.sketch_rows
    );

    // all sketches are drawn before any estimator matrix
    let sketches = projection_batch(dims.beta, dims.sketch_rows, n, config.epsilon, rng)?;
    let estimators = nested_projection_batch(dims.beta, dims.gamma, ESTIMATOR_ROWS, p, ESTIMATOR_SCALE, rng)?;

    let contexts: Vec<_> = sketches.into_iter().zip(estimators).collect();
    let outcomes = trial::evaluate(contexts, config.parallel, |_, (s, qs): (DMatrix<f64>, Vec<DMatrix<f64>>)| {
        let s_b = &s * b;
        let a_st = a * s.transpose();
        let errors = qs
            .iter()
            .map(|q| {
                let qt = q.transpose();
                let x = a * (b * &qt);
                let x_hat = &a_st * (&s_b * &qt);
                (x - x_hat).norm_squared()
            })
            .collect();
        Ok(MatMulTrial { a_st, s_b, errors })
    });

    let trials = trial::viable(outcomes)?;
    let nested: Vec<Vec<f64>> = trials
        .iter()
        .map(|t| t.as_ref().map_or_else(|| vec![f64::NAN], |t| t.errors.clone()))
        .collect();
    let (index, best) = trial::take_selected(trials, median_then_argmin(&nested), "approx_matmul")?;
    log::info!("approx_matmul : selected trial {} of {}", index, dims.beta);

    if config.decompose {
        Ok(Product::Factored { left: best.a_st, right: best.s_b })
    } else {
        Ok(Product::Full(&best.a_st * &best.s_b))
    }
}

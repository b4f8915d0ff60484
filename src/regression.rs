use std::borrow::Cow;
use nalgebra::{DMatrix, DVector};
use rand::Rng;
use crate::dimension::discretize;
use crate::errors::{check_finite, check_unit_interval, Result, SketchError};
use crate::selection::argmin;
use crate::sketch::projection_batch;
use crate::trial;

/// Right-hand sides accepted by [`approx_regression`]: a vector or a single-column matrix.
pub trait AsColumn {
    fn as_column(&self) -> Cow<'_, DMatrix<f64>>;
}

impl AsColumn for DMatrix<f64> {
    fn as_column(&self) -> Cow<'_, DMatrix<f64>> {
        Cow::Borrowed(self)
    }
}

impl AsColumn for DVector<f64> {
    fn as_column(&self) -> Cow<'_, DMatrix<f64>> {
        Cow::Owned(DMatrix::from_column_slice(self.len(), 1, self.as_slice()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionConfig {
    pub epsilon: f64,
    pub delta: f64,
    /// Report the true and sketched loss of the returned solution.
    pub loss: bool,
    pub parallel: bool,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        RegressionConfig { epsilon: 0.25, delta: 0.25, loss: false, parallel: true }
    }
}

impl RegressionConfig {
    pub fn new(epsilon: f64, delta: f64) -> Self {
        RegressionConfig { epsilon, delta, ..Default::default() }
    }

    pub fn with_loss(mut self, loss: bool) -> Self {
        self.loss = loss;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn validate(&self) -> Result<()> {
        check_unit_interval("epsilon", self.epsilon)?;
        check_unit_interval("delta", self.delta)
    }

    /// Returns `(r, beta)`: the sketch dimension `ceil(d ln d / epsilon^2)` and the number of trials `ceil(ln(1/delta))`.
    pub fn dimensions(&self, d: usize) -> Result<(usize, usize)> {
        self.validate()?;
        let d_f = d as f64;
        let r = discretize(d_f * d_f.ln() / (self.epsilon * self.epsilon))?;
        let beta = discretize((1.0 / self.delta).ln())?;
        Ok((r, beta))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionLoss {
    /// `||b - A xp||`
    pub true_loss: f64,
    /// `||Sb - SA xp||` for the sketch that produced `xp`
    pub sketched_loss: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegressionFit {
    pub solution: DVector<f64>,
    pub loss: Option<RegressionLoss>,
}

struct RegressionTrial {
    x: DMatrix<f64>,
    residual: f64,
}

fn solve_sketched(s: &DMatrix<f64>, a: &DMatrix<f64>, b: &DMatrix<f64>) -> Result<RegressionTrial> {
    let sa = s * a;
    let sb = s * b;
    check_finite(&sa, "sketched matrix")?;
    check_finite(&sb, "sketched right-hand side")?;
    let svd = sa.clone().svd_unordered(true, true);
    if svd.singular_values.iter().any(|v| !v.is_finite()) {
        return Err(SketchError::NumericalError(
            "singular values of the sketched matrix are not finite".to_string(),
        ));
    }
    // same relative cut-off as a default pseudo-inverse
    let cutoff = (sa.nrows().max(sa.ncols()) as f64) * f64::EPSILON * svd.singular_values.max();
    let sa_pinv = svd
        .pseudo_inverse(cutoff)
        .map_err(|e| SketchError::NumericalError(e.to_string()))?;
    let x = sa_pinv * &sb;
    let residual = (&sb - &sa * &x).norm();
    if !residual.is_finite() || x.iter().any(|v| !v.is_finite()) {
        return Err(SketchError::NumericalError(
            "pseudo-inverse of the sketched matrix is not finite".to_string(),
        ));
    }
    Ok(RegressionTrial { x, residual })
}

fn check_shapes(a: &DMatrix<f64>, b: &DMatrix<f64>) -> Result<()> {
    if a.is_empty() {
        return Err(SketchError::InvalidShape(format!("Cannot regress on an empty matrix {:?}", a.shape())));
    }
    if b.ncols() != 1 {
        return Err(SketchError::DimensionMismatch(format!(
            "b should be of shape (n, 1) or (n,). Found {:?}",
            b.shape()
        )));
    }
    if a.nrows() != b.nrows() {
        return Err(SketchError::DimensionMismatch(format!(
            "Dimension mismatch: cannot multiply {:?} by {:?}.",
            a.shape(),
            b.shape()
        )));
    }
    Ok(())
}

/**
l2 regression through a dense Johnson-Lindenstrauss sketch (Theorem 12, no FJLT).

Let `x* = argmin_x ||b - Ax||` and `Z = ||b - Ax*||`. With probability at least `1 - delta`
the returned `xp` satisfies `||b - A xp|| <= (1 + epsilon) Z`, its sketched loss is at most
`(1 + epsilon) Z`, and `||x* - xp|| <= (epsilon / sigma_min(A)) Z`.
The cost is `O(beta r d (n + r))` with `r = d ln d / epsilon^2` and `beta = ln(1/delta)`.

* Inputs:
`a` is `n × d`, `b` has `n` rows and one column (vector or matrix),
`0 < epsilon < 1`, `0 < delta < 1`,
`loss` also reports the true and sketched loss of `xp`.
 */
pub fn approx_regression<B, R>(
    a: &DMatrix<f64>,
    b: &B,
    epsilon: f64,
    delta: f64,
    loss: bool,
    rng: &mut R,
) -> Result<RegressionFit>
where
    B: AsColumn + ?Sized,
    R: Rng + ?Sized,
{
    let config = RegressionConfig::new(epsilon, delta).with_loss(loss);
    approx_regression_with(a, b, &config, rng)
}

/// Same as [`approx_regression`] with every knob taken from `config`.
pub fn approx_regression_with<B, R>(
    a: &DMatrix<f64>,
    b: &B,
    config: &RegressionConfig,
    rng: &mut R,
) -> Result<RegressionFit>
where
    B: AsColumn + ?Sized,
    R: Rng + ?Sized,
{
    config.validate()?;
    let column = b.as_column();
    let b: &DMatrix<f64> = &column;
    check_shapes(a, b)?;
    let (n, d) = a.shape();
    let (r, beta) = config.dimensions(d)?;
    log::debug!("approx_regression : A is ({}, {}), r = {}, beta = {}", n, d, r, beta);

    let sketches = projection_batch(beta, r, n, 1.0 / (r as f64).sqrt(), rng)?;
    let outcomes = trial::evaluate(sketches, config.parallel, |_, s: DMatrix<f64>| solve_sketched(&s, a, b));
    let trials = trial::viable(outcomes)?;
    let residuals = trial::scores_or_nan(&trials, |t| t.residual);
    let (index, best) = trial::take_selected(trials, argmin(&residuals), "approx_regression")?;
    log::info!("approx_regression : selected trial {} of {}, sketched loss {:.3e}", index, beta, best.residual);

    let loss = if config.loss {
        Some(RegressionLoss {
            true_loss: (b - a * &best.x).norm(),
            sketched_loss: best.residual,
        })
    } else {
        None
    };
    Ok(RegressionFit { solution: best.x.column(0).into_owned(), loss })
}

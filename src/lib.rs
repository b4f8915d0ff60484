//! Randomized sketching algorithms for dense linear algebra.
//!
//! Three pipelines trade exact computation for a probabilistic error bound by sketching their
//! inputs with dense Gaussian projections, repeating the computation over independent trials and
//! keeping the best trial:
//!
//! * [`approx_matmul`]: approximate matrix product with tug-of-war error estimation,
//! * [`approx_regression`]: l2 regression on a Johnson-Lindenstrauss sketch,
//! * [`approx_svd`]: rank-k approximation by sketch-and-project.
//!
//! Every pipeline takes its random source explicitly; seeding it reproduces every trial.

pub mod dimension;
pub mod errors;
pub mod matmul;
pub mod regression;
pub mod selection;
pub mod sketch;
pub mod svd;
mod trial;
#[cfg(test)]
mod test_assist;

pub use errors::{Result, SketchError};
pub use matmul::{approx_matmul, approx_matmul_with, MatMulConfig, Product};
pub use regression::{approx_regression, approx_regression_with, AsColumn, RegressionConfig, RegressionFit, RegressionLoss};
pub use selection::SelectionPolicy;
pub use svd::{approx_svd, approx_svd_with, LowRankSvd, SvdConfig, SvdFit};

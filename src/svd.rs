//! Rank-k approximation by repeated sketch-and-project.
//!
//! Each trial sketches the rows of `A` down to `r = k / epsilon` combinations, projects `A` onto
//! their row space and keeps the best rank-k approximation of that projection. Trials are compared
//! by captured energy, the sum of the squared kept singular values.
//!
//! Higher captured energy is the better fit, yet the default policy keeps the trial with the
//! minimum energy. [`SelectionPolicy::Maximize`] keeps the maximum instead; which of the two the
//! error guarantee calls for is still open, so both are exposed.

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use crate::dimension::discretize;
use crate::errors::{check_finite, check_unit_interval, Result, SketchError};
use crate::selection::SelectionPolicy;
use crate::sketch::projection_batch;
use crate::trial;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SvdConfig {
    pub epsilon: f64,
    pub delta: f64,
    /// Report the captured energy of the selected trial.
    pub loss: bool,
    pub policy: SelectionPolicy,
    pub parallel: bool,
}

impl Default for SvdConfig {
    fn default() -> Self {
        SvdConfig {
            epsilon: 0.25,
            delta: 0.25,
            loss: false,
            policy: SelectionPolicy::Minimize,
            parallel: true,
        }
    }
}

impl SvdConfig {
    pub fn new(epsilon: f64, delta: f64) -> Self {
        SvdConfig { epsilon, delta, ..Default::default() }
    }

    pub fn with_loss(mut self, loss: bool) -> Self {
        self.loss = loss;
        self
    }

    pub fn with_policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = policy;
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

    /// Returns `(r, beta)`: the sketch dimension `ceil(k / epsilon)` and the number of trials `ceil(ln(1/delta))`.
    pub fn dimensions(&self, k: usize) -> Result<(usize, usize)> {
        self.validate()?;
        let r = discretize(k as f64 / self.epsilon)?;
        let beta = discretize((1.0 / self.delta).ln())?;
        Ok((r, beta))
    }
}

/// Thin rank-k factorization `U diag(s) V^t`.
#[derive(Debug, Clone, PartialEq)]
pub struct LowRankSvd {
    /// `m × k`, orthonormal columns
    pub u: DMatrix<f64>,
    /// the k singular values, in decreasing order
    pub s: DVector<f64>,
    /// `k × n`, orthonormal rows
    pub vt: DMatrix<f64>,
}

impl LowRankSvd {
    pub fn rank(&self) -> usize {
        self.s.len()
    }

    /// Sum of the squared singular values.
    pub fn captured_energy(&self) -> f64 {
        self.s.norm_squared()
    }

    pub fn to_matrix(&self) -> DMatrix<f64> {
        &self.u * DMatrix::from_diagonal(&self.s) * &self.vt
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SvdFit {
    pub factors: LowRankSvd,
    pub captured_energy: Option<f64>,
}

/// Projects the rows of `a` onto the row space of `b`, via an orthonormal basis from the QR of `b^t`.
pub fn project_rows_onto_rowspan(a: &DMatrix<f64>, b: &DMatrix<f64>) -> DMatrix<f64> {
    // rescaling leaves the row space unchanged and keeps the Householder norms finite
    let amax = b.amax();
    let bt = if amax > 0.0 && amax.is_finite() { b.transpose() / amax } else { b.transpose() };
    let q = bt.qr().q();
    (a * &q) * q.transpose()
}

/**
Best rank-k approximation of `a` from its singular value decomposition.

* Output:
`LowRankSvd` holding the `k` largest singular values and their singular vectors, or a
`NumericalError` if the decomposition is not finite.
 */
pub fn best_rank_k(a: &DMatrix<f64>, k: usize) -> Result<LowRankSvd> {
    check_finite(a, "matrix to decompose")?;
    let svd = a.clone().svd_unordered(true, true);
    let (u, vt) = match (svd.u, svd.v_t) {
        (Some(u), Some(vt)) => (u, vt),
        _ => return Err(SketchError::NumericalError("SVD did not return singular vectors".to_string())),
    };
    let sigma = svd.singular_values;
    if k > sigma.len() {
        return Err(SketchError::InvalidParameter(format!(
            "Cannot keep rank {} out of {} singular values",
            k,
            sigma.len()
        )));
    }
    if sigma.iter().any(|v| !v.is_finite()) {
        return Err(SketchError::NumericalError("singular values are not finite".to_string()));
    }

    let mut order: Vec<usize> = (0..sigma.len()).collect();
    order.sort_by(|&i, &j| sigma[j].total_cmp(&sigma[i]));
    let kept = &order[..k];

    Ok(LowRankSvd {
        u: u.select_columns(kept),
        s: DVector::from_iterator(k, kept.iter().map(|&i| sigma[i])),
        vt: vt.select_rows(kept),
    })
}

fn check_shape(a: &DMatrix<f64>, k: usize) -> Result<()> {
    let (m, n) = a.shape();
    if m > n {
        return Err(SketchError::InvalidShape(format!("need m <= n. Found m={}, n={}", m, n)));
    }
    if k == 0 || k > m.min(n) {
        return Err(SketchError::InvalidParameter(format!(
            "k must be in (0, {}]. Found k={}",
            m.min(n),
            k
        )));
    }
    Ok(())
}

/**
Rank-k approximation of `A` by sketch-and-project.

* Inputs:
`a` is `m × n` with `m <= n`,
`0 < k <= m` is the target rank,
`0 < epsilon < 1` sets the sketch size `k / epsilon`,
`0 < delta < 1` sets the number of trials `ln(1/delta)`,
`loss` also reports the captured energy of the selected trial.

* Output:
The rank-k factors `(U_k, s_k, V_k^t)` of the selected trial.
 */
pub fn approx_svd<R: Rng + ?Sized>(
    a: &DMatrix<f64>,
    k: usize,
    epsilon: f64,
    delta: f64,
    loss: bool,
    rng: &mut R,
) -> Result<SvdFit> {
    let config = SvdConfig::new(epsilon, delta).with_loss(loss);
    approx_svd_with(a, k, &config, rng)
}

/// Same as [`approx_svd`] with every knob taken from `config`.
pub fn approx_svd_with<R: Rng + ?Sized>(
    a: &DMatrix<f64>,
    k: usize,
    config: &SvdConfig,
    rng: &mut R,
) -> Result<SvdFit> {
    config.validate()?;
    check_shape(a, k)?;
    let m = a.nrows();
    let (r, beta) = config.dimensions(k)?;
    log::debug!("approx_svd : A is {:?}, k = {}, r = {}, beta = {}", a.shape(), k, r, beta);

    let sketches = projection_batch(beta, r, m, 1.0 / (r as f64).sqrt(), rng)?;
    let outcomes = trial::evaluate(sketches, config.parallel, |_, s: DMatrix<f64>| {
        let sa = s * a;
        check_finite(&sa, "sketched matrix")?;
        let projected = project_rows_onto_rowspan(a, &sa);
        check_finite(&projected, "projection onto the sketched row space")?;
        best_rank_k(&projected, k)
    });
    let trials = trial::viable(outcomes)?;
    let energies = trial::scores_or_nan(&trials, LowRankSvd::captured_energy);
    let (index, factors) = trial::take_selected(trials, config.policy.select(&energies), "approx_svd")?;
    let energy = energies[index];
    log::info!(
        "approx_svd : selected trial {} of {} with {:?}, captured energy {:.4e}",
        index, beta, config.policy, energy
    );

    Ok(SvdFit {
        factors,
        captured_energy: if config.loss { Some(energy) } else { None },
    })
}

#[cfg(test)]
mod tests
{
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;
    use rand_core::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;
    use super::{approx_svd, approx_svd_with, best_rank_k, project_rows_onto_rowspan, SvdConfig};
    use crate::errors::SketchError;
    use crate::selection::SelectionPolicy;
    use crate::test_assist::{check_approx_equal, generate_random_matrix, log_init_test, matrix_with_singular_values, CountingRng};

    fn spectrum(m: usize) -> Vec<f64> {
        let mut sigma = vec![10.0, 8.0, 6.0];
        sigma.extend(std::iter::repeat(0.1).take(m - 3));
        sigma
    }

    #[test]
    fn test_dimensions() {
        assert_eq!(SvdConfig::new(0.5, 0.1).dimensions(3).unwrap(), (6, 3));
        assert_eq!(SvdConfig::new(0.3, 0.25).dimensions(2).unwrap(), (7, 2));
    }

    #[test]
    fn test_best_rank_k_sorted_and_orthonormal() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let a = generate_random_matrix(6, 9, &mut rng);
        let factors = best_rank_k(&a, 4).unwrap();
        assert_eq!(factors.u.shape(), (6, 4));
        assert_eq!(factors.vt.shape(), (4, 9));
        assert_eq!(factors.rank(), 4);
        for i in 1..4 {
            assert!(factors.s[i - 1] >= factors.s[i]);
        }
        assert!(check_approx_equal(&(factors.u.transpose() * &factors.u), &DMatrix::identity(4, 4), 1e-10));
        assert!(check_approx_equal(&(&factors.vt * factors.vt.transpose()), &DMatrix::identity(4, 4), 1e-10));

        let full = best_rank_k(&a, 6).unwrap();
        assert!(check_approx_equal(&full.to_matrix(), &a, 1e-10));
        assert_relative_eq!(full.captured_energy(), a.norm_squared(), epsilon = 1e-9);
    }

    #[test]
    fn test_projection_onto_own_rowspan() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(9);
        let a = generate_random_matrix(4, 10, &mut rng);
        // a full-rank sketch keeps every row of A
        let s = generate_random_matrix(6, 4, &mut rng);
        let projected = project_rows_onto_rowspan(&a, &(s * &a));
        assert!(check_approx_equal(&projected, &a, 1e-10));
    }

    #[test]
    fn test_captured_energy_close_to_optimal() {
        log_init_test();
        let (m, n, k) = (20, 40, 3);
        let sigma = spectrum(m);
        let true_energy: f64 = sigma[..k].iter().map(|s| s * s).sum();
        let mut data_rng = Xoshiro256PlusPlus::seed_from_u64(77);
        let a = matrix_with_singular_values(m, n, &sigma, &mut data_rng);
        let (epsilon, delta) = (0.5, 0.1);

        let runs = 20;
        let mut successes = 0;
        for seed in 0..runs {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
            let fit = approx_svd(&a, k, epsilon, delta, true, &mut rng).unwrap();
            let energy = fit.captured_energy.unwrap();
            log::debug!("seed {} : captured {:.4}, optimal {:.4}", seed, energy, true_energy);
            // a projection never captures more than the top-k energy of A
            assert!(energy <= true_energy * (1.0 + 1e-10));
            assert_relative_eq!(energy, fit.factors.captured_energy(), epsilon = 1e-12);
            if energy >= (1.0 - 0.05) * true_energy {
                successes += 1;
            }

            let factors = &fit.factors;
            assert_eq!(factors.u.shape(), (m, k));
            assert_eq!(factors.vt.shape(), (k, n));
            assert!(check_approx_equal(&(factors.u.transpose() * &factors.u), &DMatrix::identity(k, k), 1e-8));
            assert!(check_approx_equal(&(&factors.vt * factors.vt.transpose()), &DMatrix::identity(k, k), 1e-8));
        }
        assert!(successes as f64 >= (1.0 - delta) * runs as f64);
    }

    #[test]
    fn test_selection_policies() {
        let mut data_rng = Xoshiro256PlusPlus::seed_from_u64(12);
        let a = generate_random_matrix(8, 15, &mut data_rng);
        let base = SvdConfig::new(0.5, 0.01).with_loss(true);

        for seed in 0..5 {
            let mut rng1 = Xoshiro256PlusPlus::seed_from_u64(seed);
            let mut rng2 = Xoshiro256PlusPlus::seed_from_u64(seed);
            let min_fit = approx_svd_with(&a, 2, &base, &mut rng1).unwrap();
            let max_fit = approx_svd_with(&a, 2, &base.with_policy(SelectionPolicy::Maximize), &mut rng2).unwrap();
            // the same draws, so the maximizing trial captures at least as much
            assert!(max_fit.captured_energy.unwrap() >= min_fit.captured_energy.unwrap());
        }

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let default_fit = approx_svd(&a, 2, 0.5, 0.01, true, &mut rng).unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let min_fit = approx_svd_with(&a, 2, &base.with_policy(SelectionPolicy::Minimize), &mut rng).unwrap();
        assert_eq!(default_fit, min_fit);
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let mut data_rng = Xoshiro256PlusPlus::seed_from_u64(13);
        let a = generate_random_matrix(5, 12, &mut data_rng);
        let config = SvdConfig::new(0.4, 0.05).with_loss(true);
        let mut rng1 = Xoshiro256PlusPlus::seed_from_u64(6);
        let mut rng2 = Xoshiro256PlusPlus::seed_from_u64(6);
        let par = approx_svd_with(&a, 2, &config.with_parallel(true), &mut rng1).unwrap();
        let seq = approx_svd_with(&a, 2, &config.with_parallel(false), &mut rng2).unwrap();
        assert_eq!(par, seq);
    }

    #[test]
    fn test_loss_flag() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let a = generate_random_matrix(3, 5, &mut rng);
        let fit = approx_svd(&a, 1, 0.5, 0.5, false, &mut rng).unwrap();
        assert!(fit.captured_energy.is_none());
        assert_eq!(fit.factors.rank(), 1);
    }

    #[test]
    fn test_validation_draws_nothing() {
        let wide = DMatrix::<f64>::identity(3, 5);
        let tall = DMatrix::<f64>::identity(5, 3);
        let mut rng = CountingRng::new(0);

        assert!(matches!(approx_svd(&tall, 2, 0.5, 0.5, false, &mut rng), Err(SketchError::InvalidShape(_))));
        for k in [0, 4] {
            assert!(matches!(approx_svd(&wide, k, 0.5, 0.5, false, &mut rng), Err(SketchError::InvalidParameter(_))));
        }
        for (epsilon, delta) in [(0.0, 0.5), (1.0, 0.5), (0.5, 0.0), (0.5, 1.0), (0.5, f64::NAN)] {
            match approx_svd(&wide, 2, epsilon, delta, false, &mut rng) {
                Err(SketchError::InvalidParameter(_)) => {}
                other => panic!("expected InvalidParameter for ({}, {}), got {:?}", epsilon, delta, other),
            }
        }
        assert_eq!(rng.draws(), 0);

        approx_svd(&wide, 3, 0.5, 0.5, false, &mut rng).unwrap();
        assert!(rng.draws() > 0);
    }

    #[test]
    fn test_best_rank_k_rejects_non_finite() {
        let mut a = DMatrix::<f64>::identity(2, 3);
        a[(0, 1)] = f64::INFINITY;
        assert!(matches!(best_rank_k(&a, 1), Err(SketchError::NumericalError(_))));
        a[(0, 1)] = f64::NAN;
        assert!(matches!(best_rank_k(&a, 1), Err(SketchError::NumericalError(_))));
    }

    #[test]
    fn test_large_finite_input_never_panics() {
        let mut a = DMatrix::<f64>::zeros(2, 4);
        a[(0, 0)] = 1.0e308;
        a[(1, 1)] = 1.0e308;
        for seed in 0..20 {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
            match approx_svd(&a, 1, 0.5, 0.5, true, &mut rng) {
                Ok(fit) => assert!(fit.factors.s.iter().all(|v| v.is_finite())),
                Err(SketchError::NumericalError(_)) => {}
                other => panic!("unexpected outcome for seed {}: {:?}", seed, other),
            }
        }
    }

    #[test]
    fn test_no_viable_trial_is_numerical_error() {
        log_init_test();
        // each sketched entry sums 100 products with f64::MAX and cannot stay finite
        let a = DMatrix::from_element(100, 200, f64::MAX);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(8);
        let result = approx_svd(&a, 1, 0.5, 0.1, true, &mut rng);
        assert!(matches!(result, Err(SketchError::NumericalError(_))));
    }
}

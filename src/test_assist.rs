use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_core::{RngCore, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use rand_xoshiro::Xoshiro256PlusPlus;

pub fn log_init_test() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Generates a random matrix of size (rows, cols) with normally distributed elems
pub fn generate_random_matrix<R: Rng>(rows: usize, cols: usize, rng: &mut R) -> DMatrix<f64> {
    DMatrix::from_fn(rows, cols, |_i, _j| StandardNormal.sample(&mut *rng))
}

/// Generates a (rows, cols) matrix with orthonormal columns, rows >= cols
pub fn orthonormal_columns<R: Rng>(rows: usize, cols: usize, rng: &mut R) -> DMatrix<f64> {
    assert!(rows >= cols, "Cannot have more columns ({}) than rows ({})", cols, rows);
    let matrix = generate_random_matrix(rows, cols, rng);
    let (mut q, r) = matrix.qr().unpack();
    for i in 0..q.ncols() {
        let sign = r[(i, i)].signum();
        q.set_column(i, &(&q.column(i) * sign));
    }
    q
}

/// Builds an (m, n) matrix U diag(sigma) V^t with the given singular values, m <= n
pub fn matrix_with_singular_values<R: Rng>(m: usize, n: usize, sigma: &[f64], rng: &mut R) -> DMatrix<f64> {
    assert_eq!(sigma.len(), m.min(n));
    let u = orthonormal_columns(m, sigma.len(), rng);
    let v = orthonormal_columns(n, sigma.len(), rng);
    let s = DMatrix::from_diagonal(&DVector::from_row_slice(sigma));
    u * s * v.transpose()
}

pub fn check_approx_equal(a: &DMatrix<f64>, b: &DMatrix<f64>, tolerance: f64) -> bool {
    if a.shape() != b.shape() {
        return false;
    }

    for i in 0..a.nrows() {
        for j in 0..a.ncols() {
            if (a[(i, j)] - b[(i, j)]).abs() > tolerance {
                return false;
            }
        }
    }

    true
}

/// Seeded random source that counts how many words were drawn from it.
pub struct CountingRng {
    inner: Xoshiro256PlusPlus,
    draws: usize,
}

impl CountingRng {
    pub fn new(seed: u64) -> Self {
        CountingRng { inner: Xoshiro256PlusPlus::seed_from_u64(seed), draws: 0 }
    }

    pub fn draws(&self) -> usize {
        self.draws
    }
}

impl RngCore for CountingRng {
    fn next_u32(&mut self) -> u32 {
        self.draws += 1;
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.draws += 1;
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.draws += 1;
        self.inner.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.draws += 1;
        self.inner.try_fill_bytes(dest)
    }
}

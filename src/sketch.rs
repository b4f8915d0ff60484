use nalgebra::DMatrix;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use crate::errors::{Result, SketchError};

fn check_projection_shape(rows: usize, cols: usize, scale: f64) -> Result<()> {
    if rows == 0 || cols == 0 {
        return Err(SketchError::InvalidShape(format!(
            "Projection needs positive dimensions, got ({}, {})",
            rows, cols
        )));
    }
    if !scale.is_finite() {
        return Err(SketchError::InvalidParameter(format!(
            "Projection scale must be finite, got {}",
            scale
        )));
    }
    Ok(())
}

// Draws are consumed in column-major order, so a seeded source always fills the same entries.
fn draw<R: Rng + ?Sized>(rows: usize, cols: usize, scale: f64, rng: &mut R) -> DMatrix<f64> {
    DMatrix::from_fn(rows, cols, |_i, _j| {
        let z: f64 = StandardNormal.sample(&mut *rng);
        scale * z
    })
}

/**
Draws a single `rows × cols` Gaussian projection.

* Inputs:
`rows`, `cols` are the (positive) dimensions of the projection,
`scale` multiplies every standard normal entry,
`rng` is the random source, seed it for reproducible trials.

* Output:
A matrix whose entries are independent draws of `scale · N(0, 1)`.
 */
pub fn gaussian_projection<R: Rng + ?Sized>(
    rows: usize,
    cols: usize,
    scale: f64,
    rng: &mut R,
) -> Result<DMatrix<f64>> {
    check_projection_shape(rows, cols, scale)?;
    Ok(draw(rows, cols, scale, rng))
}

/// Draws `trials` independent projections of identical shape, in trial order.
pub fn projection_batch<R: Rng + ?Sized>(
    trials: usize,
    rows: usize,
    cols: usize,
    scale: f64,
    rng: &mut R,
) -> Result<Vec<DMatrix<f64>>> {
    if trials == 0 {
        return Err(SketchError::InvalidShape("A projection batch needs at least one trial".to_string()));
    }
    check_projection_shape(rows, cols, scale)?;
    Ok((0..trials).map(|_| draw(rows, cols, scale, &mut *rng)).collect())
}

/**
Draws a batch of batches: `outer` trials, each holding `inner` independent projections.

The draw order is outer-major, i.e. all repeats of trial 0 come before those of trial 1.
 */
pub fn nested_projection_batch<R: Rng + ?Sized>(
    outer: usize,
    inner: usize,
    rows: usize,
    cols: usize,
    scale: f64,
    rng: &mut R,
) -> Result<Vec<Vec<DMatrix<f64>>>> {
    if outer == 0 || inner == 0 {
        return Err(SketchError::InvalidShape(format!(
            "A nested projection batch needs positive trial counts, got ({}, {})",
            outer, inner
        )));
    }
    check_projection_shape(rows, cols, scale)?;
    Ok((0..outer)
        .map(|_| (0..inner).map(|_| draw(rows, cols, scale, &mut *rng)).collect())
        .collect())
}

use num_traits::ToPrimitive;
use crate::errors::{Result, SketchError};

/**
Converts a size derived from a closed-form bound into a concrete dimension.

* Input:
`x` is a nonnegative real, typically a function of `epsilon`, `delta` or the matrix shape.

* Output:
The smallest integer `>= x`, raised to 1 when `x` is exactly zero so the result is always a valid dimension.

The result must fit a signed 32 bit integer; anything else (negative, NaN, infinite or too large) is an `InvalidSize` error.
 */
pub fn discretize(x: f64) -> Result<usize> {
    if x.is_sign_negative() && x != 0.0 {
        return Err(SketchError::InvalidSize(format!(
            "Cannot turn negative size {} into a dimension",
            x
        )));
    }
    let ceiled = x.ceil().to_i32().ok_or_else(|| {
        SketchError::InvalidSize(format!("Size {} is not representable as a dimension", x))
    })?;
    Ok(ceiled.max(1) as usize)
}

/// Discretizes every entry of `xs`, failing on the first unrepresentable one.
pub fn discretize_all(xs: &[f64]) -> Result<Vec<usize>> {
    xs.iter().map(|&x| discretize(x)).collect()
}

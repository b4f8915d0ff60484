use nalgebra::DMatrix;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SketchError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),
    #[error("invalid shape: {0}")]
    InvalidShape(String),
    #[error("numerical error: {0}")]
    NumericalError(String),
    #[error("invalid size: {0}")]
    InvalidSize(String),
}

pub type Result<T> = std::result::Result<T, SketchError>;

/// Checks that `value` lies in the open interval `(0, 1)`.
pub(crate) fn check_unit_interval(name: &str, value: f64) -> Result<()> {
    if value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(SketchError::InvalidParameter(format!(
            "{} must be in (0, 1). Found {}={}",
            name, name, value
        )))
    }
}

/// Fails with `NumericalError` when `matrix` holds a NaN or an infinity.
pub(crate) fn check_finite(matrix: &DMatrix<f64>, what: &str) -> Result<()> {
    if matrix.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(SketchError::NumericalError(format!("{} is not finite", what)))
    }
}

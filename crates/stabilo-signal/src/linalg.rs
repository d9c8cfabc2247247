//! Fixed-size matrix aliases and the 2x2 inverse used by the Kalman update.

use nalgebra::{DMatrix, Matrix2, Matrix2x4, Matrix4, Vector2, Vector4};

use stabilo_core::{Error, Result};

pub type StateVector = Vector4<f64>;
pub type StateMatrix = Matrix4<f64>;
pub type MeasurementVector = Vector2<f64>;
pub type MeasurementMatrix = Matrix2x4<f64>;
pub type InnovationMatrix = Matrix2<f64>;

/// Determinant magnitude below which a 2x2 matrix is treated as singular
pub const SINGULAR_EPSILON: f64 = 1e-10;

/// Closed-form 2x2 inverse; a singular input yields the identity
pub fn invert_2x2(m: &Matrix2<f64>) -> Matrix2<f64> {
    let det = m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)];
    if det.abs() < SINGULAR_EPSILON || !det.is_finite() {
        tracing::debug!("Singular 2x2 matrix (det = {:e}), using identity", det);
        return Matrix2::identity();
    }

    Matrix2::new(m[(1, 1)], -m[(0, 1)], -m[(1, 0)], m[(0, 0)]) / det
}

/// Inverse of a dynamically sized matrix.
///
/// Only 2x2 matrices are supported; anything else is a caller error.
pub fn try_invert(m: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    if m.shape() != (2, 2) {
        return Err(Error::UnsupportedOperation(format!(
            "matrix inverse is only implemented for 2x2, got {}x{}",
            m.nrows(),
            m.ncols()
        )));
    }

    let fixed = Matrix2::new(m[(0, 0)], m[(0, 1)], m[(1, 0)], m[(1, 1)]);
    let inv = invert_2x2(&fixed);
    Ok(DMatrix::from_column_slice(2, 2, inv.as_slice()))
}

/// Build a matrix from row-major nested rows, rejecting ragged input
pub fn matrix_from_rows(rows: &[Vec<f64>]) -> Result<DMatrix<f64>> {
    let n_rows = rows.len();
    let n_cols = rows.first().map(|r| r.len()).unwrap_or(0);
    if n_rows == 0 || n_cols == 0 {
        return Err(Error::Config("empty matrix".into()));
    }
    if rows.iter().any(|r| r.len() != n_cols) {
        return Err(Error::Config("matrix rows have different lengths".into()));
    }

    Ok(DMatrix::from_fn(n_rows, n_cols, |i, j| rows[i][j]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invert_2x2() {
        let m = Matrix2::new(4.0, 7.0, 2.0, 6.0);
        let inv = invert_2x2(&m);
        let product = m * inv;
        assert!((product - Matrix2::identity()).norm() < 1e-12);
    }

    #[test]
    fn test_singular_falls_back_to_identity() {
        let m = Matrix2::new(1.0, 2.0, 2.0, 4.0);
        assert_eq!(invert_2x2(&m), Matrix2::identity());
    }

    #[test]
    fn test_try_invert_rejects_other_sizes() {
        let m = DMatrix::<f64>::identity(3, 3);
        assert!(matches!(try_invert(&m), Err(Error::UnsupportedOperation(_))));

        let m = DMatrix::<f64>::zeros(2, 3);
        assert!(try_invert(&m).is_err());
    }

    #[test]
    fn test_try_invert_2x2() {
        let m = DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 4.0]);
        let inv = try_invert(&m).unwrap();
        assert!((inv[(0, 0)] - 0.5).abs() < 1e-12);
        assert!((inv[(1, 1)] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_matrix_from_rows() {
        let m = matrix_from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(m[(1, 0)], 3.0);
        assert!(matrix_from_rows(&[vec![1.0], vec![1.0, 2.0]]).is_err());
        assert!(matrix_from_rows(&[]).is_err());
    }
}

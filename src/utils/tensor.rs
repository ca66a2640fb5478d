//! Tensor helpers shared by the engines, metrics and operators
//!
//! A tensor is a dense `[batch, dim]` matrix: each row holds one flattened
//! batch element. All norms here are batch-aggregate (Frobenius over the
//! whole tensor), so every batch element advances or halts together.

use nalgebra::DMatrix;

use crate::error::{OptimError, Result};

/// Dense batched tensor, one flattened sample per row
pub type Tensor = DMatrix<f64>;

// ============================================================================
// Constants
// ============================================================================

/// Stabilizer added to denominators of relative criteria
pub const REL_EPS: f64 = 1e-6;

/// PSNR reported when the estimate matches the ground truth exactly
pub const PSNR_SENTINEL: f64 = 100.0;

/// Peak signal value assumed by [`psnr`]
pub const PSNR_MAX_PIXEL: f64 = 1.0;

// ============================================================================
// Norms
// ============================================================================

/// Frobenius norm of the whole batch
#[inline]
pub fn norm(t: &Tensor) -> f64 {
    t.norm()
}

/// Squared Frobenius distance ||a - b||²
pub fn squared_distance(a: &Tensor, b: &Tensor) -> f64 {
    a.iter().zip(b.iter()).map(|(&x, &y)| (x - y) * (x - y)).sum()
}

/// Relative change ||prev - cur|| / (||cur|| + eps)
pub fn relative_change(prev: &Tensor, cur: &Tensor) -> f64 {
    squared_distance(prev, cur).sqrt() / (norm(cur) + REL_EPS)
}

/// Peak signal-to-noise ratio of `x` against `reference` (peak 1.0)
///
/// Returns [`PSNR_SENTINEL`] when the mean squared error is exactly zero.
pub fn psnr(x: &Tensor, reference: &Tensor) -> f64 {
    let count = x.len().max(1) as f64;
    let mse = squared_distance(x, reference) / count;
    if mse == 0.0 {
        PSNR_SENTINEL
    } else {
        10.0 * (PSNR_MAX_PIXEL * PSNR_MAX_PIXEL / mse).log10()
    }
}

/// Fail with a shape error unless `got` has the `expected` shape
pub fn ensure_shape(context: &'static str, expected: (usize, usize), got: &Tensor) -> Result<()> {
    if got.shape() != expected {
        return Err(OptimError::ShapeMismatch {
            context,
            expected,
            got: got.shape(),
        });
    }
    Ok(())
}

/// True when every entry is finite
pub fn all_finite(t: &Tensor) -> bool {
    t.iter().all(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_norm_and_distance() {
        let a = Tensor::from_row_slice(1, 2, &[3.0, 4.0]);
        let b = Tensor::zeros(1, 2);
        assert_relative_eq!(norm(&a), 5.0, epsilon = 1e-14);
        assert_relative_eq!(squared_distance(&a, &b), 25.0, epsilon = 1e-14);
    }

    #[test]
    fn test_relative_change_identical_is_zero() {
        let a = Tensor::from_row_slice(2, 2, &[1.0, -2.0, 0.5, 4.0]);
        assert_eq!(relative_change(&a, &a), 0.0);
    }

    #[test]
    fn test_psnr_values() {
        let gt = Tensor::from_element(1, 4, 0.5);
        assert_eq!(psnr(&gt, &gt), PSNR_SENTINEL);

        // MSE = 0.01 → 20 dB
        let noisy = gt.add_scalar(0.1);
        assert_relative_eq!(psnr(&noisy, &gt), 20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_ensure_shape() {
        let t = Tensor::zeros(2, 3);
        assert!(ensure_shape("test", (2, 3), &t).is_ok());
        assert!(ensure_shape("test", (3, 2), &t).is_err());
    }
}

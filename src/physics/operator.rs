//! Forward operators A and their adjoints Aᵀ
//!
//! Operators act row-wise on batched tensors: each row of the input is one
//! flattened sample, and the same linear map is applied to every row.

use nalgebra::DMatrix;
use sprs::CsMat;

use crate::error::{OptimError, Result};
use crate::utils::{ensure_shape, Tensor};

/// Linear forward model y = A x
pub trait ForwardOperator: Send + Sync {
    /// Apply A to every batch row
    fn apply(&self, x: &Tensor) -> Result<Tensor>;

    /// Apply Aᵀ to every batch row
    fn apply_adjoint(&self, y: &Tensor) -> Result<Tensor>;
}

/// A = I (denoising)
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl ForwardOperator for Identity {
    fn apply(&self, x: &Tensor) -> Result<Tensor> {
        Ok(x.clone())
    }

    fn apply_adjoint(&self, y: &Tensor) -> Result<Tensor> {
        Ok(y.clone())
    }
}

/// Diagonal mask (inpainting): keeps entries where the mask is non-zero
#[derive(Debug, Clone)]
pub struct Mask {
    weights: Vec<f64>,
}

impl Mask {
    pub fn new(weights: Vec<f64>) -> Self {
        Self { weights }
    }

    /// Binary mask from a keep-predicate over the flattened index
    pub fn from_fn(dim: usize, keep: impl Fn(usize) -> bool) -> Self {
        Self::new((0..dim).map(|i| if keep(i) { 1.0 } else { 0.0 }).collect())
    }

    pub fn dim(&self) -> usize {
        self.weights.len()
    }

    fn scale(&self, t: &Tensor) -> Result<Tensor> {
        ensure_shape("mask operator", (t.nrows(), self.weights.len()), t)?;
        let mut out = t.clone();
        for mut row in out.row_iter_mut() {
            for (v, w) in row.iter_mut().zip(self.weights.iter()) {
                *v *= w;
            }
        }
        Ok(out)
    }
}

impl ForwardOperator for Mask {
    fn apply(&self, x: &Tensor) -> Result<Tensor> {
        self.scale(x)
    }

    fn apply_adjoint(&self, y: &Tensor) -> Result<Tensor> {
        self.scale(y)
    }
}

/// Dense matrix A (m × n): rows of x have length n, rows of y length m
impl ForwardOperator for DMatrix<f64> {
    fn apply(&self, x: &Tensor) -> Result<Tensor> {
        ensure_shape("dense forward operator", (x.nrows(), self.ncols()), x)?;
        Ok(x * self.transpose())
    }

    fn apply_adjoint(&self, y: &Tensor) -> Result<Tensor> {
        ensure_shape("dense adjoint operator", (y.nrows(), self.nrows()), y)?;
        Ok(y * self)
    }
}

/// Sparse matrix A (m × n), CSR or CSC storage
impl ForwardOperator for CsMat<f64> {
    fn apply(&self, x: &Tensor) -> Result<Tensor> {
        ensure_shape("sparse forward operator", (x.nrows(), self.cols()), x)?;
        let mut out = Tensor::zeros(x.nrows(), self.rows());
        for b in 0..x.nrows() {
            for (&val, (row, col)) in self.iter() {
                out[(b, row)] += val * x[(b, col)];
            }
        }
        Ok(out)
    }

    fn apply_adjoint(&self, y: &Tensor) -> Result<Tensor> {
        ensure_shape("sparse adjoint operator", (y.nrows(), self.rows()), y)?;
        let mut out = Tensor::zeros(y.nrows(), self.cols());
        for b in 0..y.nrows() {
            for (&val, (row, col)) in self.iter() {
                out[(b, col)] += val * y[(b, row)];
            }
        }
        Ok(out)
    }
}

/// Check <A x, y> = <x, Aᵀ y> for the given probe tensors
pub fn adjointness_gap(op: &dyn ForwardOperator, x: &Tensor, y: &Tensor) -> Result<f64> {
    let ax = op.apply(x)?;
    let aty = op.apply_adjoint(y)?;
    if ax.shape() != y.shape() {
        return Err(OptimError::ShapeMismatch {
            context: "adjointness probe",
            expected: ax.shape(),
            got: y.shape(),
        });
    }
    Ok((ax.dot(y) - x.dot(&aty)).abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sprs::TriMat;

    fn probe(rows: usize, cols: usize, seed: f64) -> Tensor {
        Tensor::from_fn(rows, cols, |i, j| ((i * cols + j) as f64 * seed).sin())
    }

    #[test]
    fn test_dense_apply_and_adjoint() {
        let a = DMatrix::from_row_slice(2, 3, &[1.0, 0.0, 2.0, 0.0, 3.0, 0.0]);
        let x = Tensor::from_row_slice(1, 3, &[1.0, 1.0, 1.0]);
        let y = a.apply(&x).unwrap();
        assert_eq!(y, Tensor::from_row_slice(1, 2, &[3.0, 3.0]));

        let gap = adjointness_gap(&a, &probe(2, 3, 0.7), &probe(2, 2, 1.3)).unwrap();
        assert_relative_eq!(gap, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_dense_adjoint_is_transpose_product() {
        let a = DMatrix::from_row_slice(2, 3, &[1.0, 0.0, 2.0, 0.0, 3.0, 0.0]);
        let y = Tensor::from_row_slice(2, 2, &[1.0, 2.0, -1.0, 0.5]);
        let aty = a.apply_adjoint(&y).unwrap();
        assert_eq!(aty, Tensor::from_row_slice(2, 3, &[1.0, 6.0, 2.0, -1.0, 1.5, -2.0]));
    }

    #[test]
    fn test_sparse_matches_dense() {
        let mut triplets = TriMat::new((3, 4));
        triplets.add_triplet(0, 0, 2.0);
        triplets.add_triplet(0, 3, -1.0);
        triplets.add_triplet(1, 1, 0.5);
        triplets.add_triplet(2, 2, 4.0);
        let sparse: CsMat<f64> = triplets.to_csr();
        let dense = sparse.to_dense();
        let dense = DMatrix::from_fn(3, 4, |i, j| dense[[i, j]]);

        let x = probe(2, 4, 0.3);
        let y = probe(2, 3, 0.9);
        assert_relative_eq!(sparse.apply(&x).unwrap(), dense.apply(&x).unwrap(), epsilon = 1e-12);
        assert_relative_eq!(sparse.apply_adjoint(&y).unwrap(), dense.apply_adjoint(&y).unwrap(), epsilon = 1e-12);
    }

    #[test]
    fn test_mask_is_self_adjoint() {
        let mask = Mask::from_fn(4, |i| i % 2 == 0);
        let x = Tensor::from_row_slice(1, 4, &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(mask.apply(&x).unwrap(), Tensor::from_row_slice(1, 4, &[1.0, 0.0, 3.0, 0.0]));
        let gap = adjointness_gap(&mask, &probe(3, 4, 0.2), &probe(3, 4, 0.5)).unwrap();
        assert_relative_eq!(gap, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_shape_mismatch() {
        let a = DMatrix::<f64>::identity(3, 3);
        let err = a.apply(&Tensor::zeros(1, 2)).unwrap_err();
        assert!(matches!(err, OptimError::ShapeMismatch { .. }));
    }
}

//! Data-fidelity terms f(x) = d(A x, y)
//!
//! **L2 fidelity**:
//! ```text
//! f(x)        = ½ ||A x − y||²
//! ∇f(x)       = Aᵀ (A x − y)
//! prox_{γf}(v) = argmin_x ½||x − v||² + γ f(x)
//!             = (I + γ AᵀA)⁻¹ (v + γ Aᵀ y)
//! ```
//!
//! The proximal system is SPD and is solved matrix-free with conjugate
//! gradients, one independent solve per batch row.

use std::cell::RefCell;

use rayon::prelude::*;
use tracing::warn;

use crate::error::{OptimError, Result};
use crate::linalg::{ConjugateGradient, LinearOperator};
use crate::physics::ForwardOperator;
use crate::utils::{ensure_shape, Tensor};

/// Data-fidelity capability consumed by the iterator steps
pub trait DataFidelity: Send + Sync {
    /// f(x)
    fn value(&self, x: &Tensor, y: &Tensor, op: &dyn ForwardOperator) -> Result<f64>;

    /// ∇f(x)
    fn grad(&self, x: &Tensor, y: &Tensor, op: &dyn ForwardOperator) -> Result<Tensor>;

    /// prox_{γf}(v)
    fn prox(&self, v: &Tensor, y: &Tensor, op: &dyn ForwardOperator, gamma: f64) -> Result<Tensor>;
}

/// Least-squares fidelity ½||Ax − y||²
#[derive(Debug, Clone, Default)]
pub struct L2 {
    cg: ConjugateGradient,
}

impl L2 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_solver(mut self, cg: ConjugateGradient) -> Self {
        self.cg = cg;
        self
    }
}

/// Single-row operator v ↦ v + γ Aᵀ A v
///
/// The forward operator is fallible but [`LinearOperator::apply`] is not: the
/// first error is parked in `error` and the solve result is discarded.
struct NormalOperator<'a> {
    op: &'a dyn ForwardOperator,
    gamma: f64,
    dim: usize,
    error: RefCell<Option<OptimError>>,
}

impl<'a> LinearOperator for NormalOperator<'a> {
    fn apply(&self, v: &[f64]) -> Vec<f64> {
        if self.error.borrow().is_some() {
            return vec![0.0; self.dim];
        }
        let row = Tensor::from_row_slice(1, self.dim, v);
        let ata = self.op.apply(&row).and_then(|ax| self.op.apply_adjoint(&ax));
        match ata {
            Ok(ata) => v
                .iter()
                .zip(ata.iter())
                .map(|(&vi, &ai)| vi + self.gamma * ai)
                .collect(),
            Err(e) => {
                *self.error.borrow_mut() = Some(e);
                vec![0.0; self.dim]
            }
        }
    }
}

impl DataFidelity for L2 {
    fn value(&self, x: &Tensor, y: &Tensor, op: &dyn ForwardOperator) -> Result<f64> {
        let r = op.apply(x)? - y;
        Ok(0.5 * r.norm_squared())
    }

    fn grad(&self, x: &Tensor, y: &Tensor, op: &dyn ForwardOperator) -> Result<Tensor> {
        let r = op.apply(x)? - y;
        op.apply_adjoint(&r)
    }

    fn prox(&self, v: &Tensor, y: &Tensor, op: &dyn ForwardOperator, gamma: f64) -> Result<Tensor> {
        let aty = op.apply_adjoint(y)?;
        ensure_shape("L2 prox", aty.shape(), v)?;
        let (batch, dim) = v.shape();
        let rhs = v + &aty * gamma;

        let rows: Vec<Vec<f64>> = (0..batch)
            .into_par_iter()
            .map(|b| {
                let normal = NormalOperator {
                    op,
                    gamma,
                    dim,
                    error: RefCell::new(None),
                };
                let b_row: Vec<f64> = rhs.row(b).iter().copied().collect();
                let x0: Vec<f64> = v.row(b).iter().copied().collect();
                let (x, stats) = self.cg.solve(&normal, &b_row, &x0);
                if let Some(e) = normal.error.into_inner() {
                    return Err(e);
                }
                if !stats.converged {
                    warn!(batch = b, %stats, "L2 prox: conjugate gradient did not converge");
                }
                Ok(x)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Tensor::from_fn(batch, dim, |b, j| rows[b][j]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{Identity, Mask};
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    #[test]
    fn test_l2_value_and_grad() {
        let l2 = L2::new();
        let x = Tensor::from_row_slice(1, 2, &[1.0, 2.0]);
        let y = Tensor::from_row_slice(1, 2, &[0.0, 0.0]);
        assert_relative_eq!(l2.value(&x, &y, &Identity).unwrap(), 2.5, epsilon = 1e-14);
        assert_eq!(l2.grad(&x, &y, &Identity).unwrap(), x);
    }

    #[test]
    fn test_l2_prox_identity_closed_form() {
        // prox_{γf}(v) = (v + γ y) / (1 + γ) for A = I
        let l2 = L2::new();
        let v = Tensor::from_row_slice(2, 2, &[1.0, -1.0, 0.5, 2.0]);
        let y = Tensor::from_row_slice(2, 2, &[3.0, 0.0, 1.0, 1.0]);
        let gamma = 0.5;
        let p = l2.prox(&v, &y, &Identity, gamma).unwrap();
        let expected = (&v + &y * gamma) / (1.0 + gamma);
        assert_relative_eq!(p, expected, epsilon = 1e-8);
    }

    #[test]
    fn test_l2_prox_dense_optimality() {
        // Optimality: (x - v) + γ Aᵀ(Ax - y) = 0
        let a = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 0.0, 0.0, 1.0, -1.0]);
        let l2 = L2::new();
        let v = Tensor::from_row_slice(1, 3, &[0.2, -0.4, 1.0]);
        let y = Tensor::from_row_slice(1, 2, &[1.0, 0.5]);
        let gamma = 2.0;
        let x = l2.prox(&v, &y, &a, gamma).unwrap();
        let g = l2.grad(&x, &y, &a).unwrap();
        let optimality = (&x - &v) + g * gamma;
        assert!(optimality.norm() < 1e-7, "prox optimality residual {}", optimality.norm());
    }

    #[test]
    fn test_l2_prox_propagates_operator_error() {
        let mask = Mask::new(vec![1.0, 0.0, 1.0]);
        let v = Tensor::zeros(1, 2);
        let y = Tensor::zeros(1, 3);
        let err = L2::new().prox(&v, &y, &mask, 1.0).unwrap_err();
        assert!(matches!(err, OptimError::ShapeMismatch { .. }));
    }
}

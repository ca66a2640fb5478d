/// Anderson mixing for fixed-point iterations
///
/// Anderson(m) keeps the last m pairs (xᵢ, Φ(xᵢ)) and extrapolates the next
/// iterate from them instead of applying Φ once more:
///
/// ```text
/// 1. Residuals:  gᵢ = Φ(xᵢ) − xᵢ,  G = [g₀; …; g_{n−1}]     (n × dim)
/// 2. Weights:    α = argmin ||Σ αᵢ gᵢ||² + λ||α||²  s.t.  Σ αᵢ = 1
///                (bordered system, see [`DirectSolver::mixing_weights`])
/// 3. Update:     x⁺ = Σ αᵢ (β Φ(xᵢ) + (1 − β) xᵢ)
/// ```
///
/// Each batch row is an independent problem with its own weights; rows are
/// mixed in parallel.
///
/// With a single stored pair the weight is exactly 1, so Anderson(1) with
/// β = 1 reproduces plain fixed-point iteration.
///
/// # References
/// - Walker & Ni (2011) "Anderson Acceleration for Fixed-Point Iterations"
/// - Toth & Kelley (2015) "Convergence analysis for Anderson acceleration"

use nalgebra::DMatrix;
use rayon::prelude::*;
use tracing::trace;

use crate::error::{OptimError, Result};
use crate::linalg::{DirectSolver, HistoryRing};
use crate::utils::{all_finite, Tensor};

/// Anderson mixer over tensor iterates
#[derive(Debug, Clone)]
pub struct AndersonMixer {
    /// Pairs (xᵢ, Φ(xᵢ)); entry k lives in slot k mod m
    history: HistoryRing<(Tensor, Tensor)>,

    /// Ridge added to the residual Gram matrix
    ridge: f64,
}

impl AndersonMixer {
    /// # Arguments
    /// * `history_size` - Number of stored pairs m (must be positive)
    /// * `ridge` - Tikhonov regularization of the weight problem
    pub fn new(history_size: usize, ridge: f64) -> Self {
        Self {
            history: HistoryRing::new(history_size),
            ridge,
        }
    }

    /// Record the next pair
    pub fn push(&mut self, x: Tensor, fx: Tensor) {
        self.history.push((x, fx));
    }

    /// Record the pair produced at `iteration` into slot `iteration mod m`
    pub fn store(&mut self, iteration: usize, x: Tensor, fx: Tensor) {
        self.history.store(iteration, (x, fx));
    }

    /// Extrapolated iterate from the stored window
    ///
    /// Fails with [`OptimError::SingularSystem`] when the weight system of any
    /// batch row cannot be solved.
    pub fn extrapolate(&self, iteration: usize, beta: f64) -> Result<Tensor> {
        let window = self.history.window();
        let (_, latest) = self.history.latest().ok_or_else(|| {
            OptimError::InvalidConfig("Anderson extrapolation needs at least one stored iterate".into())
        })?;
        let (batch, dim) = latest.shape();
        let n = window.len();

        let rows: Vec<Vec<f64>> = (0..batch)
            .into_par_iter()
            .map(|b| {
                let g = DMatrix::from_fn(n, dim, |i, j| window[i].1[(b, j)] - window[i].0[(b, j)]);
                let gram = &g * g.transpose();

                let alpha = DirectSolver::mixing_weights(&gram, self.ridge)
                    .ok_or(OptimError::SingularSystem { iteration, batch: b })?;

                let mut row = vec![0.0; dim];
                for (i, (x, fx)) in window.iter().enumerate() {
                    for (j, r) in row.iter_mut().enumerate() {
                        *r += alpha[i] * (beta * fx[(b, j)] + (1.0 - beta) * x[(b, j)]);
                    }
                }
                Ok(row)
            })
            .collect::<Result<Vec<_>>>()?;

        let next = Tensor::from_fn(batch, dim, |b, j| rows[b][j]);
        if !all_finite(&next) {
            return Err(OptimError::NonFinite {
                iteration,
                what: "Anderson extrapolation",
            });
        }

        trace!(iteration, window = n, beta, "anderson extrapolation");
        Ok(next)
    }

    /// Clear the history
    pub fn reset(&mut self) {
        self.history = HistoryRing::new(self.history.capacity());
    }

    /// Current number of stored pairs
    pub fn history_size(&self) -> usize {
        self.history.len()
    }

    pub fn capacity(&self) -> usize {
        self.history.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn scalar(x: f64) -> Tensor {
        Tensor::from_element(1, 1, x)
    }

    /// Drive x ↦ F(x) with Anderson mixing, returning (x, iterations)
    fn solve_scalar(f: impl Fn(f64) -> f64, depth: usize, target: f64) -> (f64, usize) {
        let mut aa = AndersonMixer::new(depth, 1e-12);
        let mut x = 0.0;
        for it in 0..20 {
            aa.push(scalar(x), scalar(f(x)));
            x = aa.extrapolate(it, 1.0).unwrap()[(0, 0)];
            if (x - target).abs() < 1e-8 {
                return (x, it + 1);
            }
        }
        (x, 20)
    }

    #[test]
    fn test_anderson_linear_convergence() {
        // F(x) = 0.5x + 1, fixed point x* = 2
        let (x, iters) = solve_scalar(|x| 0.5 * x + 1.0, 2, 2.0);
        assert_relative_eq!(x, 2.0, epsilon = 1e-8);
        assert!(iters <= 3, "took {} iterations", iters);
    }

    #[test]
    fn test_anderson_oscillating_problem() {
        // F(x) = -0.8x + 1 oscillates under plain iteration, x* = 1/1.8
        let target = 1.0 / 1.8;
        let (x, iters) = solve_scalar(|x| -0.8 * x + 1.0, 3, target);
        assert_relative_eq!(x, target, epsilon = 1e-8);
        assert!(iters <= 3, "took {} iterations", iters);
    }

    #[test]
    fn test_single_pair_returns_mapped_iterate() {
        let mut aa = AndersonMixer::new(1, 1e-4);
        let x = Tensor::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let fx = Tensor::from_row_slice(2, 2, &[0.5, 1.0, 1.5, 2.0]);
        aa.push(x.clone(), fx.clone());
        assert_eq!(aa.extrapolate(0, 1.0).unwrap(), fx);

        // β = 0.5 averages the pair
        let half = aa.extrapolate(0, 0.5).unwrap();
        assert_relative_eq!(half, (&x + &fx) * 0.5, epsilon = 1e-14);
    }

    #[test]
    fn test_batch_rows_are_independent() {
        // Row 0 follows 0.5x + 1, row 1 follows 0.5x + 3 (fixed points 2 and 6)
        let mut aa = AndersonMixer::new(2, 1e-12);
        let f = |x: &Tensor| Tensor::from_fn(2, 1, |b, _| 0.5 * x[(b, 0)] + if b == 0 { 1.0 } else { 3.0 });
        let mut x = Tensor::zeros(2, 1);
        for it in 0..2 {
            let fx = f(&x);
            aa.push(x.clone(), fx);
            x = aa.extrapolate(it, 1.0).unwrap();
        }
        assert_relative_eq!(x[(0, 0)], 2.0, epsilon = 1e-8);
        assert_relative_eq!(x[(1, 0)], 6.0, epsilon = 1e-8);
    }

    #[test]
    fn test_singular_weights_reported() {
        // Two identical residuals and no ridge: the bordered system is singular
        let mut aa = AndersonMixer::new(2, 0.0);
        aa.push(scalar(1.0), scalar(2.0));
        aa.push(scalar(1.0), scalar(2.0));
        let err = aa.extrapolate(7, 1.0).unwrap_err();
        assert!(matches!(err, OptimError::SingularSystem { iteration: 7, batch: 0 }));
    }

    #[test]
    fn test_anderson_history_management() {
        let mut aa = AndersonMixer::new(3, 1e-8);
        let x = Tensor::from_row_slice(1, 3, &[1.0, 2.0, 3.0]);
        let fx = Tensor::from_row_slice(1, 3, &[1.1, 2.1, 3.1]);

        aa.push(x.clone(), fx.clone());
        assert_eq!(aa.history_size(), 1);
        aa.push(x.clone(), fx.clone());
        assert_eq!(aa.history_size(), 2);

        aa.store(2, x.clone(), fx.clone());
        aa.store(3, x.clone(), fx.clone());
        assert_eq!(aa.history_size(), 3, "History should be limited to depth");

        aa.reset();
        assert_eq!(aa.history_size(), 0);
        assert_eq!(aa.capacity(), 3);
    }
}

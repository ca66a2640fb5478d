use std::time::Instant;
use super::solver::{SolverStats, SolverUtils, LinearOperator};

/// Conjugate Gradient solver for symmetric positive definite operators
///
/// Used matrix-free by the L2 data-fidelity proximal step, where the system
/// `(I + γ AᵀA) x = v + γ Aᵀy` is SPD for any γ > 0.
#[derive(Debug, Clone)]
pub struct ConjugateGradient {
    max_iterations: usize,
    tolerance: f64,
    abs_tolerance: f64,
}

impl ConjugateGradient {
    pub fn new() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-10,
            abs_tolerance: 1e-14,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_abs_tolerance(mut self, abs_tolerance: f64) -> Self {
        self.abs_tolerance = abs_tolerance;
        self
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Solve A x = b starting from `x0`
    pub fn solve<O>(&self, a: &O, b: &[f64], x0: &[f64]) -> (Vec<f64>, SolverStats)
    where
        O: LinearOperator + ?Sized,
    {
        let n = b.len();
        let start = Instant::now();
        let b_norm = SolverUtils::norm(b);

        if b_norm < 1e-25 {
            return (vec![0.0; n], SolverStats {
                iterations: 0,
                residual_norm: 0.0,
                relative_residual: 0.0,
                converged: true,
                solve_time: start.elapsed().as_secs_f64(),
            });
        }

        let mut x = x0.to_vec();
        let ax = a.apply(&x);
        let mut r: Vec<f64> = b.iter().zip(ax.iter()).map(|(&bi, &axi)| bi - axi).collect();
        let mut p = r.clone();
        let mut rr = SolverUtils::dot(&r, &r);

        let mut iteration = 0;
        let mut final_res = rr.sqrt();
        let mut converged = final_res < self.tolerance * b_norm || final_res < self.abs_tolerance;

        while !converged && iteration < self.max_iterations {
            let ap = a.apply(&p);
            let p_ap = SolverUtils::dot(&p, &ap);

            if p_ap.abs() < 1e-30 { break; }
            let alpha = rr / p_ap;

            for i in 0..n {
                x[i] += alpha * p[i];
                r[i] -= alpha * ap[i];
            }
            iteration += 1;

            let rr_new = SolverUtils::dot(&r, &r);
            final_res = rr_new.sqrt();
            if final_res < self.tolerance * b_norm || final_res < self.abs_tolerance {
                converged = true;
                break;
            }

            let beta = rr_new / rr;
            rr = rr_new;

            for i in 0..n {
                p[i] = r[i] + beta * p[i];
            }
        }

        (x, SolverStats {
            iterations: iteration,
            residual_norm: final_res,
            relative_residual: final_res / b_norm,
            converged,
            solve_time: start.elapsed().as_secs_f64(),
        })
    }
}

impl Default for ConjugateGradient {
    fn default() -> Self {
        Self::new()
    }
}

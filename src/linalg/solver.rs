use std::fmt;

/// Statistics from solver execution
#[derive(Debug, Clone)]
pub struct SolverStats {
    /// Number of iterations (0 for direct solvers)
    pub iterations: usize,

    /// Final residual norm ||r|| = ||b - Ax||
    pub residual_norm: f64,

    /// Relative residual ||r|| / ||b||
    pub relative_residual: f64,

    /// Whether solver converged
    pub converged: bool,

    /// Solve time in seconds
    pub solve_time: f64,
}

impl SolverStats {
    pub fn new() -> Self {
        Self {
            iterations: 0,
            residual_norm: 0.0,
            relative_residual: 0.0,
            converged: false,
            solve_time: 0.0,
        }
    }
}

impl Default for SolverStats {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SolverStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "iters={}, rel_res={:.3e}, converged={}",
            self.iterations, self.relative_residual, self.converged
        )
    }
}

/// Trait for a linear operator A that can be applied to a vector x to get Ax
pub trait LinearOperator {
    /// Apply the operator to vector v: out = A * v
    fn apply(&self, v: &[f64]) -> Vec<f64>;
}

/// Vector helpers for the iterative solvers
pub struct SolverUtils;

impl SolverUtils {
    /// Compute L2 norm of a vector
    pub fn norm(v: &[f64]) -> f64 {
        v.iter().map(|&x| x * x).sum::<f64>().sqrt()
    }

    /// Dot product
    pub fn dot(a: &[f64], b: &[f64]) -> f64 {
        a.iter().zip(b.iter()).map(|(&x, &y)| x * y).sum()
    }
}

use nalgebra::{DMatrix, DVector};

/// Dense direct solver for the small bordered systems of Anderson mixing
///
/// For a residual Gram matrix `GGᵀ` (n × n) the bordered system is
///
/// ```text
/// [ 0   1ᵀ          ] [ μ ]   [ 1 ]
/// [ 1   GGᵀ + λ I   ] [ α ] = [ 0 ]
/// ```
///
/// Its solution gives mixing weights α that minimize ||Σ αᵢ gᵢ||² + λ||α||²
/// under the constraint Σ αᵢ = 1 (enforced by the bordered row).
pub struct DirectSolver;

impl DirectSolver {
    /// Solve a dense system with LU decomposition
    ///
    /// Returns `None` when the matrix is singular or the solution is not finite.
    pub fn solve_dense(a: DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
        let x = a.lu().solve(b)?;
        if x.iter().all(|v| v.is_finite()) {
            Some(x)
        } else {
            None
        }
    }

    /// Assemble the bordered (n+1) × (n+1) matrix from a Gram matrix and ridge
    pub fn bordered_matrix(gram: &DMatrix<f64>, ridge: f64) -> DMatrix<f64> {
        let n = gram.nrows();
        let mut h = DMatrix::zeros(n + 1, n + 1);
        for i in 1..=n {
            h[(0, i)] = 1.0;
            h[(i, 0)] = 1.0;
        }
        h.view_mut((1, 1), (n, n)).copy_from(gram);
        for i in 1..=n {
            h[(i, i)] += ridge;
        }
        h
    }

    /// Mixing weights α (length n) for the given residual Gram matrix
    pub fn mixing_weights(gram: &DMatrix<f64>, ridge: f64) -> Option<DVector<f64>> {
        let n = gram.nrows();
        let h = Self::bordered_matrix(gram, ridge);
        let mut rhs = DVector::zeros(n + 1);
        rhs[0] = 1.0;

        let sol = Self::solve_dense(h, &rhs)?;
        Some(sol.rows(1, n).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_direct_solver_simple() {
        // Solve [2 1; 1 2] x = [3; 3]
        let a = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 2.0]);
        let b = DVector::from_vec(vec![3.0, 3.0]);
        let x = DirectSolver::solve_dense(a, &b).unwrap();
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-10);
        assert_relative_eq!(x[1], 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_singular_returns_none() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        let b = DVector::from_vec(vec![1.0, 1.0]);
        assert!(DirectSolver::solve_dense(a, &b).is_none());
    }

    #[test]
    fn test_bordered_layout() {
        let gram = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 9.0]);
        let h = DirectSolver::bordered_matrix(&gram, 0.5);
        assert_eq!(h[(0, 0)], 0.0);
        assert_eq!(h[(0, 2)], 1.0);
        assert_eq!(h[(2, 0)], 1.0);
        assert_eq!(h[(1, 1)], 4.5);
        assert_eq!(h[(1, 2)], 1.0);
        assert_eq!(h[(2, 2)], 9.5);
    }

    #[test]
    fn test_mixing_weights_sum_to_one() {
        let gram = DMatrix::from_row_slice(3, 3, &[
            2.0, 0.3, 0.1,
            0.3, 1.0, 0.2,
            0.1, 0.2, 3.0,
        ]);
        let alpha = DirectSolver::mixing_weights(&gram, 1e-4).unwrap();
        assert_eq!(alpha.len(), 3);
        assert_relative_eq!(alpha.sum(), 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_single_entry_weight_is_one() {
        let gram = DMatrix::from_element(1, 1, 7.0);
        let alpha = DirectSolver::mixing_weights(&gram, 1e-4).unwrap();
        assert_relative_eq!(alpha[0], 1.0, epsilon = 1e-14);
    }
}

//! Iterate carried between iterations

use serde::{Deserialize, Serialize};

use crate::error::{OptimError, Result};
use crate::utils::Tensor;

/// Which component of the estimate is tracked and returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackedVariable {
    #[default]
    Primal,
    Dual,
}

impl TrackedVariable {
    pub fn from_return_dual(return_dual: bool) -> Self {
        if return_dual {
            TrackedVariable::Dual
        } else {
            TrackedVariable::Primal
        }
    }
}

/// Estimate (primal and optional dual component) plus optional cost
///
/// Built once by the optimizer, then replaced wholesale by every step.
#[derive(Debug, Clone, PartialEq)]
pub struct IterateState {
    /// Primal estimate x, shape [batch, dim]
    pub primal: Tensor,
    /// Dual / auxiliary component (observation at initialization)
    pub dual: Option<Tensor>,
    /// Objective value, present only when a cost function is configured
    pub cost: Option<f64>,
}

impl IterateState {
    pub fn new(primal: Tensor) -> Self {
        Self {
            primal,
            dual: None,
            cost: None,
        }
    }

    pub fn with_dual(mut self, dual: Tensor) -> Self {
        self.dual = Some(dual);
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }

    /// Same secondary components, new primal; the cost is cleared
    pub fn with_primal(&self, primal: Tensor) -> Self {
        Self {
            primal,
            dual: self.dual.clone(),
            cost: None,
        }
    }

    /// Number of estimate components (1 or 2)
    pub fn arity(&self) -> usize {
        if self.dual.is_some() { 2 } else { 1 }
    }

    /// The tracked component
    pub fn tracked(&self, var: TrackedVariable) -> Result<&Tensor> {
        match var {
            TrackedVariable::Primal => Ok(&self.primal),
            TrackedVariable::Dual => self
                .dual
                .as_ref()
                .ok_or(OptimError::ArityMismatch { expected: 2, got: 1 }),
        }
    }

    /// Consume the state and return the tracked component
    pub fn into_tracked(self, var: TrackedVariable) -> Result<Tensor> {
        match var {
            TrackedVariable::Primal => Ok(self.primal),
            TrackedVariable::Dual => self
                .dual
                .ok_or(OptimError::ArityMismatch { expected: 2, got: 1 }),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.primal.nrows()
    }
}

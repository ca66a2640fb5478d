//! Gradient-based update rules
//!
//! **Gradient descent**:
//! ```text
//! x⁺ = x − τ (∇f(x) + λ ∇g(x))
//! ```
//!
//! **Proximal gradient** (forward-backward splitting):
//! ```text
//! x⁺ = prox_{τλ g}(x − τ ∇f(x))
//! ```
//!
//! The dual component, when present, is carried through unchanged.

use crate::error::Result;
use crate::iterators::{IteratorStep, StepComponents};
use crate::optim::schedule::{ParamSet, LAMBDA, STEPSIZE};
use crate::optim::state::IterateState;
use crate::physics::ForwardOperator;
use crate::utils::Tensor;

/// Explicit gradient step on f + λ g
pub struct GradientDescent {
    components: StepComponents,
}

impl GradientDescent {
    pub fn new(components: StepComponents) -> Self {
        Self { components }
    }
}

impl IteratorStep for GradientDescent {
    fn step(
        &self,
        state: &IterateState,
        prior_params: &ParamSet,
        algo_params: &ParamSet,
        observation: &Tensor,
        operator: &dyn ForwardOperator,
    ) -> Result<IterateState> {
        let tau = algo_params.get(STEPSIZE)?;
        let lambda = algo_params.get(LAMBDA)?;
        let x = &state.primal;

        let grad_f = self.components.data_fidelity.grad(x, observation, operator)?;
        let grad_g = self.components.prior.grad(x, prior_params)?;
        let next = x - (grad_f + grad_g * lambda) * tau;

        self.components
            .finish(next, state.dual.clone(), algo_params, observation, operator)
    }

    fn name(&self) -> &str {
        "GD"
    }
}

/// Gradient step on f followed by the proximal operator of λ g
pub struct ProximalGradient {
    components: StepComponents,
}

impl ProximalGradient {
    pub fn new(components: StepComponents) -> Self {
        Self { components }
    }
}

impl IteratorStep for ProximalGradient {
    fn step(
        &self,
        state: &IterateState,
        prior_params: &ParamSet,
        algo_params: &ParamSet,
        observation: &Tensor,
        operator: &dyn ForwardOperator,
    ) -> Result<IterateState> {
        let tau = algo_params.get(STEPSIZE)?;
        let lambda = algo_params.get(LAMBDA)?;
        let x = &state.primal;

        let grad_f = self.components.data_fidelity.grad(x, observation, operator)?;
        let forward = x - grad_f * tau;
        let next = self.components.prior.prox(&forward, prior_params, tau * lambda)?;

        self.components
            .finish(next, state.dual.clone(), algo_params, observation, operator)
    }

    fn name(&self) -> &str {
        "PGD"
    }
}

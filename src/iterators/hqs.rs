//! Half-quadratic splitting
//!
//! ```text
//! u  = prox_{τ f}(x)
//! x⁺ = prox_{τλ g}(u)
//! ```
//!
//! When the state carries a dual slot it holds the data-consistent auxiliary `u`.

use crate::error::Result;
use crate::iterators::{IteratorStep, StepComponents};
use crate::optim::schedule::{ParamSet, LAMBDA, STEPSIZE};
use crate::optim::state::IterateState;
use crate::physics::ForwardOperator;
use crate::utils::Tensor;

pub struct HalfQuadraticSplitting {
    components: StepComponents,
}

impl HalfQuadraticSplitting {
    pub fn new(components: StepComponents) -> Self {
        Self { components }
    }
}

impl IteratorStep for HalfQuadraticSplitting {
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

        let u = self
            .components
            .data_fidelity
            .prox(&state.primal, observation, operator, tau)?;
        let next = self.components.prior.prox(&u, prior_params, tau * lambda)?;
        let dual = state.dual.as_ref().map(|_| u);

        self.components.finish(next, dual, algo_params, observation, operator)
    }

    fn name(&self) -> &str {
        "HQS"
    }
}

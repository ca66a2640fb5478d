//! Objective evaluation F(x) = f(x) + λ g(x)

use std::sync::Arc;

use crate::error::Result;
use crate::optim::schedule::{ParamSet, LAMBDA};
use crate::physics::{DataFidelity, ForwardOperator};
use crate::prior::Prior;
use crate::utils::Tensor;

/// Optional cost capability: `cost(estimate, params, observation, operator)`
pub trait CostFunction: Send + Sync {
    fn cost(&self, x: &Tensor, params: &ParamSet, y: &Tensor, op: &dyn ForwardOperator) -> Result<f64>;
}

impl<F> CostFunction for F
where
    F: Fn(&Tensor, &ParamSet, &Tensor, &dyn ForwardOperator) -> Result<f64> + Send + Sync,
{
    fn cost(&self, x: &Tensor, params: &ParamSet, y: &Tensor, op: &dyn ForwardOperator) -> Result<f64> {
        self(x, params, y, op)
    }
}

/// f(x) + λ g(x), with λ read from the algorithm parameters (default 1)
#[derive(Clone)]
pub struct Objective {
    data_fidelity: Arc<dyn DataFidelity>,
    prior: Arc<dyn Prior>,
    prior_params: ParamSet,
}

impl Objective {
    pub fn new(data_fidelity: Arc<dyn DataFidelity>, prior: Arc<dyn Prior>) -> Self {
        Self {
            data_fidelity,
            prior,
            prior_params: ParamSet::new(),
        }
    }

    /// Fixed prior parameters used when evaluating g (e.g. `sigma_denoiser`)
    pub fn with_prior_params(mut self, params: ParamSet) -> Self {
        self.prior_params = params;
        self
    }
}

impl CostFunction for Objective {
    fn cost(&self, x: &Tensor, params: &ParamSet, y: &Tensor, op: &dyn ForwardOperator) -> Result<f64> {
        let lambda = params.get_or(LAMBDA, 1.0);
        let f = self.data_fidelity.value(x, y, op)?;
        let g = self.prior.value(x, &self.prior_params)?;
        Ok(f + lambda * g)
    }
}

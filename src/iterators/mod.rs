//! Update rules plugged into the fixed-point engines
//!
//! An [`IteratorStep`] maps the current iterate to the next one. Built-in
//! steps are constructed through the closed [`Algorithm`] registry; any other
//! update rule can implement the trait directly.

pub mod gradient;
pub mod hqs;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{OptimError, Result};
use crate::optim::cost::CostFunction;
use crate::optim::schedule::ParamSet;
use crate::optim::state::IterateState;
use crate::physics::{DataFidelity, ForwardOperator};
use crate::prior::Prior;
use crate::utils::Tensor;

pub use gradient::{GradientDescent, ProximalGradient};
pub use hqs::HalfQuadraticSplitting;

/// One application of the iteration map Φ
///
/// Implementations must be deterministic functions of their inputs and must
/// preserve the arity of the estimate (primal only, or primal + dual).
pub trait IteratorStep: Send + Sync {
    fn step(
        &self,
        state: &IterateState,
        prior_params: &ParamSet,
        algo_params: &ParamSet,
        observation: &Tensor,
        operator: &dyn ForwardOperator,
    ) -> Result<IterateState>;

    fn name(&self) -> &str;
}

/// Collaborators shared by the built-in steps
#[derive(Clone)]
pub struct StepComponents {
    pub data_fidelity: Arc<dyn DataFidelity>,
    pub prior: Arc<dyn Prior>,
    pub cost_fn: Option<Arc<dyn CostFunction>>,
}

impl StepComponents {
    pub fn new(data_fidelity: Arc<dyn DataFidelity>, prior: Arc<dyn Prior>) -> Self {
        Self {
            data_fidelity,
            prior,
            cost_fn: None,
        }
    }

    pub fn with_cost_fn(mut self, cost_fn: Arc<dyn CostFunction>) -> Self {
        self.cost_fn = Some(cost_fn);
        self
    }

    /// Assemble the next state, evaluating the cost when configured
    pub(crate) fn finish(
        &self,
        primal: Tensor,
        dual: Option<Tensor>,
        algo_params: &ParamSet,
        observation: &Tensor,
        operator: &dyn ForwardOperator,
    ) -> Result<IterateState> {
        let cost = match &self.cost_fn {
            Some(f) => Some(f.cost(&primal, algo_params, observation, operator)?),
            None => None,
        };
        Ok(IterateState { primal, dual, cost })
    }
}

/// Constructor stored in the registry
pub type StepConstructor = fn(StepComponents) -> Box<dyn IteratorStep>;

/// Enumerated algorithm identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    #[serde(rename = "GD")]
    GradientDescent,
    #[serde(rename = "PGD")]
    ProximalGradient,
    #[serde(rename = "HQS")]
    HalfQuadraticSplitting,
}

/// Every algorithm with its identifier and constructor
pub const REGISTRY: [(Algorithm, &str, StepConstructor); 3] = [
    (Algorithm::GradientDescent, "GD", build_gd),
    (Algorithm::ProximalGradient, "PGD", build_pgd),
    (Algorithm::HalfQuadraticSplitting, "HQS", build_hqs),
];

fn build_gd(components: StepComponents) -> Box<dyn IteratorStep> {
    Box::new(GradientDescent::new(components))
}

fn build_pgd(components: StepComponents) -> Box<dyn IteratorStep> {
    Box::new(ProximalGradient::new(components))
}

fn build_hqs(components: StepComponents) -> Box<dyn IteratorStep> {
    Box::new(HalfQuadraticSplitting::new(components))
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::GradientDescent => "GD",
            Algorithm::ProximalGradient => "PGD",
            Algorithm::HalfQuadraticSplitting => "HQS",
        }
    }

    pub fn constructor(&self) -> StepConstructor {
        match self {
            Algorithm::GradientDescent => build_gd,
            Algorithm::ProximalGradient => build_pgd,
            Algorithm::HalfQuadraticSplitting => build_hqs,
        }
    }

    /// Instantiate the update rule for this algorithm
    pub fn build(&self, components: StepComponents) -> Box<dyn IteratorStep> {
        (self.constructor())(components)
    }
}

impl FromStr for Algorithm {
    type Err = OptimError;

    fn from_str(s: &str) -> Result<Self> {
        REGISTRY
            .iter()
            .find(|(_, name, _)| *name == s)
            .map(|(alg, _, _)| *alg)
            .ok_or_else(|| OptimError::UnknownAlgorithm(s.to_string()))
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::L2;
    use crate::prior::Tikhonov;

    fn components() -> StepComponents {
        StepComponents::new(Arc::new(L2::new()), Arc::new(Tikhonov))
    }

    #[test]
    fn test_registry_covers_every_algorithm() {
        for (alg, name, _) in REGISTRY.iter() {
            assert_eq!(alg.as_str(), *name);
            assert_eq!(name.parse::<Algorithm>().unwrap(), *alg);
            assert_eq!(alg.build(components()).name(), *name);
        }
    }

    #[test]
    fn test_unknown_algorithm() {
        let err = "ADMM".parse::<Algorithm>().unwrap_err();
        assert!(matches!(err, OptimError::UnknownAlgorithm(ref s) if s == "ADMM"));
    }
}

//! Per-iteration parameter schedules and backtracking
//!
//! Algorithm and prior parameters are configured either as a single constant
//! or as a sequence with exactly one value per iteration:
//!
//! ```toml
//! [params_algo]
//! stepsize = 1.0
//! lambda = [0.5, 0.4, 0.3]   # requires max_iter = 3
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{OptimError, Result};
use crate::optim::state::IterateState;
use crate::utils::squared_distance;

/// Key of the step size in the algorithm schedule
pub const STEPSIZE: &str = "stepsize";

/// Key of the regularization weight in the algorithm schedule
pub const LAMBDA: &str = "lambda";

/// A constant or a per-iteration sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Constant(f64),
    Scheduled(Vec<f64>),
}

impl ParamValue {
    /// Number of configured values (1 for a constant)
    pub fn len(&self) -> usize {
        match self {
            ParamValue::Constant(_) => 1,
            ParamValue::Scheduled(seq) => seq.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value for `iteration`; a single value applies to every iteration
    pub fn at(&self, iteration: usize) -> Option<f64> {
        match self {
            ParamValue::Constant(v) => Some(*v),
            ParamValue::Scheduled(seq) if seq.len() == 1 => Some(seq[0]),
            ParamValue::Scheduled(seq) => seq.get(iteration).copied(),
        }
    }

    /// Check the length invariant: 1 or exactly `max_iter`
    pub fn validate(&self, name: &str, max_iter: usize) -> Result<()> {
        let len = self.len();
        if len == 1 || len == max_iter {
            Ok(())
        } else {
            Err(OptimError::ScheduleLength {
                name: name.to_string(),
                len,
                max_iter,
            })
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Constant(v)
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(seq: Vec<f64>) -> Self {
        ParamValue::Scheduled(seq)
    }
}

/// Parameter values resolved for a single iteration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSet {
    values: BTreeMap<String, f64>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    /// Value of `name`, or a configuration error if it is not scheduled
    pub fn get(&self, name: &str) -> Result<f64> {
        self.values
            .get(name)
            .copied()
            .ok_or_else(|| OptimError::MissingParameter(name.to_string()))
    }

    pub fn get_or(&self, name: &str, default: f64) -> f64 {
        self.values.get(name).copied().unwrap_or(default)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for ParamSet {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        let mut set = ParamSet::new();
        for (k, v) in iter {
            set.insert(k, v);
        }
        set
    }
}

/// Validated mapping from parameter name to [`ParamValue`]
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSchedule {
    max_iter: usize,
    values: BTreeMap<String, ParamValue>,
}

impl ParameterSchedule {
    /// Build a schedule, rejecting sequences whose length is neither 1 nor `max_iter`
    pub fn new(values: BTreeMap<String, ParamValue>, max_iter: usize) -> Result<Self> {
        for (name, value) in &values {
            value.validate(name, max_iter)?;
        }
        Ok(Self { max_iter, values })
    }

    pub fn empty(max_iter: usize) -> Self {
        Self {
            max_iter,
            values: BTreeMap::new(),
        }
    }

    pub fn max_iter(&self) -> usize {
        self.max_iter
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Value of `name` at `iteration`
    pub fn resolve(&self, name: &str, iteration: usize) -> Result<f64> {
        let value = self
            .values
            .get(name)
            .ok_or_else(|| OptimError::MissingParameter(name.to_string()))?;
        value.at(iteration).ok_or_else(|| OptimError::ScheduleLength {
            name: name.to_string(),
            len: value.len(),
            max_iter: self.max_iter,
        })
    }

    /// Every parameter resolved at `iteration`
    pub fn resolve_all(&self, iteration: usize) -> Result<ParamSet> {
        let mut set = ParamSet::new();
        for name in self.values.keys() {
            set.insert(name.clone(), self.resolve(name, iteration)?);
        }
        Ok(set)
    }

    /// Replace the schedule of `name` with a single constant
    pub fn set_constant(&mut self, name: &str, value: f64) {
        self.values.insert(name.to_string(), ParamValue::Constant(value));
    }

    /// Apply the backtracking sufficient-decrease test to the step `prev → state`
    ///
    /// `iteration` is the iteration about to run; the step size that produced
    /// `state` is the one resolved at `iteration - 1`. When the test fails the
    /// step size schedule collapses to `eta * stepsize` for all remaining
    /// iterations. Returns the new step size when it was shrunk.
    pub fn apply_backtracking(
        &mut self,
        rule: &Backtracking,
        iteration: usize,
        prev: &IterateState,
        state: &IterateState,
    ) -> Result<Option<f64>> {
        let (cost_prev, cost) = match (prev.cost, state.cost) {
            (Some(a), Some(b)) => (a, b),
            _ => return Err(OptimError::MissingCostFunction("backtracking")),
        };
        let stepsize = self.resolve(STEPSIZE, iteration.saturating_sub(1))?;

        let diff_cost = cost_prev - cost;
        let diff_x = squared_distance(&state.primal, &prev.primal);

        if diff_cost < (rule.gamma / stepsize) * diff_x {
            let shrunk = rule.eta * stepsize;
            info!(
                iteration,
                old_stepsize = stepsize,
                new_stepsize = shrunk,
                "backtracking: sufficient decrease failed, shrinking step size"
            );
            self.set_constant(STEPSIZE, shrunk);
            return Ok(Some(shrunk));
        }
        Ok(None)
    }
}

/// Sufficient-decrease rule for step size backtracking
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backtracking {
    /// Sufficient-decrease constant
    pub gamma: f64,
    /// Shrink factor in (0, 1)
    pub eta: f64,
}

impl Default for Backtracking {
    fn default() -> Self {
        Self { gamma: 0.1, eta: 0.9 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Tensor;

    fn schedule(pairs: &[(&str, ParamValue)], max_iter: usize) -> Result<ParameterSchedule> {
        let values = pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        ParameterSchedule::new(values, max_iter)
    }

    fn scalar_state(x: f64, cost: f64) -> IterateState {
        IterateState::new(Tensor::from_element(1, 1, x)).with_cost(cost)
    }

    #[test]
    fn test_constant_resolves_for_every_iteration() {
        let s = schedule(&[("stepsize", 0.25.into())], 10).unwrap();
        for it in 0..10 {
            assert_eq!(s.resolve("stepsize", it).unwrap(), 0.25);
        }
    }

    #[test]
    fn test_length_one_sequence_is_constant() {
        let s = schedule(&[("lambda", vec![2.0].into())], 7).unwrap();
        assert_eq!(s.resolve("lambda", 0).unwrap(), 2.0);
        assert_eq!(s.resolve("lambda", 6).unwrap(), 2.0);
    }

    #[test]
    fn test_sequence_indexed_by_iteration() {
        let s = schedule(&[("lambda", vec![3.0, 2.0, 1.0].into())], 3).unwrap();
        assert_eq!(s.resolve("lambda", 1).unwrap(), 2.0);
        let set = s.resolve_all(2).unwrap();
        assert_eq!(set.get("lambda").unwrap(), 1.0);
    }

    #[test]
    fn test_bad_length_is_configuration_error() {
        let err = schedule(&[("lambda", vec![1.0, 2.0].into())], 5).unwrap_err();
        assert!(matches!(err, OptimError::ScheduleLength { len: 2, max_iter: 5, .. }));
    }

    #[test]
    fn test_missing_parameter() {
        let s = ParameterSchedule::empty(4);
        assert!(matches!(s.resolve("stepsize", 0), Err(OptimError::MissingParameter(_))));
        assert!(s.resolve_all(0).unwrap().get("stepsize").is_err());
    }

    #[test]
    fn test_backtracking_shrinks_on_insufficient_decrease() {
        let mut s = schedule(&[(STEPSIZE, 1.0.into())], 10).unwrap();
        let rule = Backtracking { gamma: 0.1, eta: 0.5 };
        // Cost increased: diff_cost < 0 ≤ gamma/τ·diff_x
        let prev = scalar_state(1.0, 1.0);
        let state = scalar_state(2.0, 1.5);
        let shrunk = s.apply_backtracking(&rule, 1, &prev, &state).unwrap();
        assert_eq!(shrunk, Some(0.5));
        for it in 0..10 {
            assert_eq!(s.resolve(STEPSIZE, it).unwrap(), 0.5);
        }
    }

    #[test]
    fn test_backtracking_keeps_step_on_sufficient_decrease() {
        let mut s = schedule(&[(STEPSIZE, 1.0.into())], 10).unwrap();
        let rule = Backtracking::default();
        let prev = scalar_state(1.0, 10.0);
        let state = scalar_state(0.9, 1.0);
        assert_eq!(s.apply_backtracking(&rule, 1, &prev, &state).unwrap(), None);
        assert_eq!(s.resolve(STEPSIZE, 5).unwrap(), 1.0);
    }

    #[test]
    fn test_backtracking_collapses_sequence_and_never_grows() {
        let seq: Vec<f64> = (0..5).map(|i| 1.0 + i as f64).collect();
        let mut s = schedule(&[(STEPSIZE, seq.into())], 5).unwrap();
        let rule = Backtracking { gamma: 0.1, eta: 0.9 };
        let prev = scalar_state(0.0, 1.0);
        let state = scalar_state(1.0, 2.0);
        // Step produced at iteration 2 used τ = 3.0
        let shrunk = s.apply_backtracking(&rule, 3, &prev, &state).unwrap().unwrap();
        assert!(shrunk < 3.0);
        assert_eq!(s.get(STEPSIZE), Some(&ParamValue::Constant(shrunk)));
        assert_eq!(s.resolve(STEPSIZE, 4).unwrap(), shrunk);
    }

    #[test]
    fn test_backtracking_requires_cost() {
        let mut s = schedule(&[(STEPSIZE, 1.0.into())], 3).unwrap();
        let prev = IterateState::new(Tensor::zeros(1, 1));
        let state = IterateState::new(Tensor::zeros(1, 1));
        let err = s.apply_backtracking(&Backtracking::default(), 1, &prev, &state).unwrap_err();
        assert!(matches!(err, OptimError::MissingCostFunction(_)));
    }
}

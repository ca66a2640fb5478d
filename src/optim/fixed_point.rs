//! Plain fixed-point iteration x⁺ = Φ(x)
//!
//! ```text
//! Loop k = 0, 1, …, max_iter − 1
//!   1. Backtracking on the previous step (if enabled)
//!   2. Resolve prior and algorithm parameters for k
//!   3. Step:    x^{k+1} = Φ(x^k)
//!   4. Metrics: residual, psnr, cost, custom
//!   5. Check:   criterion(x^k, x^{k+1}) < tol and k > 1 → converged
//! ```
//!
//! All mutable run state (schedules, convergence flag, metrics) lives in a
//! [`RunContext`] created per run, so one optimizer can drive any number of
//! concurrent runs.

use std::fmt;

use tracing::info;

use crate::error::{OptimError, Result};
use crate::iterators::IteratorStep;
use crate::optim::convergence::ConvergenceMonitor;
use crate::optim::cost::CostFunction;
use crate::optim::metrics::{Metrics, MetricsTracker};
use crate::optim::schedule::{Backtracking, ParamSet, ParameterSchedule};
use crate::optim::state::IterateState;
use crate::physics::ForwardOperator;
use crate::utils::Tensor;

/// Inputs fixed for the whole run
#[derive(Clone, Copy)]
pub struct Problem<'a> {
    pub observation: &'a Tensor,
    pub operator: &'a dyn ForwardOperator,
    pub ground_truth: Option<&'a Tensor>,
}

/// How the iteration ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Early stop after the criterion crossed the threshold
    Converged,
    /// Iteration budget exhausted
    MaxIterReached,
}

/// Statistics from a fixed-point run
#[derive(Debug, Clone, PartialEq)]
pub struct RunStats {
    /// Number of iterations performed
    pub iterations: usize,

    /// Did the criterion ever cross the threshold?
    pub converged: bool,

    pub termination: Termination,

    /// Criterion value of the last check
    pub final_criterion: f64,
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "iters={}, criterion={:.3e}, converged={}, termination={:?}",
            self.iterations, self.final_criterion, self.converged, self.termination
        )
    }
}

/// Mutable state of a single run
pub struct RunContext<'a> {
    step: &'a dyn IteratorStep,
    cost_fn: Option<&'a dyn CostFunction>,
    tracker: &'a MetricsTracker,
    params_algo: ParameterSchedule,
    prior: ParameterSchedule,
    backtracking: Option<Backtracking>,
    monitor: ConvergenceMonitor,
    metrics: Option<Metrics>,
}

impl<'a> RunContext<'a> {
    pub fn new(
        step: &'a dyn IteratorStep,
        tracker: &'a MetricsTracker,
        params_algo: ParameterSchedule,
        prior: ParameterSchedule,
        monitor: ConvergenceMonitor,
    ) -> Self {
        Self {
            step,
            cost_fn: None,
            tracker,
            params_algo,
            prior,
            backtracking: None,
            monitor,
            metrics: tracker.init(),
        }
    }

    pub fn with_cost_fn(mut self, cost_fn: Option<&'a dyn CostFunction>) -> Self {
        self.cost_fn = cost_fn;
        self
    }

    pub fn with_backtracking(mut self, rule: Option<Backtracking>) -> Self {
        self.backtracking = rule;
        self
    }

    /// Backtracking on `last_step` (input, output), then (prior, algorithm) parameters
    pub fn resolve(
        &mut self,
        iteration: usize,
        last_step: Option<(&IterateState, &IterateState)>,
    ) -> Result<(ParamSet, ParamSet)> {
        if let (Some(rule), Some((prev, state))) = (self.backtracking.as_ref(), last_step) {
            self.params_algo.apply_backtracking(rule, iteration, prev, state)?;
        }
        let prior = self.prior.resolve_all(iteration)?;
        let algo = self.params_algo.resolve_all(iteration)?;
        Ok((prior, algo))
    }

    /// Evaluate the configured cost function on `state`
    pub fn evaluate_cost(&self, state: &mut IterateState, algo: &ParamSet, problem: &Problem<'_>) -> Result<()> {
        if let Some(f) = self.cost_fn {
            state.cost = Some(f.cost(&state.primal, algo, problem.observation, problem.operator)?);
        }
        Ok(())
    }

    /// One application of Φ, checked for arity and shape
    pub fn apply_step(
        &self,
        input: &IterateState,
        prior: &ParamSet,
        algo: &ParamSet,
        problem: &Problem<'_>,
    ) -> Result<IterateState> {
        let mut next = self
            .step
            .step(input, prior, algo, problem.observation, problem.operator)?;

        if next.arity() != input.arity() {
            return Err(OptimError::ArityMismatch {
                expected: input.arity(),
                got: next.arity(),
            });
        }
        if next.primal.shape() != input.primal.shape() {
            return Err(OptimError::ShapeMismatch {
                context: "iterator step",
                expected: input.primal.shape(),
                got: next.primal.shape(),
            });
        }
        if let (Some(before), Some(after)) = (&input.dual, &next.dual) {
            if after.shape() != before.shape() {
                return Err(OptimError::ShapeMismatch {
                    context: "iterator step dual",
                    expected: before.shape(),
                    got: after.shape(),
                });
            }
        }
        if next.cost.is_none() {
            self.evaluate_cost(&mut next, algo, problem)?;
        }
        Ok(next)
    }

    /// Metrics, then convergence check; true when the threshold was crossed
    pub fn record(
        &mut self,
        iteration: usize,
        input: &IterateState,
        output: &IterateState,
        problem: &Problem<'_>,
    ) -> Result<bool> {
        self.tracker
            .update(&mut self.metrics, input, output, problem.ground_truth)?;
        self.monitor.check(iteration, input, output)
    }

    pub fn has_converged(&self) -> bool {
        self.monitor.has_converged()
    }

    pub fn params_algo(&self) -> &ParameterSchedule {
        &self.params_algo
    }

    /// Hand the collected series to the caller
    pub fn take_metrics(&mut self) -> Option<Metrics> {
        self.metrics.take()
    }

    pub(crate) fn stats(&self, iterations: usize, termination: Termination) -> RunStats {
        RunStats {
            iterations,
            converged: self.monitor.has_converged(),
            termination,
            final_criterion: self.monitor.last_value(),
        }
    }
}

/// Plain fixed-point engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedPointEngine {
    pub max_iter: usize,
    pub early_stop: bool,
}

impl FixedPointEngine {
    pub fn new(max_iter: usize, early_stop: bool) -> Self {
        Self { max_iter, early_stop }
    }

    /// Iterate from `init` until early stop or `max_iter`
    pub fn run(
        &self,
        ctx: &mut RunContext<'_>,
        problem: &Problem<'_>,
        init: IterateState,
    ) -> Result<(IterateState, RunStats)> {
        let mut state = init;
        let mut prev: Option<IterateState> = None;
        let mut iterations = 0;
        let mut termination = Termination::MaxIterReached;

        for it in 0..self.max_iter {
            let (prior, algo) = ctx.resolve(it, prev.as_ref().map(|p| (p, &state)))?;
            let next = ctx.apply_step(&state, &prior, &algo, problem)?;
            let crossed = ctx.record(it, &state, &next, problem)?;

            prev = Some(std::mem::replace(&mut state, next));
            iterations = it + 1;

            if self.early_stop && crossed && it > 1 {
                info!(iteration = it, "fixed-point iteration converged");
                termination = Termination::Converged;
                break;
            }
        }

        Ok((state, ctx.stats(iterations, termination)))
    }
}

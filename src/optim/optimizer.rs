//! Orchestrator: initial iterate, engine selection and run output
//!
//! An [`Optimizer`] is immutable once built. Every call to [`Optimizer::run`]
//! works on its own [`RunContext`], so the same optimizer can be shared
//! between threads and run on several observations at once.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::OptimConfig;
use crate::error::{OptimError, Result};
use crate::iterators::{Algorithm, IteratorStep, StepComponents};
use crate::optim::anderson::AndersonEngine;
use crate::optim::convergence::{ConvergenceCriterion, ConvergenceMonitor};
use crate::optim::cost::CostFunction;
use crate::optim::fixed_point::{FixedPointEngine, Problem, RunContext, RunStats};
use crate::optim::metrics::{CustomMetricFn, Metrics, MetricsTracker};
use crate::optim::schedule::{ParamSet, ParameterSchedule};
use crate::optim::state::IterateState;
use crate::physics::{DataFidelity, ForwardOperator};
use crate::prior::Prior;
use crate::utils::{ensure_shape, Tensor};

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Tracked component of the final iterate (primal, or dual with `return_dual`)
    pub estimate: Tensor,
    /// Per-iteration series, `None` when `return_metrics = false`
    pub metrics: Option<Metrics>,
    pub stats: RunStats,
}

/// Iteration scheme chosen by the configuration
#[derive(Debug, Clone, PartialEq)]
pub enum Engine {
    FixedPoint(FixedPointEngine),
    Anderson(AndersonEngine),
}

impl Engine {
    pub fn from_config(config: &OptimConfig) -> Self {
        if config.anderson_acceleration {
            Engine::Anderson(AndersonEngine::new(
                config.max_iter,
                config.early_stop,
                config.anderson_history_size,
                config.anderson_ridge,
                config.anderson_beta.clone(),
            ))
        } else {
            Engine::FixedPoint(FixedPointEngine::new(config.max_iter, config.early_stop))
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Engine::FixedPoint(_) => "fixed-point",
            Engine::Anderson(_) => "anderson",
        }
    }

    pub fn run(
        &self,
        ctx: &mut RunContext<'_>,
        problem: &Problem<'_>,
        init: IterateState,
    ) -> Result<(IterateState, RunStats)> {
        match self {
            Engine::FixedPoint(engine) => engine.run(ctx, problem, init),
            Engine::Anderson(engine) => engine.run(ctx, problem, init),
        }
    }
}

/// Fixed-point optimizer for `min_x f(Ax, y) + λ g(x)`
///
/// # Example
/// ```rust,ignore
/// use inverse_solver::*;
/// use std::sync::Arc;
///
/// let mut config = OptimConfig::with_anderson();
/// config.set_param("stepsize", 0.5).set_param("lambda", 0.1);
///
/// let optimizer = Optimizer::from_algorithm(
///     Algorithm::ProximalGradient,
///     Arc::new(L2::new()),
///     Arc::new(L1),
///     config,
/// )?;
/// let output = optimizer.run(&y, &mask, Some(&x_true))?;
/// println!("{}", output.stats);
/// ```
pub struct Optimizer {
    config: OptimConfig,
    step: Box<dyn IteratorStep>,
    /// Built-in algorithm and its collaborators, kept to rebuild the step
    algorithm: Option<(Algorithm, StepComponents)>,
    cost_fn: Option<Arc<dyn CostFunction>>,
    tracker: MetricsTracker,
    params_algo: ParameterSchedule,
    prior: ParameterSchedule,
    engine: Engine,
}

impl Optimizer {
    /// Optimizer around a custom update rule
    pub fn new(config: OptimConfig, step: Box<dyn IteratorStep>) -> Result<Self> {
        config.validate()?;
        let params_algo = config.algo_schedule()?;
        let prior = config.prior_schedule()?;
        let tracker = MetricsTracker::new(config.return_metrics, config.tracked_variable(), false);
        let engine = Engine::from_config(&config);

        Ok(Self {
            config,
            step,
            algorithm: None,
            cost_fn: None,
            tracker,
            params_algo,
            prior,
            engine,
        })
    }

    /// Optimizer around one of the built-in algorithms
    pub fn from_algorithm(
        algorithm: Algorithm,
        data_fidelity: Arc<dyn DataFidelity>,
        prior: Arc<dyn Prior>,
        config: OptimConfig,
    ) -> Result<Self> {
        let components = StepComponents::new(data_fidelity, prior);
        let mut optimizer = Self::new(config, algorithm.build(components.clone()))?;
        optimizer.algorithm = Some((algorithm, components));
        Ok(optimizer)
    }

    /// Attach the cost function F(x) used by backtracking, the cost criterion
    /// and the `cost` series
    pub fn with_cost_fn(mut self, cost_fn: Arc<dyn CostFunction>) -> Self {
        if let Some((algorithm, components)) = &self.algorithm {
            self.step = algorithm.build(components.clone().with_cost_fn(cost_fn.clone()));
        }
        self.tracker.set_has_cost(true);
        self.cost_fn = Some(cost_fn);
        self
    }

    /// Register a custom metric reducer, called after every iteration
    pub fn with_custom_metric(mut self, name: impl Into<String>, f: CustomMetricFn) -> Self {
        self.tracker.add_custom(name, f);
        self
    }

    pub fn config(&self) -> &OptimConfig {
        &self.config
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn step_name(&self) -> &str {
        self.step.name()
    }

    /// Check that every feature needing a cost function has one
    pub fn validate(&self) -> Result<()> {
        if self.cost_fn.is_none() {
            if self.config.backtracking {
                return Err(OptimError::MissingCostFunction("backtracking"));
            }
            if self.config.crit_conv == ConvergenceCriterion::Cost {
                return Err(OptimError::MissingCostFunction("cost convergence criterion"));
            }
        }
        Ok(())
    }

    /// Initial iterate: primal Aᵀy, dual y (when tracked), cost at iteration-0 parameters
    pub fn initialize(
        &self,
        params0: &ParamSet,
        observation: &Tensor,
        operator: &dyn ForwardOperator,
    ) -> Result<IterateState> {
        let primal = operator.apply_adjoint(observation)?;
        let mut state = IterateState::new(primal);
        if self.config.return_dual {
            state = state.with_dual(observation.clone());
        }
        if let Some(f) = &self.cost_fn {
            let cost = f.cost(&state.primal, params0, observation, operator)?;
            state = state.with_cost(cost);
        }
        Ok(state)
    }

    /// Solve for one observation
    pub fn run(
        &self,
        observation: &Tensor,
        operator: &dyn ForwardOperator,
        ground_truth: Option<&Tensor>,
    ) -> Result<RunOutput> {
        self.validate()?;

        let tracked = self.config.tracked_variable();
        let params0 = self.params_algo.resolve_all(0)?;
        let init = self.initialize(&params0, observation, operator)?;
        if let Some(gt) = ground_truth {
            ensure_shape("ground truth", init.tracked(tracked)?.shape(), gt)?;
        }

        if self.config.verbose {
            info!(algorithm = self.step.name(), engine = self.engine.name(), max_iter = self.config.max_iter, "starting run");
        } else {
            debug!(algorithm = self.step.name(), engine = self.engine.name(), max_iter = self.config.max_iter, "starting run");
        }

        let monitor = ConvergenceMonitor::new(self.config.crit_conv, self.config.thres_conv, tracked)
            .with_verbose(self.config.verbose);
        let mut ctx = RunContext::new(
            self.step.as_ref(),
            &self.tracker,
            self.params_algo.clone(),
            self.prior.clone(),
            monitor,
        )
        .with_cost_fn(self.cost_fn.as_deref())
        .with_backtracking(self.config.backtracking_rule());

        let problem = Problem {
            observation,
            operator,
            ground_truth,
        };
        let (final_state, stats) = self.engine.run(&mut ctx, &problem, init)?;
        info!(algorithm = self.step.name(), %stats, "run finished");

        Ok(RunOutput {
            estimate: final_state.into_tracked(tracked)?,
            metrics: ctx.take_metrics(),
            stats,
        })
    }
}

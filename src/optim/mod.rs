pub mod schedule;
pub mod state;
pub mod convergence;
pub mod metrics;
pub mod cost;
pub mod fixed_point;
pub mod anderson;
pub mod optimizer;

pub use schedule::{Backtracking, ParamSet, ParamValue, ParameterSchedule, LAMBDA, STEPSIZE};
pub use state::{IterateState, TrackedVariable};
pub use convergence::{ConvergenceCriterion, ConvergenceMonitor};
pub use metrics::{CustomMetricFn, Metrics, MetricsTracker, COST, PSNR, RESIDUAL};
pub use cost::{CostFunction, Objective};
pub use fixed_point::{FixedPointEngine, Problem, RunContext, RunStats, Termination};
pub use anderson::AndersonEngine;
pub use optimizer::{Engine, Optimizer, RunOutput};

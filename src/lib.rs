pub mod error;
pub mod config;
pub mod utils;
pub mod linalg;
pub mod physics;
pub mod prior;
pub mod iterators;
pub mod optim;

pub use error::{ErrorKind, OptimError, Result};
pub use config::OptimConfig;
pub use utils::{Tensor, psnr, relative_change};
pub use linalg::{AndersonMixer, ConjugateGradient, DirectSolver, HistoryRing, LinearOperator, SolverStats};
pub use physics::{DataFidelity, ForwardOperator, Identity, Mask, L2, adjointness_gap};
pub use prior::{Denoiser, Prior, Red, Tikhonov, L1, SIGMA_DENOISER};
pub use iterators::{Algorithm, GradientDescent, HalfQuadraticSplitting, IteratorStep, ProximalGradient, StepComponents, REGISTRY};
pub use optim::{
    AndersonEngine, Backtracking, ConvergenceCriterion, ConvergenceMonitor, CostFunction, CustomMetricFn, Engine,
    FixedPointEngine, IterateState, Metrics, MetricsTracker, Objective, Optimizer, ParamSet, ParamValue,
    ParameterSchedule, RunOutput, RunStats, Termination, TrackedVariable, COST, LAMBDA, PSNR, RESIDUAL, STEPSIZE,
};

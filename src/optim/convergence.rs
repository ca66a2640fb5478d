//! Convergence monitoring on consecutive iterates

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{OptimError, Result};
use crate::optim::state::{IterateState, TrackedVariable};
use crate::utils::{relative_change, REL_EPS};

/// Stopping criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ConvergenceCriterion {
    /// ||x_prev - x|| / (||x|| + ε)
    #[default]
    Residual,
    /// |F_prev - F| / (|F| + ε)
    Cost,
}

impl ConvergenceCriterion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConvergenceCriterion::Residual => "residual",
            ConvergenceCriterion::Cost => "cost",
        }
    }
}

impl FromStr for ConvergenceCriterion {
    type Err = OptimError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "residual" => Ok(ConvergenceCriterion::Residual),
            "cost" => Ok(ConvergenceCriterion::Cost),
            other => Err(OptimError::UnknownCriterion(other.to_string())),
        }
    }
}

impl TryFrom<String> for ConvergenceCriterion {
    type Error = OptimError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ConvergenceCriterion> for String {
    fn from(c: ConvergenceCriterion) -> Self {
        c.as_str().to_string()
    }
}

impl fmt::Display for ConvergenceCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-run convergence state
///
/// The converged flag is sticky: once a step crosses the threshold it stays
/// set for the rest of the run. Whether that ends the loop is up to the
/// engine (early stop, warm-up guard).
#[derive(Debug, Clone)]
pub struct ConvergenceMonitor {
    criterion: ConvergenceCriterion,
    threshold: f64,
    tracked: TrackedVariable,
    verbose: bool,
    converged: bool,
    last_value: f64,
}

impl ConvergenceMonitor {
    pub fn new(criterion: ConvergenceCriterion, threshold: f64, tracked: TrackedVariable) -> Self {
        Self {
            criterion,
            threshold,
            tracked,
            verbose: false,
            converged: false,
            last_value: f64::INFINITY,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Criterion value for the step `prev → state`
    pub fn criterion_value(&self, prev: &IterateState, state: &IterateState) -> Result<f64> {
        match self.criterion {
            ConvergenceCriterion::Residual => Ok(relative_change(
                prev.tracked(self.tracked)?,
                state.tracked(self.tracked)?,
            )),
            ConvergenceCriterion::Cost => match (prev.cost, state.cost) {
                (Some(f_prev), Some(f)) => Ok((f_prev - f).abs() / (f.abs() + REL_EPS)),
                _ => Err(OptimError::MissingCostFunction("cost convergence criterion")),
            },
        }
    }

    /// True when this step crosses the threshold
    pub fn check(&mut self, iteration: usize, prev: &IterateState, state: &IterateState) -> Result<bool> {
        let value = self.criterion_value(prev, state)?;
        self.last_value = value;

        if self.verbose {
            info!(iteration, criterion = %self.criterion, value, threshold = self.threshold, "convergence check");
        } else {
            debug!(iteration, criterion = %self.criterion, value, threshold = self.threshold, "convergence check");
        }

        if value < self.threshold {
            self.converged = true;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn has_converged(&self) -> bool {
        self.converged
    }

    /// Most recent criterion value (infinite before the first check)
    pub fn last_value(&self) -> f64 {
        self.last_value
    }

    pub fn criterion(&self) -> ConvergenceCriterion {
        self.criterion
    }
}

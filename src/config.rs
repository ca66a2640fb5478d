//! Configuration management for optimization runs
//!
//! Reads TOML configuration files and provides the validated knobs of the
//! fixed-point engines: iteration budget, stopping rule, Anderson
//! acceleration, backtracking, outputs, and the per-iteration parameter
//! schedules.
//!
//! ```toml
//! max_iter = 100
//! crit_conv = "residual"
//! thres_conv = 1e-6
//! anderson_acceleration = true
//!
//! [params_algo]
//! stepsize = 0.5
//! lambda = 0.1
//!
//! [prior]
//! sigma_denoiser = 0.05
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{OptimError, Result};
use crate::optim::convergence::ConvergenceCriterion;
use crate::optim::schedule::{Backtracking, ParamValue, ParameterSchedule, LAMBDA, STEPSIZE};
use crate::optim::state::TrackedVariable;

/// Optimizer configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimConfig {
    /// Hard iteration budget
    pub max_iter: usize,
    /// Stop as soon as the criterion falls below the threshold (after iteration 1)
    pub early_stop: bool,
    /// Stopping criterion: "residual" or "cost"
    pub crit_conv: ConvergenceCriterion,
    /// Threshold on the relative criterion
    pub thres_conv: f64,

    /// Use Anderson extrapolation instead of plain fixed-point iteration
    pub anderson_acceleration: bool,
    /// Mixing weight β (constant or one value per iteration); β = 1 is pure Anderson
    pub anderson_beta: ParamValue,
    /// Number of past iterates kept for extrapolation
    pub anderson_history_size: usize,
    /// Ridge added to the residual Gram matrix
    pub anderson_ridge: f64,

    /// Shrink the step size when the sufficient-decrease test fails (needs a cost function)
    pub backtracking: bool,
    /// Sufficient-decrease constant
    pub gamma_backtracking: f64,
    /// Shrink factor in (0, 1)
    pub eta_backtracking: f64,

    /// Collect per-iteration metrics
    pub return_metrics: bool,
    /// Track and return the dual component instead of the primal one
    pub return_dual: bool,
    /// Log every convergence check at info level
    pub verbose: bool,

    /// Algorithm parameters (stepsize, lambda, ...)
    pub params_algo: BTreeMap<String, ParamValue>,
    /// Prior parameters (sigma_denoiser, ...)
    pub prior: BTreeMap<String, ParamValue>,
}

impl Default for OptimConfig {
    fn default() -> Self {
        let mut params_algo = BTreeMap::new();
        params_algo.insert(LAMBDA.to_string(), ParamValue::Constant(1.0));
        params_algo.insert(STEPSIZE.to_string(), ParamValue::Constant(1.0));

        Self {
            max_iter: 50,
            early_stop: true,
            crit_conv: ConvergenceCriterion::Residual,
            thres_conv: 1e-5,
            anderson_acceleration: false,
            anderson_beta: ParamValue::Constant(1.0),
            anderson_history_size: 5,
            anderson_ridge: 1e-4,
            backtracking: false,
            gamma_backtracking: 0.1,
            eta_backtracking: 0.9,
            return_metrics: true,
            return_dual: false,
            verbose: false,
            params_algo,
            prior: BTreeMap::new(),
        }
    }
}

impl OptimConfig {
    /// Anderson-accelerated config (recommended for slowly contracting maps)
    pub fn with_anderson() -> Self {
        Self {
            anderson_acceleration: true,
            anderson_history_size: 5,
            anderson_ridge: 1e-4,
            ..Self::default()
        }
    }

    /// Backtracking config (requires a cost function)
    pub fn with_backtracking() -> Self {
        Self {
            backtracking: true,
            gamma_backtracking: 0.1,
            eta_backtracking: 0.9,
            ..Self::default()
        }
    }

    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: OptimConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Set a constant or scheduled algorithm parameter
    pub fn set_param(&mut self, name: &str, value: impl Into<ParamValue>) -> &mut Self {
        self.params_algo.insert(name.to_string(), value.into());
        self
    }

    /// Set a constant or scheduled prior parameter
    pub fn set_prior_param(&mut self, name: &str, value: impl Into<ParamValue>) -> &mut Self {
        self.prior.insert(name.to_string(), value.into());
        self
    }

    pub fn tracked_variable(&self) -> TrackedVariable {
        TrackedVariable::from_return_dual(self.return_dual)
    }

    pub fn backtracking_rule(&self) -> Option<Backtracking> {
        self.backtracking.then_some(Backtracking {
            gamma: self.gamma_backtracking,
            eta: self.eta_backtracking,
        })
    }

    pub fn algo_schedule(&self) -> Result<ParameterSchedule> {
        ParameterSchedule::new(self.params_algo.clone(), self.max_iter)
    }

    pub fn prior_schedule(&self) -> Result<ParameterSchedule> {
        ParameterSchedule::new(self.prior.clone(), self.max_iter)
    }

    /// Check every numeric setting and schedule length
    pub fn validate(&self) -> Result<()> {
        if self.max_iter == 0 {
            return Err(OptimError::InvalidConfig("max_iter must be at least 1".into()));
        }
        if !(self.thres_conv.is_finite() && self.thres_conv > 0.0) {
            return Err(OptimError::InvalidConfig(format!(
                "thres_conv must be positive, got {}",
                self.thres_conv
            )));
        }
        if self.anderson_history_size == 0 {
            return Err(OptimError::InvalidConfig("anderson_history_size must be at least 1".into()));
        }
        if !(self.anderson_ridge.is_finite() && self.anderson_ridge >= 0.0) {
            return Err(OptimError::InvalidConfig(format!(
                "anderson_ridge must be non-negative, got {}",
                self.anderson_ridge
            )));
        }
        self.anderson_beta.validate("anderson_beta", self.max_iter)?;

        if self.backtracking {
            if !(self.gamma_backtracking > 0.0) {
                return Err(OptimError::InvalidConfig(format!(
                    "gamma_backtracking must be positive, got {}",
                    self.gamma_backtracking
                )));
            }
            if !(self.eta_backtracking > 0.0 && self.eta_backtracking < 1.0) {
                return Err(OptimError::InvalidConfig(format!(
                    "eta_backtracking must lie in (0, 1), got {}",
                    self.eta_backtracking
                )));
            }
            if !self.params_algo.contains_key(STEPSIZE) {
                return Err(OptimError::MissingParameter(STEPSIZE.to_string()));
            }
        }

        self.algo_schedule()?;
        self.prior_schedule()?;
        Ok(())
    }
}

impl fmt::Display for OptimConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "═══════════════════════════════════════════════════════════════")?;
        writeln!(f, "  Optimizer Configuration")?;
        writeln!(f, "═══════════════════════════════════════════════════════════════")?;
        writeln!(f, "Iterations:")?;
        writeln!(f, "  max_iter: {}, early_stop: {}", self.max_iter, self.early_stop)?;
        writeln!(f, "  criterion: {} < {:.1e}", self.crit_conv, self.thres_conv)?;
        if self.anderson_acceleration {
            writeln!(f, "Anderson:")?;
            writeln!(
                f,
                "  history: {}, ridge: {:.1e}, beta: {:?}",
                self.anderson_history_size, self.anderson_ridge, self.anderson_beta
            )?;
        }
        if self.backtracking {
            writeln!(f, "Backtracking:")?;
            writeln!(f, "  gamma: {}, eta: {}", self.gamma_backtracking, self.eta_backtracking)?;
        }
        writeln!(f, "Parameters:")?;
        for (name, value) in self.params_algo.iter().chain(self.prior.iter()) {
            match value {
                ParamValue::Constant(v) => writeln!(f, "  {}: {}", name, v)?,
                ParamValue::Scheduled(seq) => writeln!(f, "  {}: [{} values]", name, seq.len())?,
            }
        }
        write!(f, "═══════════════════════════════════════════════════════════════")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = OptimConfig::default();
        assert_eq!(cfg.max_iter, 50);
        assert_eq!(cfg.crit_conv, ConvergenceCriterion::Residual);
        assert_eq!(cfg.thres_conv, 1e-5);
        assert_eq!(cfg.anderson_history_size, 5);
        assert_eq!(cfg.anderson_ridge, 1e-4);
        assert!(cfg.validate().is_ok());

        assert!(OptimConfig::with_anderson().anderson_acceleration);
        assert!(OptimConfig::with_backtracking().backtracking_rule().is_some());
    }

    #[test]
    fn test_parse_toml() {
        let cfg = OptimConfig::from_toml_str(
            r#"
            max_iter = 3
            crit_conv = "cost"
            anderson_beta = [1.0, 0.9, 0.8]

            [params_algo]
            stepsize = 0.5
            lambda = [0.3, 0.2, 0.1]

            [prior]
            sigma_denoiser = 0.05
            "#,
        )
        .unwrap();
        assert_eq!(cfg.max_iter, 3);
        assert_eq!(cfg.crit_conv, ConvergenceCriterion::Cost);
        assert_eq!(cfg.params_algo["stepsize"], ParamValue::Constant(0.5));
        assert_eq!(cfg.params_algo["lambda"], ParamValue::Scheduled(vec![0.3, 0.2, 0.1]));
        assert_eq!(cfg.prior["sigma_denoiser"], ParamValue::Constant(0.05));
        // Defaults fill the rest
        assert!(cfg.early_stop);
    }

    #[test]
    fn test_unknown_criterion_rejected() {
        let err = OptimConfig::from_toml_str(r#"crit_conv = "gradient""#).unwrap_err();
        assert!(matches!(err, OptimError::ConfigParse(_)));
        assert!(err.to_string().contains("gradient"));
    }

    #[test]
    fn test_bad_schedule_length_rejected() {
        let err = OptimConfig::from_toml_str(
            r#"
            max_iter = 4
            [params_algo]
            stepsize = [1.0, 0.5]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, OptimError::ScheduleLength { ref name, len: 2, max_iter: 4 } if name == "stepsize"));
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        let mut cfg = OptimConfig::default();
        cfg.max_iter = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = OptimConfig::with_backtracking();
        cfg.eta_backtracking = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = OptimConfig::default();
        cfg.anderson_history_size = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_summary_lists_parameters() {
        let mut cfg = OptimConfig::with_anderson();
        cfg.set_prior_param("sigma_denoiser", 0.1);
        let summary = cfg.to_string();
        assert!(summary.contains("Anderson"));
        assert!(summary.contains("sigma_denoiser: 0.1"));
    }
}

//! Per-iteration diagnostic series

use std::collections::BTreeMap;
use std::fmt;

use crate::error::Result;
use crate::optim::state::{IterateState, TrackedVariable};
use crate::utils::{psnr, relative_change, Tensor};

pub const RESIDUAL: &str = "residual";
pub const COST: &str = "cost";
pub const PSNR: &str = "psnr";

/// User-supplied reducer: (own history, previous state, current state) -> value
pub type CustomMetricFn =
    Box<dyn Fn(&[f64], &IterateState, &IterateState) -> Result<f64> + Send + Sync>;

/// Named, append-only series with one entry per completed iteration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metrics {
    series: BTreeMap<String, Vec<f64>>,
}

impl Metrics {
    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn last(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|s| s.last().copied())
    }

    fn ensure(&mut self, name: &str) {
        self.series.entry(name.to_string()).or_default();
    }

    fn push(&mut self, name: &str, value: f64) {
        self.series.entry(name.to_string()).or_default().push(value);
    }

    pub fn into_inner(self) -> BTreeMap<String, Vec<f64>> {
        self.series
    }
}

/// Builds and updates [`Metrics`] for a run
pub struct MetricsTracker {
    enabled: bool,
    tracked: TrackedVariable,
    has_cost: bool,
    custom: Vec<(String, CustomMetricFn)>,
}

impl MetricsTracker {
    pub fn new(enabled: bool, tracked: TrackedVariable, has_cost: bool) -> Self {
        Self {
            enabled,
            tracked,
            has_cost,
            custom: Vec::new(),
        }
    }

    pub fn with_custom(mut self, name: impl Into<String>, f: CustomMetricFn) -> Self {
        self.custom.push((name.into(), f));
        self
    }

    pub fn add_custom(&mut self, name: impl Into<String>, f: CustomMetricFn) {
        self.custom.push((name.into(), f));
    }

    /// Whether a cost function is configured (controls the `cost` series)
    pub fn set_has_cost(&mut self, has_cost: bool) {
        self.has_cost = has_cost;
    }

    pub fn custom_names(&self) -> impl Iterator<Item = &str> {
        self.custom.iter().map(|(n, _)| n.as_str())
    }

    /// Empty series, or `None` when metrics collection is disabled
    pub fn init(&self) -> Option<Metrics> {
        if !self.enabled {
            return None;
        }
        let mut metrics = Metrics::default();
        metrics.ensure(COST);
        metrics.ensure(RESIDUAL);
        metrics.ensure(PSNR);
        for (name, _) in &self.custom {
            metrics.ensure(name);
        }
        Some(metrics)
    }

    /// Append this iteration's values
    pub fn update(
        &self,
        metrics: &mut Option<Metrics>,
        prev: &IterateState,
        state: &IterateState,
        ground_truth: Option<&Tensor>,
    ) -> Result<()> {
        let Some(metrics) = metrics.as_mut() else {
            return Ok(());
        };

        let x_prev = prev.tracked(self.tracked)?;
        let x = state.tracked(self.tracked)?;
        metrics.push(RESIDUAL, relative_change(x_prev, x));

        if let Some(gt) = ground_truth {
            metrics.push(PSNR, psnr(x, gt));
        }

        if self.has_cost {
            if let Some(cost) = state.cost {
                metrics.push(COST, cost);
            }
        }

        for (name, f) in &self.custom {
            let history = metrics.get(name).unwrap_or(&[]);
            let value = f(history, prev, state)?;
            metrics.push(name, value);
        }
        Ok(())
    }
}

impl fmt::Debug for MetricsTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsTracker")
            .field("enabled", &self.enabled)
            .field("tracked", &self.tracked)
            .field("has_cost", &self.has_cost)
            .field("custom", &self.custom.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .finish()
    }
}

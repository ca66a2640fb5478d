//! Anderson-accelerated fixed-point iteration
//!
//! Two plain warm-up steps fill the history, after which every iteration
//! extrapolates from the stored window, applies Φ once to the extrapolated
//! point and stores the new pair:
//!
//! ```text
//! k = 0, 1:   x^{k+1} = Φ(x^k),                       store (x^k, Φ(x^k))
//! k ≥ 2:      z^k     = Σ αᵢ (β Φ(xᵢ) + (1 − β) xᵢ)
//!             x^{k+1} = Φ(z^k),                       store (z^k, Φ(z^k))
//! ```
//!
//! Only the primal component is extrapolated; the dual component and other
//! secondary parts are taken from the latest mapped state. Metrics and
//! convergence checks compare z^k with Φ(z^k).

use tracing::info;

use crate::error::{OptimError, Result};
use crate::linalg::AndersonMixer;
use crate::optim::fixed_point::{Problem, RunContext, RunStats, Termination};
use crate::optim::schedule::ParamValue;
use crate::optim::state::IterateState;

/// Number of plain steps before extrapolation starts
const WARM_UP: usize = 2;

/// Anderson-accelerated engine
#[derive(Debug, Clone, PartialEq)]
pub struct AndersonEngine {
    pub max_iter: usize,
    pub early_stop: bool,
    /// Number of stored (x, Φ(x)) pairs
    pub history_size: usize,
    /// Ridge of the weight problem
    pub ridge: f64,
    /// Mixing weight, constant or per iteration
    pub beta: ParamValue,
}

impl AndersonEngine {
    pub fn new(max_iter: usize, early_stop: bool, history_size: usize, ridge: f64, beta: ParamValue) -> Self {
        Self {
            max_iter,
            early_stop,
            history_size,
            ridge,
            beta,
        }
    }

    pub fn run(
        &self,
        ctx: &mut RunContext<'_>,
        problem: &Problem<'_>,
        init: IterateState,
    ) -> Result<(IterateState, RunStats)> {
        if self.history_size == 0 {
            return Err(OptimError::InvalidConfig("anderson_history_size must be at least 1".into()));
        }
        let mut mixer = AndersonMixer::new(self.history_size, self.ridge);
        // `state` is always the latest mapped iterate, `last_input` what was mapped
        let mut state = init;
        let mut last_input: Option<IterateState> = None;
        let mut iterations = 0;

        for it in 0..self.max_iter.min(WARM_UP) {
            let (prior, algo) = ctx.resolve(it, last_input.as_ref().map(|p| (p, &state)))?;
            let next = ctx.apply_step(&state, &prior, &algo, problem)?;
            mixer.store(it, state.primal.clone(), next.primal.clone());
            ctx.record(it, &state, &next, problem)?;

            last_input = Some(std::mem::replace(&mut state, next));
            iterations = it + 1;
        }

        for it in WARM_UP..self.max_iter {
            let (prior, algo) = ctx.resolve(it, last_input.as_ref().map(|p| (p, &state)))?;
            let beta = self.beta.at(it).ok_or_else(|| OptimError::ScheduleLength {
                name: "anderson_beta".to_string(),
                len: self.beta.len(),
                max_iter: self.max_iter,
            })?;

            let mut iterate = state.with_primal(mixer.extrapolate(it, beta)?);
            ctx.evaluate_cost(&mut iterate, &algo, problem)?;

            let mapped = ctx.apply_step(&iterate, &prior, &algo, problem)?;
            mixer.store(it, iterate.primal.clone(), mapped.primal.clone());
            let crossed = ctx.record(it, &iterate, &mapped, problem)?;

            last_input = Some(iterate);
            state = mapped;
            iterations = it + 1;

            if self.early_stop && crossed {
                info!(iteration = it, window = mixer.history_size(), "anderson iteration converged");
                return Ok((state, ctx.stats(iterations, Termination::Converged)));
            }
        }

        Ok((state, ctx.stats(iterations, Termination::MaxIterReached)))
    }
}

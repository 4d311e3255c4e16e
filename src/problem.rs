use std::cell::Cell;

use crate::api::value_and_grad;
use crate::bounds::BoundSet;
use crate::dispatch::{external_objective_with, GradientMode};
use crate::error::{Error, Result};
use crate::finite_diff::FiniteDiffConfig;
use crate::host::ObjectiveContext;
use crate::node::check_in_bounds;

/// An external objective packaged with its bounds, for callers that want
/// `(f(v), ∇f(v))` at constrained points without managing a tape.
///
/// Each [`value_and_grad`](Self::value_and_grad) call is one complete
/// forward/backward cycle on a fresh tape.
#[derive(Debug, Clone)]
pub struct BoundedProblem {
    ctx: ObjectiveContext,
    bounds: BoundSet,
    mode: GradientMode,
    config: FiniteDiffConfig,
    func_evals: Cell<usize>,
}

impl BoundedProblem {
    /// Create a problem from a context and its per-dimension bounds.
    pub fn new(ctx: ObjectiveContext, bounds: BoundSet, mode: GradientMode) -> Self {
        BoundedProblem {
            ctx,
            bounds,
            mode,
            config: FiniteDiffConfig::default(),
            func_evals: Cell::new(0),
        }
    }

    /// Replace the finite-difference configuration.
    pub fn with_config(mut self, config: FiniteDiffConfig) -> Self {
        self.config = config;
        self
    }

    /// Number of input variables.
    pub fn dim(&self) -> usize {
        self.bounds.len()
    }

    pub fn bounds(&self) -> &BoundSet {
        &self.bounds
    }

    pub fn context(&self) -> &ObjectiveContext {
        &self.ctx
    }

    /// Number of `value` / `value_and_grad` calls so far.
    pub fn func_evals(&self) -> usize {
        self.func_evals.get()
    }

    fn check_domain(&self, v: &[f64]) -> Result<()> {
        Error::check_len("parameter vector", self.dim(), v.len())?;
        check_in_bounds(v, &self.bounds)
    }

    /// Objective value at the constrained point `v`.
    pub fn value(&self, v: &[f64]) -> Result<f64> {
        self.check_domain(v)?;
        self.func_evals.set(self.func_evals.get() + 1);
        external_objective_with(&self.ctx, v, self.mode, &self.bounds, &self.config)
    }

    /// Objective value and gradient with respect to the constrained point `v`.
    pub fn value_and_grad(&self, v: &[f64]) -> Result<(f64, Vec<f64>)> {
        self.check_domain(v)?;
        self.func_evals.set(self.func_evals.get() + 1);
        value_and_grad(
            |x| external_objective_with(&self.ctx, x, self.mode, &self.bounds, &self.config),
            v,
        )
    }
}

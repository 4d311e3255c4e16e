//! Entry point for evaluating an external objective from AD-generic code.
//!
//! The input's scalar type picks the path at compile time:
//!
//! - `f64`: one host value call. No transform, no tape, no node.
//! - `Reverse<f64>`: a callback node on the active tape, built by
//!   [`finite_diff_node`] or [`analytic_node`] depending on [`GradientMode`].

use log::debug;

use crate::bounds::BoundSet;
use crate::error::{Error, Result};
use crate::finite_diff::FiniteDiffConfig;
use crate::host::ObjectiveContext;
use crate::node::{analytic_node, finite_diff_node};
use crate::reverse::Reverse;
use crate::scalar::Scalar;

/// How the differentiable path obtains the gradient.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GradientMode {
    /// Estimate by finite differences in the unconstrained domain.
    #[default]
    FiniteDiff,
    /// Ask the host gradient function during the reverse sweep.
    Analytic,
}

impl From<bool> for GradientMode {
    /// `true` selects finite differences.
    fn from(finite_diff: bool) -> Self {
        if finite_diff {
            GradientMode::FiniteDiff
        } else {
            GradientMode::Analytic
        }
    }
}

/// Scalars an external objective can be evaluated on.
pub trait ExternalScalar: Scalar<Float = f64> {
    /// Evaluate the objective at `v`. Lengths are already validated.
    fn evaluate_external(
        ctx: &ObjectiveContext,
        v: &[Self],
        mode: GradientMode,
        bounds: &BoundSet,
        config: &FiniteDiffConfig,
    ) -> Result<Self>;
}

impl ExternalScalar for f64 {
    fn evaluate_external(
        ctx: &ObjectiveContext,
        v: &[f64],
        _mode: GradientMode,
        _bounds: &BoundSet,
        _config: &FiniteDiffConfig,
    ) -> Result<f64> {
        debug!("external objective: primal path, n={}", v.len());
        ctx.evaluate(v)
    }
}

impl ExternalScalar for Reverse<f64> {
    fn evaluate_external(
        ctx: &ObjectiveContext,
        v: &[Reverse<f64>],
        mode: GradientMode,
        bounds: &BoundSet,
        config: &FiniteDiffConfig,
    ) -> Result<Reverse<f64>> {
        debug!("external objective: tracked path, mode={mode:?}, n={}", v.len());
        match mode {
            GradientMode::FiniteDiff => finite_diff_node(ctx, v, bounds, config),
            GradientMode::Analytic => analytic_node(ctx, v),
        }
    }
}

/// Evaluate the external objective at `v` with per-dimension bounds.
///
/// Returns a plain `f64` for plain input and a tape-tracked `Reverse<f64>`
/// for tracked input. `v`, `lower` and `upper` must have equal length.
/// Host failures are returned unmodified.
///
/// ```
/// use boundgrad::{external_objective, gradient_fn, value_fn, GradientMode, ObjectiveContext};
///
/// let ctx = ObjectiveContext::new()
///     .with_value_fn(value_fn(|x| Ok(x.iter().map(|v| v * v).sum())))
///     .with_gradient_fn(gradient_fn(|x| Ok(x.iter().map(|v| 2.0 * v).collect())));
///
/// let y: f64 = external_objective(&ctx, &[3.0], true, &[0.0], &[10.0]).unwrap();
/// assert_eq!(y, 9.0);
///
/// let (_, g) = boundgrad::value_and_grad(
///     |v| external_objective(&ctx, v, GradientMode::FiniteDiff, &[0.0], &[10.0]),
///     &[3.0],
/// )
/// .unwrap();
/// assert!((g[0] - 6.0).abs() < 1e-6);
/// ```
pub fn external_objective<T: ExternalScalar>(
    ctx: &ObjectiveContext,
    v: &[T],
    mode: impl Into<GradientMode>,
    lower: &[f64],
    upper: &[f64],
) -> Result<T> {
    Error::check_len("lower bounds", v.len(), lower.len())?;
    let bounds = BoundSet::new(lower, upper)?;
    external_objective_with(ctx, v, mode.into(), &bounds, &FiniteDiffConfig::default())
}

/// [`external_objective`] with a prebuilt [`BoundSet`] and explicit
/// finite-difference configuration.
pub fn external_objective_with<T: ExternalScalar>(
    ctx: &ObjectiveContext,
    v: &[T],
    mode: GradientMode,
    bounds: &BoundSet,
    config: &FiniteDiffConfig,
) -> Result<T> {
    Error::check_len("bounds", v.len(), bounds.len())?;
    T::evaluate_external(ctx, v, mode, bounds, config)
}

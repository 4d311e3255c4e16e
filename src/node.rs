//! Reverse-mode nodes for external objectives.
//!
//! [`callback_var`] is the generic building block: it records a node whose
//! value is known now and whose adjoint contribution is computed later, during
//! the reverse sweep, by a closure that owns everything it needs.
//!
//! The two external-objective nodes differ in when the gradient is obtained:
//!
//! - [`finite_diff_node`] estimates it during the forward pass, in the
//!   unconstrained domain, and stores it already mapped back to the
//!   constrained input.
//! - [`analytic_node`] stores only the input and asks the host for the
//!   gradient when the sweep reaches the node. If the node's adjoint is zero
//!   the host gradient is never requested.

use log::{debug, warn};

use crate::bounds::BoundSet;
use crate::error::{Error, Result};
use crate::finite_diff::{self, FiniteDiffConfig};
use crate::host::ObjectiveContext;
use crate::reverse::Reverse;
use crate::tape::{self, TapeThreadLocal};
use crate::Float;

/// Gradient with respect to the constrained input, computed in the forward pass.
#[derive(Debug)]
struct GradientSnapshot {
    grad: Vec<f64>,
}

/// Constrained input values at the time of the forward pass.
#[derive(Debug)]
struct InputSnapshot {
    point: Vec<f64>,
}

/// Record a node with value `value` over `operands` on the active tape.
///
/// `backward` receives the node's adjoint and one zeroed slot per operand, and
/// must add each operand's contribution into its slot. If every operand is a
/// constant nothing is recorded and a constant is returned.
pub fn callback_var<F, B>(value: F, operands: &[Reverse<F>], backward: B) -> Reverse<F>
where
    F: Float + TapeThreadLocal,
    B: Fn(F, &mut [F]) -> Result<()> + 'static,
{
    if operands.iter().all(Reverse::is_constant) {
        return Reverse::constant(value);
    }
    let indices = operands.iter().map(Reverse::index).collect();
    let index = tape::with_active_tape(|t| t.push_callback(indices, Box::new(backward)));
    Reverse::from_tape(value, index)
}

#[inline]
fn accumulate(adj: f64, grad: &[f64], out: &mut [f64]) {
    for (o, &g) in out.iter_mut().zip(grad) {
        *o += adj * g;
    }
}

fn warn_non_finite(source: &str, grad: &[f64]) {
    if let Some(i) = grad.iter().position(|g| !g.is_finite()) {
        warn!(
            "{source} gradient has a non-finite entry at index {i} ({}); propagating as-is",
            grad[i]
        );
    }
}

/// Fails with [`Error::OutOfBounds`] for the first component outside its domain.
pub(crate) fn check_in_bounds(values: &[f64], bounds: &BoundSet) -> Result<()> {
    match bounds.position_outside(values) {
        None => Ok(()),
        Some(index) => {
            let b = bounds.as_slice()[index];
            Err(Error::OutOfBounds {
                index,
                value: values[index],
                lower: b.lower(),
                upper: b.upper(),
            })
        }
    }
}

/// External-objective node whose gradient is estimated by finite differences.
///
/// The input is mapped to the unconstrained domain, `x ↦ f(constrain(x))` is
/// differentiated there, and the result is multiplied elementwise by
/// [`BoundSet::free_derivative`] so the stored gradient is with respect to
/// `v` as supplied. Every component of `v` must lie in its closed domain;
/// otherwise nothing is sent to the host.
pub fn finite_diff_node(
    ctx: &ObjectiveContext,
    v: &[Reverse<f64>],
    bounds: &BoundSet,
    config: &FiniteDiffConfig,
) -> Result<Reverse<f64>> {
    let values: Vec<f64> = v.iter().map(Reverse::value).collect();
    check_in_bounds(&values, bounds)?;
    let unconstrained = bounds.free(&values)?;
    let (value, grad_free) =
        finite_diff::composite_gradient(|y| ctx.evaluate(y), &unconstrained, bounds, config)?;
    let jacobian = bounds.free_derivative(&unconstrained)?;
    let grad: Vec<f64> = grad_free
        .iter()
        .zip(&jacobian)
        .map(|(g, d)| g * d)
        .collect();
    warn_non_finite("finite-difference", &grad);

    let snapshot = GradientSnapshot { grad };
    let out = callback_var(value, v, move |adj, buf| {
        accumulate(adj, &snapshot.grad, buf);
        Ok(())
    });
    if !out.is_constant() {
        ctx.record_node();
    }
    debug!("finite-difference node: n={}, value={value}", v.len());
    Ok(out)
}

/// External-objective node whose gradient comes from the host gradient
/// function, requested lazily during the reverse sweep.
///
/// No bound transform is applied: the host gradient is taken to be with
/// respect to `v` as supplied. Both callables must be set; this is checked
/// here rather than at sweep time.
pub fn analytic_node(ctx: &ObjectiveContext, v: &[Reverse<f64>]) -> Result<Reverse<f64>> {
    let point: Vec<f64> = v.iter().map(Reverse::value).collect();
    let value = ctx.evaluate(&point)?;
    let handle = ctx.gradient_handle()?;

    let snapshot = InputSnapshot { point };
    let out = callback_var(value, v, move |adj, buf| {
        let grad = handle.call(&snapshot.point)?;
        warn_non_finite("host", &grad);
        accumulate(adj, &grad, buf);
        Ok(())
    });
    if !out.is_constant() {
        ctx.record_node();
    }
    debug!("analytic node: n={}, value={value}", v.len());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tape::{Tape, TapeGuard};

    #[test]
    fn callback_var_over_constants_records_nothing() {
        let mut tape = Tape::<f64>::new();
        let _guard = TapeGuard::new(&mut tape);
        let c = [Reverse::constant(1.0), Reverse::constant(2.0)];
        let out = callback_var(3.0, &c, |_, _| Ok(()));
        assert!(out.is_constant());
        assert_eq!(out.value(), 3.0);
    }

    #[test]
    fn callback_var_registers_on_active_tape() {
        let mut tape = Tape::<f64>::new();
        let (i, v) = tape.new_variable(2.0);
        let x = Reverse::from_tape(v, i);
        let out = {
            let _guard = TapeGuard::new(&mut tape);
            callback_var(v * v, &[x], move |adj, buf| {
                buf[0] += adj * 2.0 * v;
                Ok(())
            })
        };
        assert_eq!(tape.num_callbacks(), 1);
        let adj = tape.reverse(out.index()).unwrap();
        assert_eq!(adj[i as usize], 4.0);
    }
}

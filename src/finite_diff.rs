//! Finite-difference gradients of value-only functions.
//!
//! Two schemes are available:
//!
//! - [`FdScheme::Auto`]: sixth-order central stencil with a per-dimension step
//!   `h = cbrt(eps) * max(scale_floor, |x_i|)`. Costs `1 + 6n` evaluations.
//! - [`FdScheme::Central`]: the plain second-order central difference of the
//!   `finitediff` crate. Costs `1 + 2n` evaluations.
//!
//! The function being differentiated is fallible. The first failing probe
//! aborts the estimate and its error is returned as-is.

use std::cell::RefCell;

use finitediff::FiniteDiff;
use log::{debug, trace};

use crate::bounds::BoundSet;
use crate::error::{Error, Result};
use crate::Float;

/// `(offset in steps, weight)` pairs of the sixth-order stencil; the sum is
/// divided by `60 h`.
const STENCIL: [(f64, f64); 6] = [
    (3.0, 1.0),
    (2.0, -9.0),
    (1.0, 45.0),
    (-3.0, -1.0),
    (-2.0, 9.0),
    (-1.0, -45.0),
];

/// Finite-difference scheme.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FdScheme {
    /// Sixth-order central stencil with adaptive step size.
    #[default]
    Auto,
    /// Second-order central difference from the `finitediff` crate.
    Central,
}

/// Configuration for finite-difference gradient estimation.
#[derive(Debug, Clone)]
pub struct FiniteDiffConfig {
    /// Stencil to use (default: [`FdScheme::Auto`]).
    pub scheme: FdScheme,
    /// Lower limit on the magnitude the [`FdScheme::Auto`] step is scaled by
    /// (default: 1.0). Must be positive and finite. Ignored by
    /// [`FdScheme::Central`].
    pub scale_floor: f64,
}

impl Default for FiniteDiffConfig {
    fn default() -> Self {
        FiniteDiffConfig {
            scheme: FdScheme::Auto,
            scale_floor: 1.0,
        }
    }
}

/// Step size of the adaptive stencil at `x`.
#[inline]
pub fn step_size(x: f64, scale_floor: f64) -> f64 {
    f64::cbrt_epsilon() * scale_floor.max(x.abs())
}

/// Value and finite-difference gradient of `f` at `x`.
///
/// Returns `(f(x), ∇f(x))`. `f` is called once at `x` and then only at probe
/// points differing from `x` in a single coordinate.
pub fn gradient<G>(f: G, x: &[f64], config: &FiniteDiffConfig) -> Result<(f64, Vec<f64>)>
where
    G: Fn(&[f64]) -> Result<f64>,
{
    let floor = config.scale_floor;
    if config.scheme == FdScheme::Auto && !(floor > 0.0 && floor.is_finite()) {
        return Err(Error::InvalidConfig {
            reason: "scale_floor must be positive and finite",
        });
    }
    let value = f(x)?;
    let grad = match config.scheme {
        FdScheme::Auto => sixth_order(&f, x, config.scale_floor)?,
        FdScheme::Central => central(&f, x)?,
    };
    debug!(
        "finite-difference gradient: scheme={:?}, n={}, value={}",
        config.scheme,
        x.len(),
        value
    );
    Ok((value, grad))
}

fn sixth_order<G>(f: &G, x: &[f64], scale_floor: f64) -> Result<Vec<f64>>
where
    G: Fn(&[f64]) -> Result<f64>,
{
    let mut probe = x.to_vec();
    let mut grad = Vec::with_capacity(x.len());
    for i in 0..x.len() {
        let h = step_size(x[i], scale_floor);
        let mut delta = 0.0;
        for &(k, w) in &STENCIL {
            probe[i] = x[i] + k * h;
            delta += w * f(probe.as_slice())?;
        }
        probe[i] = x[i];
        let g = delta / (60.0 * h);
        trace!("fd dim {i}: x={}, h={h:e}, grad={g}", x[i]);
        grad.push(g);
    }
    Ok(grad)
}

fn central<G>(f: &G, x: &[f64]) -> Result<Vec<f64>>
where
    G: Fn(&[f64]) -> Result<f64>,
{
    let first_err: RefCell<Option<Error>> = RefCell::new(None);
    let point = x.to_vec();
    let grad = point.central_diff(&|p: &Vec<f64>| {
        if first_err.borrow().is_some() {
            return f64::NAN;
        }
        match f(p.as_slice()) {
            Ok(v) => v,
            Err(e) => {
                *first_err.borrow_mut() = Some(e);
                f64::NAN
            }
        }
    });
    match first_err.into_inner() {
        Some(e) => Err(e),
        None => Ok(grad),
    }
}

/// Value and gradient of `x ↦ f(constrain(x))` at the unconstrained point `x`.
///
/// The gradient is with respect to the unconstrained variable; multiply by
/// [`BoundSet::free_derivative`] to express it in the constrained domain.
pub fn composite_gradient<G>(
    f: G,
    unconstrained: &[f64],
    bounds: &BoundSet,
    config: &FiniteDiffConfig,
) -> Result<(f64, Vec<f64>)>
where
    G: Fn(&[f64]) -> Result<f64>,
{
    Error::check_len("unconstrained vector", bounds.len(), unconstrained.len())?;
    gradient(
        |x| {
            let y = bounds.constrain(x)?;
            f(y.as_slice())
        },
        unconstrained,
        config,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::cell::Cell;

    fn cubic(x: &[f64]) -> Result<f64> {
        Ok(x[0].powi(3) + 2.0 * x[0] * x[1] + x[1].sin())
    }

    #[test]
    fn auto_scheme_is_accurate_on_smooth_function() {
        let x = [1.3, -0.4];
        let (v, g) = gradient(cubic, &x, &FiniteDiffConfig::default()).unwrap();
        assert_relative_eq!(v, cubic(&x).unwrap());
        assert_relative_eq!(g[0], 3.0 * 1.3 * 1.3 + 2.0 * -0.4, max_relative = 1e-8);
        assert_relative_eq!(g[1], 2.0 * 1.3 + (-0.4f64).cos(), max_relative = 1e-8);
    }

    #[test]
    fn central_scheme_agrees_with_auto() {
        let x = [0.5, 2.0];
        let cfg = FiniteDiffConfig {
            scheme: FdScheme::Central,
            ..FiniteDiffConfig::default()
        };
        let (_, central) = gradient(cubic, &x, &cfg).unwrap();
        let (_, auto) = gradient(cubic, &x, &FiniteDiffConfig::default()).unwrap();
        for (c, a) in central.iter().zip(&auto) {
            assert_relative_eq!(c, a, max_relative = 1e-5);
        }
    }

    #[test]
    fn auto_scheme_evaluation_count() {
        let calls = Cell::new(0usize);
        let f = |x: &[f64]| {
            calls.set(calls.get() + 1);
            Ok(x.iter().sum::<f64>())
        };
        gradient(f, &[1.0, 2.0, 3.0], &FiniteDiffConfig::default()).unwrap();
        assert_eq!(calls.get(), 1 + 6 * 3);
    }

    #[test]
    fn step_scales_with_magnitude() {
        let base = f64::EPSILON.cbrt();
        assert_relative_eq!(step_size(0.1, 1.0), base);
        assert_relative_eq!(step_size(-250.0, 1.0), 250.0 * base);
    }

    #[test]
    fn non_positive_scale_floor_is_rejected() {
        let calls = Cell::new(0usize);
        let f = |x: &[f64]| {
            calls.set(calls.get() + 1);
            Ok(x[0] * x[0])
        };
        for floor in [0.0, -1.0, f64::NAN] {
            let cfg = FiniteDiffConfig {
                scale_floor: floor,
                ..FiniteDiffConfig::default()
            };
            assert!(matches!(
                gradient(f, &[0.0], &cfg),
                Err(Error::InvalidConfig { .. })
            ));
        }
        assert_eq!(calls.get(), 0);

        let central = FiniteDiffConfig {
            scheme: FdScheme::Central,
            scale_floor: 0.0,
        };
        let (_, g) = gradient(f, &[0.0], &central).unwrap();
        assert!(g[0].abs() < 1e-6);
    }

    #[test]
    fn first_error_aborts_estimate() {
        let calls = Cell::new(0usize);
        let f = |_: &[f64]| {
            calls.set(calls.get() + 1);
            if calls.get() == 3 {
                Err(Error::FunctionUnset { role: "value" })
            } else {
                Ok(0.0)
            }
        };
        for scheme in [FdScheme::Auto, FdScheme::Central] {
            calls.set(0);
            let cfg = FiniteDiffConfig {
                scheme,
                ..FiniteDiffConfig::default()
            };
            let err = gradient(f, &[1.0, 1.0], &cfg).unwrap_err();
            assert!(matches!(err, Error::FunctionUnset { role: "value" }));
        }
    }

    #[test]
    fn composite_gradient_is_in_unconstrained_domain() {
        // f(y) = y, y = exp(x): d/dx = exp(x).
        let bounds = BoundSet::new(&[0.0], &[f64::INFINITY]).unwrap();
        let x = [0.4];
        let (v, g) =
            composite_gradient(|y| Ok(y[0]), &x, &bounds, &FiniteDiffConfig::default()).unwrap();
        assert_relative_eq!(v, 0.4f64.exp(), max_relative = 1e-12);
        assert_relative_eq!(g[0], 0.4f64.exp(), max_relative = 1e-8);
    }
}

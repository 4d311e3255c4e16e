use crate::error::{Error, Result};
use crate::float::Float;
use crate::reverse::{Adjoints, Reverse};
use crate::tape::{Tape, TapeGuard, TapeThreadLocal};

/// Run one forward/backward cycle of a scalar function `f : R^n → R`.
///
/// A fresh tape is created, `x` is registered as the independent variables,
/// `f` is evaluated with that tape active, and the reverse sweep is seeded at
/// its output. The tape, and with it every snapshot captured by callback
/// nodes, is dropped before returning.
///
/// Errors from `f` and from callback nodes during the sweep are returned
/// unmodified.
///
/// ```
/// let (v, g) = boundgrad::value_and_grad(|x: &[boundgrad::Reverse<f64>]| {
///     Ok(x[0] * x[0] + x[1] * x[1])
/// }, &[3.0, 4.0]).unwrap();
/// assert!((v - 25.0).abs() < 1e-10);
/// assert!((g[0] - 6.0).abs() < 1e-10);
/// assert!((g[1] - 8.0).abs() < 1e-10);
/// ```
pub fn value_and_grad<F: Float + TapeThreadLocal>(
    f: impl FnOnce(&[Reverse<F>]) -> Result<Reverse<F>>,
    x: &[F],
) -> Result<(F, Vec<F>)> {
    let n = x.len();
    let mut tape = Tape::with_capacity(n * 10);

    // Create input variables.
    let inputs: Vec<Reverse<F>> = x
        .iter()
        .map(|&val| {
            let (idx, v) = tape.new_variable(val);
            Reverse::from_tape(v, idx)
        })
        .collect();

    let output = {
        let _guard = TapeGuard::new(&mut tape);
        f(&inputs)?
    };

    let adjoints = Adjoints::new(tape.reverse(output.index())?);
    Ok((output.value(), adjoints.gather(&inputs)))
}

/// Gradient of a scalar function `f : R^n → R` using reverse mode.
///
/// Same as [`value_and_grad`] without the value.
pub fn grad<F: Float + TapeThreadLocal>(
    f: impl FnOnce(&[Reverse<F>]) -> Result<Reverse<F>>,
    x: &[F],
) -> Result<Vec<F>> {
    value_and_grad(f, x).map(|(_, g)| g)
}

/// Vector-Jacobian product (reverse mode): `(f(x), wᵀ·J)`.
///
/// Evaluates `f` at `x` and computes the adjoint product with weights `w`.
/// Fails with [`Error::DimensionMismatch`] if `f` returns a different number
/// of outputs than `w.len()`.
pub fn vjp<F: Float + TapeThreadLocal>(
    f: impl FnOnce(&[Reverse<F>]) -> Result<Vec<Reverse<F>>>,
    x: &[F],
    w: &[F],
) -> Result<(Vec<F>, Vec<F>)> {
    let n = x.len();
    let mut tape = Tape::with_capacity(n * 10);

    let inputs: Vec<Reverse<F>> = x
        .iter()
        .map(|&val| {
            let (idx, v) = tape.new_variable(val);
            Reverse::from_tape(v, idx)
        })
        .collect();

    let outputs = {
        let _guard = TapeGuard::new(&mut tape);
        f(&inputs)?
    };

    Error::check_len("vjp weights", outputs.len(), w.len())?;

    let values: Vec<F> = outputs.iter().map(Reverse::value).collect();

    // Seed adjoints with weights.
    let seeds: Vec<(u32, F)> = outputs
        .iter()
        .zip(w.iter())
        .filter(|(r, _)| !r.is_constant())
        .map(|(r, &wi)| (r.index(), wi))
        .collect();
    let adjoints = Adjoints::new(tape.reverse_seeded(&seeds)?);

    Ok((values, adjoints.gather(&inputs)))
}

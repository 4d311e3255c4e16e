use approx::assert_relative_eq;
use boundgrad::tape::{Tape, TapeGuard};
use boundgrad::{grad, value_and_grad, vjp, Reverse, Scalar};

/// Run a single-variable reverse-mode differentiation.
fn reverse_grad(f: impl FnOnce(Reverse<f64>) -> Reverse<f64>, x_val: f64) -> f64 {
    let mut tape = Tape::new();
    let (idx, val) = tape.new_variable(x_val);
    let x = Reverse::from_tape(val, idx);
    let y = {
        let _guard = TapeGuard::new(&mut tape);
        f(x)
    };
    let adjoints = tape.reverse(y.index()).unwrap();
    adjoints[0]
}

/// Central finite difference for comparison.
fn finite_diff(f: impl Fn(f64) -> f64, x: f64) -> f64 {
    let h = 1e-7;
    (f(x + h) - f(x - h)) / (2.0 * h)
}

fn check_reverse_elemental(
    f_rev: impl FnOnce(Reverse<f64>) -> Reverse<f64>,
    f_f64: impl Fn(f64) -> f64,
    x: f64,
    tol: f64,
) {
    let grad = reverse_grad(f_rev, x);
    let expected = finite_diff(&f_f64, x);
    assert_relative_eq!(grad, expected, max_relative = tol);
}

fn sum_of_squares<T: Scalar>(x: &[T]) -> T {
    let mut sum = x[0] * x[0];
    for xi in &x[1..] {
        sum = sum + *xi * *xi;
    }
    sum
}

// ── Arithmetic ──

#[test]
fn x_squared() {
    let grad = reverse_grad(|x| x * x, 3.0);
    assert_relative_eq!(grad, 6.0, max_relative = 1e-12);
}

#[test]
fn x_times_y() {
    let mut tape = Tape::new();
    let (xi, xv) = tape.new_variable(3.0);
    let (yi, yv) = tape.new_variable(4.0);
    let x = Reverse::from_tape(xv, xi);
    let y = Reverse::from_tape(yv, yi);
    let z = {
        let _guard = TapeGuard::new(&mut tape);
        x * y
    };
    let adjoints = tape.reverse(z.index()).unwrap();
    assert_relative_eq!(adjoints[0], 4.0, max_relative = 1e-12); // dz/dx = y
    assert_relative_eq!(adjoints[1], 3.0, max_relative = 1e-12); // dz/dy = x
}

#[test]
fn diamond_pattern() {
    // z = x² + x³, dz/dx = 2x + 3x²
    let grad = reverse_grad(|x| x * x + x * x * x, 2.0);
    assert_relative_eq!(grad, 4.0 + 12.0, max_relative = 1e-12);
}

#[test]
fn quotient_and_negation() {
    // f(x) = -(1 / x) + x / 2, f'(x) = 1/x² + 1/2
    let grad = reverse_grad(|x| -(1.0 / x) + x / 2.0, 2.0);
    assert_relative_eq!(grad, 0.25 + 0.5, max_relative = 1e-12);
}

#[test]
fn assign_ops() {
    let grad = reverse_grad(
        |x| {
            let mut y = x;
            y *= x;
            y += x;
            y -= Reverse::constant(1.0);
            y /= x;
            y
        },
        2.0,
    );
    // y = (x² + x - 1) / x = x + 1 - 1/x, y' = 1 + 1/x²
    assert_relative_eq!(grad, 1.25, max_relative = 1e-12);
}

// ── Elementals ──

#[test]
fn sin() { check_reverse_elemental(|x| x.sin(), |x| x.sin(), 1.0, 1e-5); }

#[test]
fn cos() { check_reverse_elemental(|x| x.cos(), |x| x.cos(), 1.0, 1e-5); }

#[test]
fn exp() { check_reverse_elemental(|x| x.exp(), |x| x.exp(), 1.0, 1e-5); }

#[test]
fn ln() { check_reverse_elemental(|x| x.ln(), |x| x.ln(), 2.0, 1e-5); }

#[test]
fn sqrt() { check_reverse_elemental(|x| x.sqrt(), |x| x.sqrt(), 4.0, 1e-5); }

#[test]
fn powi() { check_reverse_elemental(|x| x.powi(3), |x| x.powi(3), 2.0, 1e-5); }

// ── Constants ──

#[test]
fn constant_arithmetic_needs_no_tape() {
    let c: Reverse<f64> = Reverse::constant(2.0) * Reverse::constant(3.0) + 1.0;
    assert!(c.is_constant());
    assert_eq!(c.value(), 7.0);
}

#[test]
fn scalar_multiplication() {
    let grad = reverse_grad(|x| 3.0 * x, 2.0);
    assert_relative_eq!(grad, 3.0, max_relative = 1e-12);
}

// ── API ──

#[test]
fn value_and_grad_of_generic_function() {
    let (v, g) = value_and_grad(|x| Ok(sum_of_squares(x)), &[3.0, 4.0]).unwrap();
    assert_relative_eq!(v, sum_of_squares(&[3.0, 4.0]));
    assert_relative_eq!(g[0], 6.0, max_relative = 1e-12);
    assert_relative_eq!(g[1], 8.0, max_relative = 1e-12);
}

#[test]
fn grad_of_constant_output_is_zero() {
    let g = grad(|_| Ok(Reverse::constant(1.0)), &[3.0, 4.0]).unwrap();
    assert_eq!(g, vec![0.0, 0.0]);
}

#[test]
fn grad_in_f32() {
    let g = grad(|x: &[Reverse<f32>]| Ok(x[0] * x[0] * 2.0f32), &[1.5f32]).unwrap();
    assert_relative_eq!(g[0], 6.0f32, max_relative = 1e-6);
}

#[test]
fn vjp_weights_outputs() {
    // f(x, y) = (x·y, x + y), wᵀJ = w0·(y, x) + w1·(1, 1)
    let (vals, g) = vjp(|x| Ok(vec![x[0] * x[1], x[0] + x[1]]), &[2.0, 5.0], &[1.0, 3.0]).unwrap();
    assert_eq!(vals, vec![10.0, 7.0]);
    assert_relative_eq!(g[0], 5.0 + 3.0, max_relative = 1e-12);
    assert_relative_eq!(g[1], 2.0 + 3.0, max_relative = 1e-12);
}

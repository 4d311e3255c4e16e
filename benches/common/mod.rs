use boundgrad::{gradient_fn, value_fn, ObjectiveContext};

// ─── Rosenbrock ────────────────────────────────────────────────────────────

pub fn rosenbrock_f64(x: &[f64]) -> f64 {
    let mut sum = 0.0;
    for i in 0..x.len() - 1 {
        let t1 = 1.0 - x[i];
        let t2 = x[i + 1] - x[i] * x[i];
        sum += t1 * t1 + 100.0 * t2 * t2;
    }
    sum
}

pub fn rosenbrock_grad_f64(x: &[f64]) -> Vec<f64> {
    let n = x.len();
    let mut g = vec![0.0; n];
    for i in 0..n - 1 {
        let t1 = 1.0 - x[i];
        let t2 = x[i + 1] - x[i] * x[i];
        g[i] += -2.0 * t1 - 400.0 * x[i] * t2;
        g[i + 1] += 200.0 * t2;
    }
    g
}

/// Rosenbrock exposed through the host calling convention.
pub fn rosenbrock_context() -> ObjectiveContext {
    ObjectiveContext::new()
        .with_value_fn(value_fn(|x| Ok(rosenbrock_f64(x))))
        .with_gradient_fn(gradient_fn(|x| Ok(rosenbrock_grad_f64(x))))
}

// ─── Inputs ────────────────────────────────────────────────────────────────

/// Points strictly inside `(0, 2)` in every coordinate.
pub fn make_input(n: usize) -> Vec<f64> {
    (0..n).map(|i| 0.5 + 0.01 * (i as f64)).map(|v| v.min(1.9)).collect()
}

/// Alternating unbounded / lower / upper / interval bounds.
pub fn make_bounds(n: usize) -> (Vec<f64>, Vec<f64>) {
    let inf = f64::INFINITY;
    (0..n)
        .map(|i| match i % 4 {
            0 => (-inf, inf),
            1 => (0.0, inf),
            2 => (-inf, 2.0),
            _ => (0.0, 2.0),
        })
        .unzip()
}

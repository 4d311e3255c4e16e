//! Calling convention and context for externally hosted objective functions.
//!
//! The host (typically a scripting interpreter) exposes callables that take
//! and return dynamically typed [`HostValue`]s. An [`ObjectiveContext`] holds
//! the two callables an objective needs, a value function `R^n -> R` and a
//! gradient function `R^n -> R^n`, and converts to and from native vectors.
//!
//! # Threading
//!
//! A context and the handles it holds are `!Send` and `!Sync`. The host is
//! assumed to be a single-threaded, stateful interpreter; evaluations that
//! share one interpreter must be serialized by the caller.

use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::error::{Error, HostError, Result};

/// A value in the host's calling convention.
#[derive(Clone, Debug, PartialEq)]
pub enum HostValue {
    Real(f64),
    Vector(Vec<f64>),
    Null,
}

impl HostValue {
    fn describe(&self) -> String {
        match self {
            HostValue::Real(_) => "real".to_string(),
            HostValue::Vector(v) => format!("vector of length {}", v.len()),
            HostValue::Null => "null".to_string(),
        }
    }

    /// Convert to a scalar. A length-1 vector counts as a scalar.
    pub fn into_real(self) -> Result<f64> {
        match self {
            HostValue::Real(v) => Ok(v),
            HostValue::Vector(v) if v.len() == 1 => Ok(v[0]),
            other => Err(Error::TypeMismatch {
                expected: "real",
                found: other.describe(),
            }),
        }
    }

    /// Convert to a vector. A scalar counts as a length-1 vector.
    pub fn into_vector(self) -> Result<Vec<f64>> {
        match self {
            HostValue::Vector(v) => Ok(v),
            HostValue::Real(v) => Ok(vec![v]),
            HostValue::Null => Err(Error::TypeMismatch {
                expected: "vector",
                found: "null".to_string(),
            }),
        }
    }
}

impl From<f64> for HostValue {
    fn from(v: f64) -> Self {
        HostValue::Real(v)
    }
}

impl From<Vec<f64>> for HostValue {
    fn from(v: Vec<f64>) -> Self {
        HostValue::Vector(v)
    }
}

impl From<&[f64]> for HostValue {
    fn from(v: &[f64]) -> Self {
        HostValue::Vector(v.to_vec())
    }
}

/// A function living in the host environment.
pub trait HostCallable {
    fn call(&self, arg: HostValue) -> std::result::Result<HostValue, HostError>;
}

impl<G> HostCallable for G
where
    G: Fn(HostValue) -> std::result::Result<HostValue, HostError>,
{
    fn call(&self, arg: HostValue) -> std::result::Result<HostValue, HostError> {
        self(arg)
    }
}

/// Shared handle to a host callable.
pub type HostFn = Rc<dyn HostCallable>;

/// Wrap a native `R^n -> R` closure as a host callable.
pub fn value_fn<G>(f: G) -> HostFn
where
    G: Fn(&[f64]) -> std::result::Result<f64, HostError> + 'static,
{
    Rc::new(move |arg: HostValue| -> std::result::Result<HostValue, HostError> {
        let x = arg.into_vector()?;
        Ok(HostValue::Real(f(x.as_slice())?))
    })
}

/// Wrap a native `R^n -> R^n` closure as a host callable.
pub fn gradient_fn<G>(f: G) -> HostFn
where
    G: Fn(&[f64]) -> std::result::Result<Vec<f64>, HostError> + 'static,
{
    Rc::new(move |arg: HostValue| -> std::result::Result<HostValue, HostError> {
        let x = arg.into_vector()?;
        Ok(HostValue::Vector(f(x.as_slice())?))
    })
}

/// Name-to-callable registry standing in for the host interpreter's global
/// environment.
#[derive(Default, Clone)]
pub struct HostEnvironment {
    functions: HashMap<String, HostFn>,
}

impl HostEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or redefine) `name`.
    pub fn define(&mut self, name: impl Into<String>, f: HostFn) {
        self.functions.insert(name.into(), f);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn lookup(&self, name: &str) -> Result<HostFn> {
        self.functions
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownFunction {
                name: name.to_string(),
            })
    }
}

impl fmt::Debug for HostEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("HostEnvironment")
            .field("functions", &names)
            .finish()
    }
}

/// Counters for host calls and created nodes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallStats {
    pub value_calls: usize,
    pub gradient_calls: usize,
    pub nodes_created: usize,
}

/// Value and gradient callables for one objective, set once and used for
/// many evaluations.
#[derive(Default, Clone)]
pub struct ObjectiveContext {
    value_fn: Option<HostFn>,
    gradient_fn: Option<HostFn>,
    stats: Rc<Cell<CallStats>>,
}

impl fmt::Debug for ObjectiveContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectiveContext")
            .field("value_fn", &self.value_fn.is_some())
            .field("gradient_fn", &self.gradient_fn.is_some())
            .field("stats", &self.stats.get())
            .finish()
    }
}

impl ObjectiveContext {
    /// A context with neither callable set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look both callables up by name in `env`.
    pub fn bind(env: &HostEnvironment, value_name: &str, gradient_name: &str) -> Result<Self> {
        Ok(Self::new()
            .with_value_fn(env.lookup(value_name)?)
            .with_gradient_fn(env.lookup(gradient_name)?))
    }

    pub fn with_value_fn(mut self, f: HostFn) -> Self {
        self.value_fn = Some(f);
        self
    }

    pub fn with_gradient_fn(mut self, f: HostFn) -> Self {
        self.gradient_fn = Some(f);
        self
    }

    pub fn set_value_fn(&mut self, f: HostFn) {
        self.value_fn = Some(f);
    }

    pub fn set_gradient_fn(&mut self, f: HostFn) {
        self.gradient_fn = Some(f);
    }

    /// Snapshot of the call counters. Clones of a context share counters.
    pub fn stats(&self) -> CallStats {
        self.stats.get()
    }

    pub fn reset_stats(&self) {
        self.stats.set(CallStats::default());
    }

    fn bump(&self, f: impl FnOnce(&mut CallStats)) {
        let mut s = self.stats.get();
        f(&mut s);
        self.stats.set(s);
    }

    pub(crate) fn record_node(&self) {
        self.bump(|s| s.nodes_created += 1);
    }

    pub(crate) fn gradient_handle(&self) -> Result<GradientHandle> {
        let f = self
            .gradient_fn
            .clone()
            .ok_or(Error::FunctionUnset { role: "gradient" })?;
        Ok(GradientHandle {
            f,
            stats: Rc::clone(&self.stats),
        })
    }

    /// Host value function at `x`.
    pub fn evaluate(&self, x: &[f64]) -> Result<f64> {
        let f = self
            .value_fn
            .as_ref()
            .ok_or(Error::FunctionUnset { role: "value" })?;
        self.bump(|s| s.value_calls += 1);
        f.call(HostValue::from(x))?.into_real()
    }

    /// Host gradient function at `x`, with no bound correction.
    pub fn evaluate_gradient(&self, x: &[f64]) -> Result<Vec<f64>> {
        self.gradient_handle()?.call(x)
    }

    /// Host value and gradient at `x`: two independent host calls.
    ///
    /// Nothing ties the two calls to the same host state; a non-deterministic
    /// host function may return a gradient that does not belong to the value.
    pub fn evaluate_with_gradient(&self, x: &[f64]) -> Result<(f64, Vec<f64>)> {
        let value = self.evaluate(x)?;
        let grad = self.evaluate_gradient(x)?;
        Ok((value, grad))
    }
}

/// Gradient callable detached from its context, for capture in a backward
/// closure. Shares the context's counters.
pub(crate) struct GradientHandle {
    f: HostFn,
    stats: Rc<Cell<CallStats>>,
}

impl GradientHandle {
    pub(crate) fn call(&self, x: &[f64]) -> Result<Vec<f64>> {
        let mut s = self.stats.get();
        s.gradient_calls += 1;
        self.stats.set(s);
        let grad = self.f.call(HostValue::from(x))?.into_vector()?;
        Error::check_len("host gradient", x.len(), grad.len())?;
        debug!("host gradient evaluated: n={}", x.len());
        Ok(grad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum_sq_env() -> HostEnvironment {
        let mut env = HostEnvironment::new();
        env.define("ll", value_fn(|x| Ok(x.iter().map(|v| v * v).sum())));
        env.define(
            "grad",
            gradient_fn(|x| Ok(x.iter().map(|v| 2.0 * v).collect())),
        );
        env
    }

    #[test]
    fn conversions_follow_host_convention() {
        assert_eq!(HostValue::Vector(vec![2.5]).into_real().unwrap(), 2.5);
        assert_eq!(HostValue::Real(1.0).into_vector().unwrap(), vec![1.0]);
        assert!(matches!(
            HostValue::Vector(vec![1.0, 2.0]).into_real(),
            Err(Error::TypeMismatch { expected: "real", .. })
        ));
        assert!(HostValue::Null.into_vector().is_err());
    }

    #[test]
    fn bind_by_name_and_evaluate() {
        let ctx = ObjectiveContext::bind(&sum_sq_env(), "ll", "grad").unwrap();
        let (v, g) = ctx.evaluate_with_gradient(&[1.0, 2.0]).unwrap();
        assert_eq!(v, 5.0);
        assert_eq!(g, vec![2.0, 4.0]);
        let stats = ctx.stats();
        assert_eq!(stats.value_calls, 1);
        assert_eq!(stats.gradient_calls, 1);
    }

    #[test]
    fn unknown_name_is_reported() {
        let err = ObjectiveContext::bind(&sum_sq_env(), "ll", "missing").unwrap_err();
        assert!(matches!(err, Error::UnknownFunction { ref name } if name == "missing"));
    }

    #[test]
    fn unset_callables_are_caller_errors() {
        let ctx = ObjectiveContext::new();
        assert!(matches!(
            ctx.evaluate(&[1.0]),
            Err(Error::FunctionUnset { role: "value" })
        ));
        assert!(matches!(
            ctx.evaluate_gradient(&[1.0]),
            Err(Error::FunctionUnset { role: "gradient" })
        ));
    }

    #[test]
    fn wrong_gradient_length_is_dimension_mismatch() {
        let ctx = ObjectiveContext::new().with_gradient_fn(gradient_fn(|_| Ok(vec![1.0])));
        assert!(matches!(
            ctx.evaluate_gradient(&[1.0, 2.0]),
            Err(Error::DimensionMismatch {
                expected: 2,
                found: 1,
                ..
            })
        ));
    }

    #[test]
    fn host_failure_is_passed_through() {
        let ctx = ObjectiveContext::new().with_value_fn(value_fn(|_| Err("boom".into())));
        let err = ctx.evaluate(&[0.0]).unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert!(err.host_error().is_some());
    }
}

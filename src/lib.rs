//! Differentiable bridge for externally hosted objective functions.
//!
//! An external objective is a scalar function living outside the program (for
//! example in a scripting interpreter) that can only be called by value. This
//! crate makes such a function a primitive of a small reverse-mode AD engine,
//! with optional per-dimension box constraints handled by reparameterization.
//!
//! ```
//! use boundgrad::{external_objective, gradient_fn, value_fn, GradientMode, ObjectiveContext};
//!
//! fn main() -> boundgrad::Result<()> {
//!     let ctx = ObjectiveContext::new()
//!         .with_value_fn(value_fn(|x| Ok(x.iter().map(|v| v * v).sum())))
//!         .with_gradient_fn(gradient_fn(|x| Ok(x.iter().map(|v| 2.0 * v).collect())));
//!
//!     let g = boundgrad::grad(
//!         |v| external_objective(&ctx, v, GradientMode::Analytic, &[0.0], &[10.0]),
//!         &[3.0],
//!     )?;
//!     assert_eq!(g, vec![6.0]);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod bounds;
pub mod dispatch;
pub mod error;
pub mod finite_diff;
pub mod float;
pub mod host;
pub mod node;
pub mod ops;
pub mod problem;
pub mod reverse;
pub mod scalar;
pub mod tape;

pub use api::{grad, value_and_grad, vjp};
pub use bounds::{Bound, BoundSet};
pub use dispatch::{external_objective, external_objective_with, ExternalScalar, GradientMode};
pub use error::{Error, HostError, Result};
pub use finite_diff::{FdScheme, FiniteDiffConfig};
pub use float::Float;
pub use host::{
    gradient_fn, value_fn, CallStats, HostCallable, HostEnvironment, HostFn, HostValue,
    ObjectiveContext,
};
pub use node::callback_var;
pub use problem::BoundedProblem;
pub use reverse::{Adjoints, Reverse};
pub use scalar::Scalar;

/// Type alias for reverse-mode variables over `f64`.
pub type Reverse64 = Reverse<f64>;
/// Type alias for reverse-mode variables over `f32`.
pub type Reverse32 = Reverse<f32>;

//! Box-constraint reparameterization.
//!
//! A [`Bound`] maps an unconstrained real `x` onto a constrained value `y`:
//!
//! | bound              | `y = constrain(x)`          | `x = free(y)`                   |
//! |--------------------|-----------------------------|---------------------------------|
//! | `(-inf, +inf)`     | `x`                         | `y`                             |
//! | `(lb, +inf)`       | `lb + exp(x)`               | `ln(y - lb)`                    |
//! | `(-inf, ub)`       | `ub - exp(x)`               | `ln(ub - y)`                    |
//! | `(lb, ub)`         | `lb + (ub - lb) logistic(x)`| `logit((y - lb) / (ub - lb))`   |
//!
//! [`Bound::free_derivative`] is `d free / d y` expressed at the unconstrained
//! point, the factor that turns a gradient with respect to `x` into a gradient
//! with respect to `y`.
//!
//! A side counts as infinite only when it equals the infinity sentinel
//! exactly. A very large finite bound is a genuine bound.

use std::fmt;

use crate::error::{Error, Result};
use crate::Float;

/// Per-dimension bound, classified by which sides are infinite.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum Bound<F: Float = f64> {
    /// `(-inf, +inf)`
    #[default]
    Unbounded,
    /// `(lb, +inf)`
    Lower(F),
    /// `(-inf, ub)`
    Upper(F),
    /// `(lb, ub)`
    Interval(F, F),
}

impl<F: Float> Bound<F> {
    /// Classify a `(lower, upper)` pair.
    ///
    /// `lower > upper` is a caller precondition; it is only checked in debug
    /// builds.
    pub fn new(lower: F, upper: F) -> Self {
        debug_assert!(
            !(lower > upper),
            "lower bound {lower} exceeds upper bound {upper}"
        );
        let lb_inf = lower == F::neg_infinity();
        let ub_inf = upper == F::infinity();
        match (lb_inf, ub_inf) {
            (true, true) => Bound::Unbounded,
            (false, true) => Bound::Lower(lower),
            (true, false) => Bound::Upper(upper),
            (false, false) => Bound::Interval(lower, upper),
        }
    }

    pub fn lower(&self) -> F {
        match *self {
            Bound::Lower(lb) | Bound::Interval(lb, _) => lb,
            Bound::Unbounded | Bound::Upper(_) => F::neg_infinity(),
        }
    }

    pub fn upper(&self) -> F {
        match *self {
            Bound::Upper(ub) | Bound::Interval(_, ub) => ub,
            Bound::Unbounded | Bound::Lower(_) => F::infinity(),
        }
    }

    /// Whether `y` lies in the closed constrained domain.
    pub fn contains(&self, y: F) -> bool {
        match *self {
            Bound::Unbounded => !y.is_nan(),
            Bound::Lower(lb) => y >= lb,
            Bound::Upper(ub) => y <= ub,
            Bound::Interval(lb, ub) => y >= lb && y <= ub,
        }
    }

    /// Map an unconstrained value into the constrained domain.
    #[inline]
    pub fn constrain(&self, x: F) -> F {
        match *self {
            Bound::Unbounded => x,
            Bound::Lower(lb) => lb + x.exp(),
            Bound::Upper(ub) => ub - x.exp(),
            Bound::Interval(lb, ub) => lb + (ub - lb) * x.logistic(),
        }
    }

    /// Map a constrained value back to the unconstrained domain.
    #[inline]
    pub fn free(&self, y: F) -> F {
        match *self {
            Bound::Unbounded => y,
            Bound::Lower(lb) => (y - lb).ln(),
            Bound::Upper(ub) => (ub - y).ln(),
            Bound::Interval(lb, ub) => ((y - lb) / (ub - lb)).logit(),
        }
    }

    /// `d free(y) / d y`, evaluated at the unconstrained point `x`.
    ///
    /// Positive except on the upper-only branch, where `free` is decreasing.
    #[inline]
    pub fn free_derivative(&self, x: F) -> F {
        match *self {
            Bound::Unbounded => F::one(),
            Bound::Lower(_) => F::one() / x.exp(),
            Bound::Upper(_) => -F::one() / x.exp(),
            Bound::Interval(lb, ub) => {
                let s = x.logistic();
                F::one() / ((ub - lb) * s * (F::one() - s))
            }
        }
    }

    /// `ln |d constrain(x) / d x|`, the density correction for sampling in the
    /// unconstrained domain.
    #[inline]
    pub fn log_jacobian(&self, x: F) -> F {
        match *self {
            Bound::Unbounded => F::zero(),
            Bound::Lower(_) | Bound::Upper(_) => x,
            Bound::Interval(lb, ub) => {
                let s = x.logistic();
                (ub - lb).ln() + s.ln() + (F::one() - s).ln()
            }
        }
    }
}

impl<F: Float> From<(F, F)> for Bound<F> {
    fn from((lower, upper): (F, F)) -> Self {
        Bound::new(lower, upper)
    }
}

impl<F: Float> fmt::Display for Bound<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.lower(), self.upper())
    }
}

/// Ordered per-dimension bounds for one parameter vector.
///
/// Immutable once built; supplied by the caller on every evaluation.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundSet<F: Float = f64> {
    bounds: Vec<Bound<F>>,
}

impl<F: Float> BoundSet<F> {
    /// Pair up a lower and an upper bound vector.
    pub fn new(lower: &[F], upper: &[F]) -> Result<Self> {
        Error::check_len("upper bounds", lower.len(), upper.len())?;
        let bounds = lower
            .iter()
            .zip(upper.iter())
            .map(|(&lb, &ub)| Bound::new(lb, ub))
            .collect();
        Ok(BoundSet { bounds })
    }

    /// `n` dimensions with no constraint.
    pub fn unbounded(n: usize) -> Self {
        BoundSet {
            bounds: vec![Bound::Unbounded; n],
        }
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    pub fn as_slice(&self) -> &[Bound<F>] {
        &self.bounds
    }

    pub fn lower(&self) -> Vec<F> {
        self.bounds.iter().map(Bound::lower).collect()
    }

    pub fn upper(&self) -> Vec<F> {
        self.bounds.iter().map(Bound::upper).collect()
    }

    /// Whether every component of `y` lies in its domain.
    pub fn contains(&self, y: &[F]) -> bool {
        y.len() == self.len() && self.bounds.iter().zip(y).all(|(b, &v)| b.contains(v))
    }

    /// Index of the first component of `y` outside its domain.
    pub fn position_outside(&self, y: &[F]) -> Option<usize> {
        self.bounds
            .iter()
            .zip(y)
            .position(|(b, &v)| !b.contains(v))
    }

    fn map(&self, what: &'static str, v: &[F], f: impl Fn(&Bound<F>, F) -> F) -> Result<Vec<F>> {
        Error::check_len(what, self.len(), v.len())?;
        Ok(self.bounds.iter().zip(v).map(|(b, &x)| f(b, x)).collect())
    }

    /// Elementwise [`Bound::constrain`].
    pub fn constrain(&self, x: &[F]) -> Result<Vec<F>> {
        self.map("unconstrained vector", x, Bound::constrain)
    }

    /// Elementwise [`Bound::free`].
    pub fn free(&self, y: &[F]) -> Result<Vec<F>> {
        self.map("constrained vector", y, Bound::free)
    }

    /// Elementwise [`Bound::free_derivative`].
    pub fn free_derivative(&self, x: &[F]) -> Result<Vec<F>> {
        self.map("unconstrained vector", x, Bound::free_derivative)
    }

    /// Sum of [`Bound::log_jacobian`] over all dimensions.
    pub fn log_jacobian(&self, x: &[F]) -> Result<F> {
        Ok(self
            .map("unconstrained vector", x, Bound::log_jacobian)?
            .into_iter()
            .fold(F::zero(), |acc, v| acc + v))
    }
}

impl<F: Float> FromIterator<Bound<F>> for BoundSet<F> {
    fn from_iter<I: IntoIterator<Item = Bound<F>>>(iter: I) -> Self {
        BoundSet {
            bounds: iter.into_iter().collect(),
        }
    }
}

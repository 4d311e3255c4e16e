//! The [`Scalar`] trait for writing AD-generic numeric code.
//!
//! Functions written as `fn f<T: Scalar>(x: &[T]) -> T` work transparently with
//! plain `f64` and with `Reverse<f64>`. The same split drives the dispatch of
//! [`external_objective`](crate::external_objective): plain floats take the
//! primal-only path, reverse variables take the differentiable one.

use std::fmt::{Debug, Display};
use std::ops::{Add, Div, Mul, Neg, Sub};

use crate::float::Float;
use crate::reverse::Reverse;
use crate::tape::TapeThreadLocal;

/// The central trait for AD-generic numeric code.
pub trait Scalar:
    Copy
    + Debug
    + Display
    + PartialOrd
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + 'static
{
    /// The underlying primitive float type.
    type Float: Float;

    /// Lift a plain float to this scalar (a constant, zero derivative).
    fn from_f(val: Self::Float) -> Self;

    /// Extract the primal value.
    fn value(&self) -> Self::Float;

    fn exp(self) -> Self;
    fn ln(self) -> Self;
    fn sqrt(self) -> Self;
    fn powi(self, n: i32) -> Self;
}

macro_rules! impl_scalar_for_primitive {
    ($f:ty) => {
        impl Scalar for $f {
            type Float = $f;

            #[inline]
            fn from_f(val: $f) -> Self {
                val
            }

            #[inline]
            fn value(&self) -> $f {
                *self
            }

            #[inline]
            fn exp(self) -> Self {
                <$f>::exp(self)
            }

            #[inline]
            fn ln(self) -> Self {
                <$f>::ln(self)
            }

            #[inline]
            fn sqrt(self) -> Self {
                <$f>::sqrt(self)
            }

            #[inline]
            fn powi(self, n: i32) -> Self {
                <$f>::powi(self, n)
            }
        }
    };
}

impl_scalar_for_primitive!(f32);
impl_scalar_for_primitive!(f64);

impl<F: Float + TapeThreadLocal> Scalar for Reverse<F> {
    type Float = F;

    #[inline]
    fn from_f(val: F) -> Self {
        Reverse::constant(val)
    }

    #[inline]
    fn value(&self) -> F {
        self.value
    }

    #[inline]
    fn exp(self) -> Self {
        Reverse::exp(self)
    }

    #[inline]
    fn ln(self) -> Self {
        Reverse::ln(self)
    }

    #[inline]
    fn sqrt(self) -> Self {
        Reverse::sqrt(self)
    }

    #[inline]
    fn powi(self, n: i32) -> Self {
        Reverse::powi(self, n)
    }
}
